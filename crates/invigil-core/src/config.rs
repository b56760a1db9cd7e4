//! Anti-cheat configuration: platform defaults, per-assessment overrides,
//! and a deterministic merge between the two.
//!
//! An assessment never carries a full config of its own. It carries an
//! [`AntiCheatOverrides`] (every field optional) and a session resolves
//! its effective [`AntiCheatConfig`] once at start time by applying those
//! overrides onto the platform defaults. The result is read-only for the
//! session's lifetime.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Effective anti-cheat policy for one assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiCheatConfig {
    /// Master switch for client-side lockdown.
    pub enable_browser_lockdown: bool,
    /// Block clipboard copy/paste in the assessment.
    pub block_copy_paste: bool,
    /// Block the context menu.
    pub block_right_click: bool,
    /// Block developer tools.
    pub block_dev_tools: bool,
    /// Require fullscreen for the whole attempt.
    pub require_fullscreen: bool,
    /// Report tab switches as violations.
    pub detect_tab_switch: bool,
    /// Terminate the session when this many violations accumulate.
    pub max_violations_allowed: u32,
    /// Auto-flag a violation when this many land within the trailing
    /// five-minute window.
    pub auto_flag_threshold: u32,
    /// Maximum session lifetime before the sweeper terminates it.
    #[serde(with = "duration_secs")]
    pub session_timeout: Duration,
    /// Reject mid-session IP changes.
    pub pin_ip: bool,
    /// Shuffle question order per attempt.
    pub shuffle_questions: bool,
    /// Capture keystroke dynamics for post-hoc analysis.
    pub keystroke_dynamics: bool,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            enable_browser_lockdown: true,
            block_copy_paste: true,
            block_right_click: true,
            block_dev_tools: true,
            require_fullscreen: false,
            detect_tab_switch: true,
            max_violations_allowed: 10,
            auto_flag_threshold: 3,
            session_timeout: Duration::from_secs(2 * 60 * 60),
            pin_ip: false,
            shuffle_questions: false,
            keystroke_dynamics: false,
        }
    }
}

impl AntiCheatConfig {
    /// Reject configurations that would make the escalation rules
    /// degenerate (a zero threshold flags or terminates everything).
    pub fn validate(&self) -> Result<()> {
        if self.max_violations_allowed == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_violations_allowed",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.auto_flag_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "auto_flag_threshold",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.session_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "session_timeout",
                reason: "must be non-zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Load a TOML config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Per-assessment overrides: every field optional, applied onto the
/// platform defaults with [`AntiCheatOverrides::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiCheatOverrides {
    pub enable_browser_lockdown: Option<bool>,
    pub block_copy_paste: Option<bool>,
    pub block_right_click: Option<bool>,
    pub block_dev_tools: Option<bool>,
    pub require_fullscreen: Option<bool>,
    pub detect_tab_switch: Option<bool>,
    pub max_violations_allowed: Option<u32>,
    pub auto_flag_threshold: Option<u32>,
    #[serde(with = "duration_secs_opt")]
    pub session_timeout: Option<Duration>,
    pub pin_ip: Option<bool>,
    pub shuffle_questions: Option<bool>,
    pub keystroke_dynamics: Option<bool>,
}

impl AntiCheatOverrides {
    /// Apply these overrides onto a base config. Deterministic: a set
    /// field replaces the base value, an unset field keeps it.
    #[must_use]
    pub fn apply(&self, base: &AntiCheatConfig) -> AntiCheatConfig {
        AntiCheatConfig {
            enable_browser_lockdown: self
                .enable_browser_lockdown
                .unwrap_or(base.enable_browser_lockdown),
            block_copy_paste: self.block_copy_paste.unwrap_or(base.block_copy_paste),
            block_right_click: self.block_right_click.unwrap_or(base.block_right_click),
            block_dev_tools: self.block_dev_tools.unwrap_or(base.block_dev_tools),
            require_fullscreen: self.require_fullscreen.unwrap_or(base.require_fullscreen),
            detect_tab_switch: self.detect_tab_switch.unwrap_or(base.detect_tab_switch),
            max_violations_allowed: self
                .max_violations_allowed
                .unwrap_or(base.max_violations_allowed),
            auto_flag_threshold: self.auto_flag_threshold.unwrap_or(base.auto_flag_threshold),
            session_timeout: self.session_timeout.unwrap_or(base.session_timeout),
            pin_ip: self.pin_ip.unwrap_or(base.pin_ip),
            shuffle_questions: self.shuffle_questions.unwrap_or(base.shuffle_questions),
            keystroke_dynamics: self.keystroke_dynamics.unwrap_or(base.keystroke_dynamics),
        }
    }

    /// True when no field is set (the assessment inherits the defaults).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Manager-level tuning, unrelated to any single assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Platform-wide anti-cheat defaults that assessment overrides are
    /// applied onto.
    pub defaults: AntiCheatConfig,
    /// Interval between expiry sweeps.
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,
    /// Event bus channel capacity.
    pub event_capacity: usize,
    /// Completion analysis appends a violation when a session ends with
    /// more than this many tab switches.
    pub completion_tab_switch_threshold: usize,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            defaults: AntiCheatConfig::default(),
            sweep_interval: Duration::from_secs(30),
            event_capacity: 1024,
            completion_tab_switch_threshold: 5,
        }
    }
}

impl ProctorConfig {
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval",
                reason: "must be non-zero".to_string(),
            }
            .into());
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_capacity",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Durations serialized as integer seconds (`session_timeout = 7200`).
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Optional variant of [`duration_secs`].
mod duration_secs_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
