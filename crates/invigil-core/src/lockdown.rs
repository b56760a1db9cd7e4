//! Browser lockdown policy derivation.
//!
//! The core never enforces lockdown itself; it emits a declarative
//! policy object the assessment client applies. Derivation is a pure
//! function of the effective [`AntiCheatConfig`], with no session state
//! and no randomness, so callers may cache the policy per assessment until the
//! config changes.

use serde::{Deserialize, Serialize};

use crate::config::AntiCheatConfig;

/// Client-enforced restrictions for one assessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserLockdownPolicy {
    /// Client must run the assessment in fullscreen.
    pub require_fullscreen: bool,
    /// Block clipboard copy/paste.
    pub disable_copy_paste: bool,
    /// Block the context menu.
    pub disable_right_click: bool,
    /// Block developer tools shortcuts and report probes.
    pub block_dev_tools: bool,
    /// Report tab switches and window blurs as violations.
    pub detect_tab_switch: bool,
    /// Present questions in a shuffled order.
    pub shuffle_questions: bool,
    /// Reject requests when the client IP changes mid-attempt.
    pub pin_ip: bool,
    /// Capture keystroke timing for post-submission analysis.
    pub capture_keystrokes: bool,
}

/// Derive the lockdown policy from an assessment's effective config.
///
/// When browser lockdown is disabled wholesale, every client-side
/// restriction is off; detection-only options (tab switch reporting,
/// keystroke capture) and server-side options (IP pinning, shuffling)
/// still follow their own toggles.
#[must_use]
pub fn lockdown_policy(config: &AntiCheatConfig) -> BrowserLockdownPolicy {
    let lockdown = config.enable_browser_lockdown;
    BrowserLockdownPolicy {
        require_fullscreen: lockdown && config.require_fullscreen,
        disable_copy_paste: lockdown && config.block_copy_paste,
        disable_right_click: lockdown && config.block_right_click,
        block_dev_tools: lockdown && config.block_dev_tools,
        detect_tab_switch: config.detect_tab_switch,
        shuffle_questions: config.shuffle_questions,
        pin_ip: config.pin_ip,
        capture_keystrokes: config.keystroke_dynamics,
    }
}

impl crate::manager::ProctorManager {
    /// Resolve the lockdown policy for an attempt's assessment: the
    /// assessment-level overrides are applied onto the platform
    /// defaults, then derived. Stable for a given assessment config, so
    /// callers may cache per assessment until the config changes.
    pub async fn lockdown_policy_for_attempt(
        &self,
        attempt_id: &str,
    ) -> crate::error::Result<BrowserLockdownPolicy> {
        let attempt = self.attempt_directory().find_attempt(attempt_id).await?;
        let effective = attempt.anti_cheat.apply(self.defaults());
        Ok(lockdown_policy(&effective))
    }
}
