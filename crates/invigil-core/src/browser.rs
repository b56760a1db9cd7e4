//! Browser environment validation for pre-session checks.
//!
//! Pure verdict over client-reported environment signals: automation
//! signatures in the user agent, webdriver-style plugins, implausible
//! screen resolutions, timezone drift, and (when supplied) fingerprint
//! mismatch. Fixed-signature matching uses a shared case-insensitive
//! Aho-Corasick automaton.

use std::sync::OnceLock;

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};

/// Automation tooling signatures denied in user-agent strings.
const AUTOMATION_SIGNATURES: &[&str] = &[
    "headlesschrome",
    "phantomjs",
    "selenium",
    "webdriver",
    "puppeteer",
    "playwright",
    "electron",
];

/// Substrings denied in reported plugin names.
const PLUGIN_SIGNATURES: &[&str] = &["webdriver", "automation"];

/// Minimum plausible screen width for a proctored assessment.
const MIN_SCREEN_WIDTH: u32 = 800;
/// Minimum plausible screen height.
const MIN_SCREEN_HEIGHT: u32 = 600;

/// Risk contribution per warning when the environment is invalid.
const RISK_PER_WARNING: u32 = 25;
/// Presentation cap for the risk score.
const RISK_CEILING: u32 = 100;

fn automation_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(AUTOMATION_SIGNATURES)
            .expect("automation signature automaton")
    })
}

fn plugin_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(PLUGIN_SIGNATURES)
            .expect("plugin signature automaton")
    })
}

// =============================================================================
// Signals
// =============================================================================

/// Environment signals reported by the assessment client at session start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSignals {
    /// Raw user-agent string.
    pub user_agent: String,
    /// Reported browser plugin names.
    pub plugins: Vec<String>,
    /// Screen resolution as `"WIDTHxHEIGHT"` (e.g. `"1920x1080"`).
    pub screen_resolution: String,
    /// IANA timezone reported by the client.
    pub timezone: String,
    /// Opaque client fingerprint.
    pub fingerprint: String,
    /// Client IP address as seen by the enclosing transport layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Server-side expectations the signals are validated against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedEnvironment {
    /// Server-resolved timezone for the user; mismatch is a warning only.
    pub timezone: Option<String>,
    /// Fingerprint captured at enrollment; mismatch invalidates.
    pub fingerprint: Option<String>,
}

// =============================================================================
// Verdict
// =============================================================================

/// Result of validating a client environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentVerdict {
    /// False when any invalidating check failed.
    pub valid: bool,
    /// One entry per failed check.
    pub warnings: Vec<String>,
}

impl EnvironmentVerdict {
    /// Presentation risk score: 0 when valid, else 25 per warning,
    /// capped at 100.
    #[must_use]
    pub fn risk_score(&self) -> u32 {
        if self.valid {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation)]
        let count = self.warnings.len() as u32;
        (count * RISK_PER_WARNING).min(RISK_CEILING)
    }

    /// Actions recommended to the caller. Derived from the `valid` flag
    /// only, never from individual warnings.
    #[must_use]
    pub fn recommended_actions(&self) -> Vec<&'static str> {
        if self.valid {
            Vec::new()
        } else {
            vec![
                "block_session_start",
                "require_supported_browser",
                "notify_assessment_owner",
            ]
        }
    }
}

/// Parse a `"WIDTHxHEIGHT"` resolution string.
#[must_use]
pub fn parse_resolution(resolution: &str) -> Option<(u32, u32)> {
    let (width, height) = resolution.trim().split_once(['x', 'X'])?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

/// Validate a client environment against fixed denylists and optional
/// server-side expectations.
#[must_use]
pub fn validate_environment(
    signals: &ClientSignals,
    expected: Option<&ExpectedEnvironment>,
) -> EnvironmentVerdict {
    let mut warnings = Vec::new();
    let mut valid = true;

    // Automation signatures in the user agent.
    if let Some(found) = automation_matcher().find(&signals.user_agent) {
        warnings.push(format!(
            "Automated browser detected: user agent contains \"{}\"",
            AUTOMATION_SIGNATURES[found.pattern().as_usize()]
        ));
        valid = false;
    }

    // Webdriver-style plugins. One warning per check, naming the first
    // offender, so the risk score stays bounded by the number of checks.
    if let Some(plugin) = signals
        .plugins
        .iter()
        .find(|p| plugin_matcher().is_match(p.as_str()))
    {
        warnings.push(format!("Automation plugin detected: \"{plugin}\""));
        valid = false;
    }

    // Implausible or unparsable screen resolution.
    match parse_resolution(&signals.screen_resolution) {
        Some((width, height)) => {
            if width < MIN_SCREEN_WIDTH || height < MIN_SCREEN_HEIGHT {
                warnings.push(format!(
                    "Screen resolution too small: {width}x{height}"
                ));
                valid = false;
            }
        }
        None => {
            warnings.push(format!(
                "Unrecognized screen resolution: \"{}\"",
                signals.screen_resolution
            ));
            valid = false;
        }
    }

    if let Some(expected) = expected {
        // Timezone drift is a warning only; travel and VPNs are common.
        if let Some(server_tz) = &expected.timezone {
            if !signals.timezone.is_empty() && signals.timezone != *server_tz {
                warnings.push(format!(
                    "Timezone mismatch: client \"{}\", server \"{server_tz}\"",
                    signals.timezone
                ));
            }
        }

        // Fingerprint drift against the enrollment capture invalidates.
        if let Some(expected_fp) = &expected.fingerprint {
            if !signals.fingerprint.is_empty() && signals.fingerprint != *expected_fp {
                warnings.push("Client fingerprint does not match enrollment".to_string());
                valid = false;
            }
        }
    }

    EnvironmentVerdict { valid, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clean_signals() -> ClientSignals {
        ClientSignals {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Safari/605.1.15"
                .to_string(),
            plugins: vec!["PDF Viewer".to_string()],
            screen_resolution: "1920x1080".to_string(),
            timezone: "Europe/Berlin".to_string(),
            fingerprint: "fp-abc".to_string(),
            ip_address: None,
        }
    }

    // --- Clean environment ---

    #[test]
    fn clean_environment_is_valid_with_zero_risk() {
        let verdict = validate_environment(&clean_signals(), None);
        assert!(verdict.valid, "warnings: {:?}", verdict.warnings);
        assert!(verdict.warnings.is_empty());
        assert_eq!(verdict.risk_score(), 0);
        assert!(verdict.recommended_actions().is_empty());
    }

    // --- User agent denylist ---

    #[test]
    fn headless_chrome_user_agent_is_invalid() {
        let mut signals = clean_signals();
        signals.user_agent = "Mozilla/5.0 (HeadlessChrome)".to_string();
        let verdict = validate_environment(&signals, None);
        assert!(!verdict.valid);
        assert_eq!(verdict.warnings.len(), 1);
        assert!(verdict.warnings[0].contains("Automated browser"));
        assert_eq!(verdict.risk_score(), 25);
    }

    #[test]
    fn denylist_matching_is_case_insensitive() {
        let mut signals = clean_signals();
        signals.user_agent = "something SELENIUM something".to_string();
        assert!(!validate_environment(&signals, None).valid);
    }

    // --- Plugins ---

    #[test]
    fn webdriver_plugin_is_invalid_with_single_warning() {
        let mut signals = clean_signals();
        signals.plugins = vec![
            "chrome-webdriver".to_string(),
            "automation-helper".to_string(),
        ];
        let verdict = validate_environment(&signals, None);
        assert!(!verdict.valid);
        // One warning for the check, not one per offending plugin.
        assert_eq!(verdict.warnings.len(), 1);
        assert!(verdict.warnings[0].contains("chrome-webdriver"));
    }

    // --- Resolution ---

    #[test]
    fn small_resolution_is_invalid() {
        let mut signals = clean_signals();
        signals.screen_resolution = "640x480".to_string();
        let verdict = validate_environment(&signals, None);
        assert!(!verdict.valid);
        assert_eq!(verdict.warnings.len(), 1);
        assert!(verdict.warnings[0].contains("resolution"));
    }

    #[test]
    fn unparsable_resolution_is_invalid() {
        let mut signals = clean_signals();
        signals.screen_resolution = "huge".to_string();
        let verdict = validate_environment(&signals, None);
        assert!(!verdict.valid);
        assert!(verdict.warnings[0].contains("Unrecognized"));
    }

    #[test]
    fn resolution_parsing_accepts_whitespace_and_uppercase_x() {
        assert_eq!(parse_resolution(" 1280 X 720 "), Some((1280, 720)));
        assert_eq!(parse_resolution("800x600"), Some((800, 600)));
        assert_eq!(parse_resolution("800"), None);
        assert_eq!(parse_resolution("x600"), None);
    }

    // --- Combined risk scoring ---

    #[test]
    fn headless_agent_and_small_resolution_score_fifty() {
        let mut signals = clean_signals();
        signals.user_agent = "Mozilla/5.0 (HeadlessChrome)".to_string();
        signals.screen_resolution = "640x480".to_string();
        let verdict = validate_environment(&signals, None);
        assert!(!verdict.valid);
        assert_eq!(verdict.warnings.len(), 2);
        assert_eq!(verdict.risk_score(), 50);
    }

    // --- Expectations ---

    #[test]
    fn timezone_mismatch_warns_without_invalidating() {
        let signals = clean_signals();
        let expected = ExpectedEnvironment {
            timezone: Some("America/New_York".to_string()),
            fingerprint: None,
        };
        let verdict = validate_environment(&signals, Some(&expected));
        assert!(verdict.valid);
        assert_eq!(verdict.warnings.len(), 1);
        assert!(verdict.warnings[0].contains("Timezone mismatch"));
        // Valid environments always present zero risk.
        assert_eq!(verdict.risk_score(), 0);
    }

    #[test]
    fn fingerprint_mismatch_invalidates() {
        let signals = clean_signals();
        let expected = ExpectedEnvironment {
            timezone: None,
            fingerprint: Some("fp-other".to_string()),
        };
        let verdict = validate_environment(&signals, Some(&expected));
        assert!(!verdict.valid);
        assert!(verdict.warnings[0].contains("fingerprint"));
    }

    #[test]
    fn invalid_verdict_recommends_blocking() {
        let mut signals = clean_signals();
        signals.user_agent = "puppeteer".to_string();
        let verdict = validate_environment(&signals, None);
        assert!(
            verdict
                .recommended_actions()
                .contains(&"block_session_start")
        );
    }

    // --- Properties ---

    proptest! {
        #[test]
        fn risk_score_is_bounded(
            ua in ".{0,64}",
            res in ".{0,16}",
            tz in "[A-Za-z/_]{0,24}"
        ) {
            let signals = ClientSignals {
                user_agent: ua,
                plugins: Vec::new(),
                screen_resolution: res,
                timezone: tz,
                fingerprint: String::new(),
                ip_address: None,
            };
            let verdict = validate_environment(&signals, None);
            prop_assert!(verdict.risk_score() <= 100);
            if verdict.valid {
                prop_assert_eq!(verdict.risk_score(), 0);
            }
        }
    }
}
