//! Auto-flag and completion-analysis rules.
//!
//! Pure functions over a session's violation history; the manager applies
//! their decisions under the per-session lock. Two rules live here:
//!
//! - **Auto-flag at insertion**: a violation is flagged immediately when
//!   `Critical`, or when enough violations land inside the trailing
//!   five-minute window. Evaluated once, against the new violation's own
//!   timestamp; never re-evaluated later.
//! - **Completion analysis**: when a session ends normally, a scan over
//!   the full history may surface one final pattern finding.

use chrono::{DateTime, Duration, Utc};

use crate::config::AntiCheatConfig;
use crate::violation::{Severity, SecurityViolation, ViolationKind};

/// Fixed trailing window for the auto-flag count rule, in seconds.
pub const AUTO_FLAG_WINDOW_SECS: i64 = 5 * 60;

/// Fixed trailing window for the auto-flag count rule.
#[must_use]
pub fn auto_flag_window() -> Duration {
    Duration::seconds(AUTO_FLAG_WINDOW_SECS)
}

/// Decide whether a violation being inserted at `timestamp` must be
/// flagged for review.
///
/// `prior` is the session's violation history before this insertion, in
/// insertion order. The count rule includes the new violation itself:
/// with a threshold of 3, the third violation inside the window flags.
#[must_use]
pub fn should_auto_flag(
    severity: Severity,
    timestamp: DateTime<Utc>,
    prior: &[SecurityViolation],
    config: &AntiCheatConfig,
) -> bool {
    if severity == Severity::Critical {
        return true;
    }

    let window_start = timestamp - auto_flag_window();
    let in_window = prior
        .iter()
        .filter(|v| v.timestamp >= window_start && v.timestamp <= timestamp)
        .count();

    // +1 for the violation being inserted.
    in_window + 1 >= config.auto_flag_threshold as usize
}

/// Whether appending one more violation reaches the termination limit.
#[must_use]
pub fn reaches_violation_limit(recorded: usize, config: &AntiCheatConfig) -> bool {
    recorded >= config.max_violations_allowed as usize
}

/// A pattern surfaced by completion analysis, to be appended as a final
/// violation before the session freezes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionFinding {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub details: String,
}

/// Scan a finished session's history for whole-session patterns.
///
/// Currently one pattern: excessive tab switching. More than
/// `tab_switch_threshold` tab switches across the session produce a
/// `SuspiciousTiming`/High finding.
#[must_use]
pub fn completion_finding(
    violations: &[SecurityViolation],
    tab_switch_threshold: usize,
) -> Option<CompletionFinding> {
    let tab_switches = violations
        .iter()
        .filter(|v| v.kind == ViolationKind::TabSwitch)
        .count();

    if tab_switches > tab_switch_threshold {
        return Some(CompletionFinding {
            kind: ViolationKind::SuspiciousTiming,
            severity: Severity::High,
            details: format!(
                "Excessive tab switching across session: {tab_switches} switches"
            ),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(base: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        base + Duration::minutes(minutes)
    }

    fn violation(kind: ViolationKind, timestamp: DateTime<Utc>) -> SecurityViolation {
        SecurityViolation {
            id: crate::session::generate_id(),
            kind,
            severity: kind.default_severity(),
            timestamp,
            details: String::new(),
            flagged: false,
            reviewed: false,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
    }

    fn config(threshold: u32) -> AntiCheatConfig {
        AntiCheatConfig {
            auto_flag_threshold: threshold,
            ..AntiCheatConfig::default()
        }
    }

    // --- Critical short-circuit ---

    #[test]
    fn critical_always_flags_regardless_of_history() {
        assert!(should_auto_flag(
            Severity::Critical,
            base_time(),
            &[],
            &config(100)
        ));
    }

    // --- Window counting ---

    #[test]
    fn window_walk_matches_threshold_semantics() {
        // Violations at t, t+1m, t+2m, t+10m with threshold 3:
        // the 3rd flags (3 within window), the 4th does not (alone in
        // its own trailing window).
        let base = base_time();
        let cfg = config(3);
        let mut history: Vec<SecurityViolation> = Vec::new();

        let first = should_auto_flag(Severity::Low, at(base, 0), &history, &cfg);
        assert!(!first);
        history.push(violation(ViolationKind::TabSwitch, at(base, 0)));

        let second = should_auto_flag(Severity::Low, at(base, 1), &history, &cfg);
        assert!(!second);
        history.push(violation(ViolationKind::WindowBlur, at(base, 1)));

        let third = should_auto_flag(Severity::Low, at(base, 2), &history, &cfg);
        assert!(third, "third violation inside the window must flag");
        history.push(violation(ViolationKind::TabSwitch, at(base, 2)));

        let fourth = should_auto_flag(Severity::Low, at(base, 10), &history, &cfg);
        assert!(!fourth, "t+10m sees no prior violations in its window");
    }

    #[test]
    fn violations_outside_window_do_not_count() {
        let base = base_time();
        let history = vec![
            violation(ViolationKind::TabSwitch, at(base, -30)),
            violation(ViolationKind::TabSwitch, at(base, -20)),
        ];
        assert!(!should_auto_flag(
            Severity::Low,
            base,
            &history,
            &config(3)
        ));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let base = base_time();
        let history = vec![
            violation(ViolationKind::TabSwitch, base - auto_flag_window()),
            violation(ViolationKind::TabSwitch, at(base, -1)),
        ];
        // Exactly-at-boundary violation still counts: 2 prior + 1 new = 3.
        assert!(should_auto_flag(Severity::Low, base, &history, &config(3)));
    }

    // --- Violation limit ---

    #[test]
    fn limit_reached_at_max_violations() {
        let cfg = AntiCheatConfig {
            max_violations_allowed: 5,
            ..AntiCheatConfig::default()
        };
        assert!(!reaches_violation_limit(4, &cfg));
        assert!(reaches_violation_limit(5, &cfg));
        assert!(reaches_violation_limit(6, &cfg));
    }

    // --- Completion analysis ---

    #[test]
    fn many_tab_switches_produce_finding() {
        let base = base_time();
        let history: Vec<_> = (0..6)
            .map(|i| violation(ViolationKind::TabSwitch, at(base, i)))
            .collect();

        let finding = completion_finding(&history, 5).expect("finding");
        assert_eq!(finding.kind, ViolationKind::SuspiciousTiming);
        assert_eq!(finding.severity, Severity::High);
        assert!(finding.details.contains("6"));
    }

    #[test]
    fn threshold_tab_switches_produce_no_finding() {
        let base = base_time();
        let history: Vec<_> = (0..5)
            .map(|i| violation(ViolationKind::TabSwitch, at(base, i)))
            .collect();
        // "More than" the threshold, not "at least".
        assert!(completion_finding(&history, 5).is_none());
    }

    #[test]
    fn other_kinds_do_not_count_as_tab_switches() {
        let base = base_time();
        let history: Vec<_> = (0..10)
            .map(|i| violation(ViolationKind::WindowBlur, at(base, i)))
            .collect();
        assert!(completion_finding(&history, 5).is_none());
    }
}
