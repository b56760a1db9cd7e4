//! invigil CLI - offline exam proctoring analyses.
//!
//! Exposes the transport-free parts of invigil-core: timing anomaly
//! analysis, browser environment validation, and lockdown policy
//! derivation. Session lifecycle operations need a running service and
//! are not exposed here.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use invigil_core::browser::{ClientSignals, ExpectedEnvironment, validate_environment};
use invigil_core::config::AntiCheatConfig;
use invigil_core::lockdown::lockdown_policy;
use invigil_core::logging::{LogConfig, init_logging};
use invigil_core::timing::{QuestionTiming, analyze_timings};

#[derive(Parser)]
#[command(name = "ivg", version, about = "Exam proctoring analyses", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "IVG_LOG")]
    log_level: String,

    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze per-question timings for cheating signatures
    AnalyzeTimings {
        /// JSON file with [{"question_index": 0, "time_spent_ms": 500}, ...];
        /// reads stdin when omitted
        input: Option<PathBuf>,
    },

    /// Validate client environment signals
    ValidateEnv {
        /// JSON file with the client signals; reads stdin when omitted
        input: Option<PathBuf>,

        /// Server-resolved timezone to compare against
        #[arg(long)]
        expected_timezone: Option<String>,

        /// Enrollment fingerprint to compare against
        #[arg(long)]
        expected_fingerprint: Option<String>,
    },

    /// Derive the browser lockdown policy from an anti-cheat config
    Lockdown {
        /// TOML anti-cheat config; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig {
        level: cli.log_level.clone(),
        ..LogConfig::default()
    })
    .context("failed to initialize logging")?;

    match cli.command {
        Command::AnalyzeTimings { input } => analyze_timings_cmd(input.as_deref(), cli.json),
        Command::ValidateEnv {
            input,
            expected_timezone,
            expected_fingerprint,
        } => validate_env_cmd(
            input.as_deref(),
            expected_timezone,
            expected_fingerprint,
            cli.json,
        ),
        Command::Lockdown { config } => lockdown_cmd(config.as_deref(), cli.json),
    }
}

fn read_input(path: Option<&std::path::Path>) -> Result<String> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };
    tracing::debug!(bytes = raw.len(), from_file = path.is_some(), "read input");
    Ok(raw)
}

fn analyze_timings_cmd(input: Option<&std::path::Path>, json: bool) -> Result<()> {
    let raw = read_input(input)?;
    let timings: Vec<QuestionTiming> =
        serde_json::from_str(&raw).context("invalid timing input")?;

    let analysis = analyze_timings(&timings);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    if analysis.suspicious {
        println!("suspicious: yes");
        for reason in &analysis.reasons {
            println!("  - {reason}");
        }
    } else {
        println!("suspicious: no");
    }
    Ok(())
}

fn validate_env_cmd(
    input: Option<&std::path::Path>,
    expected_timezone: Option<String>,
    expected_fingerprint: Option<String>,
    json: bool,
) -> Result<()> {
    let raw = read_input(input)?;
    let signals: ClientSignals = serde_json::from_str(&raw).context("invalid signals input")?;

    let expected = ExpectedEnvironment {
        timezone: expected_timezone,
        fingerprint: expected_fingerprint,
    };
    let verdict = validate_environment(&signals, Some(&expected));

    if json {
        let mut value = serde_json::to_value(&verdict)?;
        value["risk_score"] = verdict.risk_score().into();
        value["recommended_actions"] = verdict.recommended_actions().into();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("valid: {}", if verdict.valid { "yes" } else { "no" });
    println!("risk score: {}", verdict.risk_score());
    for warning in &verdict.warnings {
        println!("  - {warning}");
    }
    for action in verdict.recommended_actions() {
        println!("  -> {action}");
    }
    Ok(())
}

fn lockdown_cmd(config: Option<&std::path::Path>, json: bool) -> Result<()> {
    let config = match config {
        Some(path) => AntiCheatConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AntiCheatConfig::default(),
    };

    let policy = lockdown_policy(&config);
    if json {
        println!("{}", serde_json::to_string_pretty(&policy)?);
        return Ok(());
    }

    println!("require_fullscreen: {}", policy.require_fullscreen);
    println!("disable_copy_paste: {}", policy.disable_copy_paste);
    println!("disable_right_click: {}", policy.disable_right_click);
    println!("block_dev_tools: {}", policy.block_dev_tools);
    println!("detect_tab_switch: {}", policy.detect_tab_switch);
    println!("shuffle_questions: {}", policy.shuffle_questions);
    println!("pin_ip: {}", policy.pin_ip);
    println!("capture_keystrokes: {}", policy.capture_keystrokes);
    Ok(())
}
