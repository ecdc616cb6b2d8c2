use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use flow_engine::store::import_flow;
use flow_engine::validation::{count_severity, has_errors};
use flow_engine::{
    validate_flow, BroadcastEventSink, ExecutorConfig, FlowEngineError, FlowExecutor, LogEntry,
    LogStatus, Result, Severity,
};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;

/// Validate and run flow documents
#[derive(Parser, Debug)]
#[command(name = "flowctl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the structural diagnostics of a flow
    Validate {
        /// Path to the flow JSON file
        file: PathBuf,
    },
    /// Execute a flow, streaming its log
    Run {
        /// Path to the flow JSON file
        file: PathBuf,
        /// Pause between nodes in milliseconds (0 = no pause)
        #[arg(long)]
        pacing_ms: Option<u64>,
        /// Maximum number of node executions
        #[arg(long)]
        max_steps: Option<u32>,
        /// Refuse to run flows with validation errors
        #[arg(long)]
        require_valid: bool,
        /// Executor config JSON file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Initial variable, as KEY=JSON (repeatable)
        #[arg(long = "set", value_name = "KEY=JSON")]
        variables: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Validate { file } => validate(file),
        Command::Run {
            file,
            pacing_ms,
            max_steps,
            require_valid,
            config,
            variables,
        } => {
            let config = match load_config(config, pacing_ms, max_steps, require_valid) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            run(file, config, &variables).await
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the flow is free of errors.
fn validate(file: PathBuf) -> Result<bool> {
    let flow = import_flow(&file)?;
    let diagnostics = validate_flow(&flow);

    for diagnostic in &diagnostics {
        match &diagnostic.node_id {
            Some(node_id) => println!("{} [{}]", diagnostic, node_id),
            None => println!("{}", diagnostic),
        }
    }
    println!(
        "{}: {} error(s), {} warning(s)",
        flow.name,
        count_severity(&diagnostics, Severity::Error),
        count_severity(&diagnostics, Severity::Warning)
    );

    Ok(!has_errors(&diagnostics))
}

fn load_config(
    path: Option<PathBuf>,
    pacing_ms: Option<u64>,
    max_steps: Option<u32>,
    require_valid: bool,
) -> Result<ExecutorConfig> {
    let mut config = match path {
        Some(path) => ExecutorConfig::from_file(path)?,
        None => ExecutorConfig::default(),
    };
    if let Some(pacing_ms) = pacing_ms {
        config.pacing_ms = pacing_ms;
    }
    if let Some(max_steps) = max_steps {
        config.max_steps = max_steps;
    }
    config.require_valid |= require_valid;
    config.validate()?;
    Ok(config)
}

/// Returns whether the run succeeded.
async fn run(file: PathBuf, config: ExecutorConfig, variables: &[String]) -> Result<bool> {
    let flow = import_flow(&file)?;
    let variables = parse_variables(variables)?;

    let sink = Arc::new(BroadcastEventSink::default());
    let mut logs = sink.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match logs.recv().await {
                Ok(entry) => println!("{}", format_entry(&entry)),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Skipped {} log entries", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let executor = FlowExecutor::new(sink).with_config(config);
    let report = executor.run_with_context(&flow, variables).await;

    // Dropping the executor closes the log channel and ends the printer
    drop(executor);
    if let Err(e) = printer.await {
        log::warn!("Log printer stopped abnormally: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.is_success())
}

fn format_entry(entry: &LogEntry) -> String {
    let status = match entry.status {
        LogStatus::Info => "INFO",
        LogStatus::Success => "OK",
        LogStatus::Warning => "WARN",
        LogStatus::Error => "ERROR",
    };
    format!(
        "[{}] {:<5} {}: {}",
        entry.timestamp.format("%H:%M:%S%.3f"),
        status,
        entry.node_label,
        entry.message
    )
}

/// Parse `KEY=JSON` assignments; values that are not valid JSON are taken as
/// plain strings.
fn parse_variables(assignments: &[String]) -> Result<Map<String, Value>> {
    let mut variables = Map::new();
    for assignment in assignments {
        let (key, raw) = assignment.split_once('=').ok_or_else(|| {
            FlowEngineError::Config(format!("expected KEY=JSON, got '{}'", assignment))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(FlowEngineError::Config(format!(
                "missing variable name in '{}'",
                assignment
            )));
        }
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        variables.insert(key.to_string(), value);
    }
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_variables() {
        let vars = parse_variables(&strings(&[
            "x=5",
            "user={\"name\":\"ada\"}",
            "mode=fast",
            "eq=a=b",
        ]))
        .unwrap();

        assert_eq!(vars["x"], json!(5));
        assert_eq!(vars["user"], json!({"name": "ada"}));
        assert_eq!(vars["mode"], json!("fast"));
        assert_eq!(vars["eq"], json!("a=b"));
    }

    #[test]
    fn test_parse_variables_rejects_malformed() {
        assert!(parse_variables(&strings(&["novalue"])).is_err());
        assert!(parse_variables(&strings(&["=1"])).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = load_config(None, Some(0), Some(10), true).unwrap();
        assert_eq!(config.pacing_ms, 0);
        assert_eq!(config.max_steps, 10);
        assert!(config.require_valid);

        assert!(load_config(None, None, Some(0), false).is_err());
    }

    #[test]
    fn test_cli_parses_run_arguments() {
        let cli = Cli::try_parse_from([
            "flowctl",
            "run",
            "flow.json",
            "--pacing-ms",
            "0",
            "--set",
            "x=1",
            "--set",
            "y=2",
        ])
        .unwrap();

        match cli.command {
            Command::Run {
                pacing_ms,
                variables,
                require_valid,
                ..
            } => {
                assert_eq!(pacing_ms, Some(0));
                assert_eq!(variables, vec!["x=1", "y=2"]);
                assert!(!require_valid);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
