//! SFC orchagent entry point.
//!
//! Loads the configuration, registers the configured drivers and executes
//! JSON-lines requests, printing one JSON response per request.

use anyhow::Context;
use clap::Parser;
use sfc_orchagent::audit::{init_logging, init_logging_pretty, AuditCategory, AuditOutcome, AuditRecord};
use sfc_orchagent::config::DEFAULT_CONFIG_PATH;
use sfc_orchagent::sfc::{build_drivers, SfcDriverManager, SfcOrch, SfcRequest};
use sfc_orchagent::{audit_log, SfcConfig, StaticInventory};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

/// Service Function Chaining orchestration agent
#[derive(Parser, Debug)]
#[command(name = "sfc-orchagent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults are used if it does not exist
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// JSON-lines request file, or "-" for stdin
    #[arg(short = 'r', long, default_value = "-")]
    requests: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.pretty {
        init_logging_pretty(&args.log_level);
    } else {
        init_logging(&args.log_level);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("sfc-orchagent failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = SfcConfig::load_or_default(&args.config)?;
    if let Err(e) = config.validate() {
        audit_log!(AuditRecord::new(
            AuditCategory::ConfigurationChange,
            "sfc-orchagent",
            "load_config"
        )
        .with_object_id(args.config.display().to_string())
        .with_error(e.to_string()));
        return Err(e.into());
    }

    let mut drivers = SfcDriverManager::new();
    if let Some(call_timeout) = config.call_timeout() {
        drivers = drivers.with_call_timeout(call_timeout);
    }
    for driver in build_drivers(&config.drivers.names)? {
        drivers.register(driver);
    }

    if drivers.is_empty() {
        warn!("No SFC drivers configured; changes are stored but not realized");
    }

    let inventory = StaticInventory::from_config(&config.inventory);
    info!(
        drivers = ?drivers.driver_names(),
        ports = inventory.port_count(),
        flow_classifiers = inventory.flow_classifier_count(),
        "Starting sfc-orchagent"
    );
    let orch = SfcOrch::new(config.orch_config(), drivers, Arc::new(inventory));

    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "sfc-orchagent", "start")
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({
            "config": args.config.display().to_string(),
            "requests": args.requests,
        })));

    let processed = if args.requests == "-" {
        serve(&orch, BufReader::new(io::stdin()), io::stdout()).await?
    } else {
        let file = File::open(&args.requests)
            .await
            .with_context(|| format!("failed to open request file {}", args.requests))?;
        serve(&orch, BufReader::new(file), io::stdout()).await?
    };

    let stats = orch.stats();
    info!(requests = processed, stats = ?stats, "All requests processed");
    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "sfc-orchagent", "stop")
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({
            "rejected_validation": stats.rejected_validation,
            "rejected_persistence": stats.rejected_persistence,
            "rejected_by_driver": stats.rejected_by_driver,
            "compensations": stats.compensations,
        })));

    Ok(())
}

/// Executes JSON-lines requests from `reader`, writing one response line per
/// request. Blank lines and `#` comments are skipped. Returns the number of
/// requests handled.
async fn serve<R, W>(orch: &SfcOrch, reader: R, mut writer: W) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number = 0;
    let mut processed = 0;

    while let Some(line) = lines.next_line().await.context("failed to read request")? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let request: SfcRequest = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid request on line {}", line_number))?;
        debug!(line = line_number, "Handling request");
        let response = orch.handle(request).await;

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        processed += 1;
    }

    Ok(processed)
}
