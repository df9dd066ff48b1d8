//! `bosun` -- MCP server brokering shell commands to SSH hosts.
//!
//! Subcommands:
//!
//! - `bosun serve` -- serve the MCP tool set over stdio.
//! - `bosun policy check <cmd>` -- classify a command offline.
//! - `bosun config show` -- print the resolved configuration, redacted.
//!
//! Exit codes: `0` orderly shutdown, `1` configuration error, `2` fatal
//! initialisation error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use bosun_policy::PolicyEngine;
use bosun_server::{AuditLog, SecretRedactor, ServerContext, ServerShell};
use bosun_types::{BosunError, Config};

/// bosun SSH command broker CLI.
#[derive(Parser)]
#[command(
    name = "bosun",
    about = "MCP server brokering shell commands to SSH hosts",
    version,
    disable_help_subcommand = true
)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides BOSUN_CONFIG).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Serve the MCP tool set over stdio.
    Serve,

    /// Inspect the command policy.
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Inspect the resolved configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Classify a command under the active permissibility tier.
    Check {
        /// The command line to classify.
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration as YAML, secrets redacted.
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bosun: {e}");
            return ExitCode::from(1);
        }
    };

    init_tracing(&cli, &config);

    let result = match &cli.command {
        Commands::Serve => serve(config).await,
        Commands::Policy {
            action: PolicyAction::Check { command },
        } => policy_check(&config, &command.join(" ")),
        Commands::Config {
            action: ConfigAction::Show,
        } => config_show(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            match e {
                BosunError::ConfigInvalid { .. } | BosunError::Yaml(_) => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}

/// Logs go to stderr: stdout is the JSON-RPC channel.
fn init_tracing(cli: &Cli, config: &Config) {
    let default_filter = if cli.verbose || config.debug {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(config: Config) -> Result<(), BosunError> {
    let ctx = Arc::new(ServerContext::new(config)?);
    info!(
        level = ctx.policy.level().as_str(),
        max_sessions = ctx.config.limits.max_sessions,
        "bosun MCP server starting on stdio"
    );

    let cancel = CancellationToken::new();
    let maintenance = ctx.clone().start_maintenance(cancel.clone());

    let mut shell = ServerShell::new(ctx.clone());
    let secrets = ctx.config.secrets().into_iter().cloned().collect();
    shell.add_middleware(Arc::new(SecretRedactor::new(secrets)));
    shell.add_middleware(Arc::new(AuditLog));

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        result = shell.run(stdin, stdout) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    cancel.cancel();
    maintenance.abort();
    ctx.shutdown().await;
    info!("all sessions closed");
    Ok(())
}

fn policy_check(config: &Config, command: &str) -> Result<(), BosunError> {
    let engine = PolicyEngine::new(config.permissibility, &config.policy)?;
    let result = engine.validate(command);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn config_show(config: &Config) -> Result<(), BosunError> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
