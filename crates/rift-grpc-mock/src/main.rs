//! Rift gRPC mock CLI
//!
//! Checks mock configuration files and answers permission questions against
//! them.
//!
//! Usage:
//!   rift-grpc-mock check <config>
//!   rift-grpc-mock allowed <config> <target>

use clap::{Parser, Subcommand};
use rift_grpc_mock::config::MockConfig;
use rift_grpc_mock::permission::{is_connection_allowed, TargetUri};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// Rift gRPC mock configuration tool
#[derive(Parser, Debug)]
#[command(name = "rift-grpc-mock")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate a config file, then summarize its stubs
    Check {
        /// Path to a YAML or JSON mock configuration
        config: PathBuf,
    },
    /// Report whether the configured policy lets a call reach `target`
    Allowed {
        /// Path to a YAML or JSON mock configuration
        config: PathBuf,
        /// Call target such as `localhost:50051` or `https://api.example.com`
        target: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    match run(args.command) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Check { config } => {
            let mock = MockConfig::from_file(&config)?;
            println!("{}: ok", config.display());
            println!("  enabled: {}", mock.enabled);
            println!("  net connect allowed: {}", mock.net_connect.allow);
            println!("  localhost allowed: {}", mock.net_connect.allow_localhost);
            println!("  allow list entries: {}", mock.net_connect.allow_list.len());

            let mut per_method: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
            for stub in &mock.stubs {
                let entry = per_method.entry(stub.method.as_str()).or_default();
                entry.0 += 1;
                entry.1 += stub.responses.len();
            }
            for (method, (stubs, responses)) in per_method {
                println!("  {method}: {stubs} stub(s), {responses} response(s)");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Allowed { config, target } => {
            let mock = MockConfig::from_file(&config)?;
            let uri = TargetUri::parse(&target)?;
            let allowed = is_connection_allowed(&mock.net_connect_config()?, &target);
            if allowed {
                println!("allowed: {uri}");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("denied: {uri}");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
