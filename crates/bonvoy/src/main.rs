//! bonvoy CLI Application

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use bonvoy::cli::{self, Cli, Commands, EXIT_FAILURE, EXIT_OK, EXIT_ROLLBACK_WARNINGS};
use bonvoy::commands::{rollback, shipit, status};
use bonvoy::tracing::{TracingConfig, init_tracing};
use miette::IntoDiagnostic;
use serde::Serialize;

fn main() {
    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        filter: None,
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("{e:?}");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let exit_code = match rt.block_on(run(cli)) {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            EXIT_FAILURE
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> miette::Result<i32> {
    match cli.command {
        Commands::ShipIt {
            dry_run,
            force,
            since,
        } => {
            let args = shipit::ShipItArgs {
                dry_run,
                force,
                since,
            };
            let report = shipit::execute(&cli.path, &args).await?;
            emit(cli.json, &report, shipit::render)?;
            Ok(EXIT_OK)
        }
        Commands::Rollback { dry_run } => {
            let report = rollback::execute(&cli.path, dry_run).await?;
            emit(cli.json, &report, rollback::render)?;
            Ok(if report.has_warnings() {
                EXIT_ROLLBACK_WARNINGS
            } else {
                EXIT_OK
            })
        }
        Commands::Status => {
            let output = status::execute(&cli.path).await?;
            emit(cli.json, &output, status::render)?;
            Ok(EXIT_OK)
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, render: fn(&T) -> String) -> miette::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    } else {
        println!("{}", render(value));
    }
    Ok(())
}
