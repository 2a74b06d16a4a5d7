//! stampa: configuration publisher CLI for stampa-based applications.
#![deny(clippy::all, clippy::pedantic)]

use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use stampa::{
    publish::{PublishError, PublishOutcome, publish_config},
    telemetry::{self, TelemetryError},
};
use thiserror::Error;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Parser)]
#[command(name = "stampa", version, about = "PDF response layer utilities")]
struct CliArgs {
    /// Application root that receives published files.
    #[arg(
        long = "app-dir",
        env = "STAMPA_APP_DIR",
        value_name = "PATH",
        default_value = "."
    )]
    app_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish the default PDF configuration into the application's config directory.
    Publish,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", paint(RED, "error:"));
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = CliArgs::parse();
    telemetry::init()?;

    match args.command {
        Command::Publish => run_publish(&args.app_dir),
    }
}

fn run_publish(app_dir: &Path) -> Result<(), CliError> {
    match publish_config(app_dir)? {
        PublishOutcome::Published(path) => {
            println!(
                "  {} You can customize the configuration by editing \"{}\".",
                paint(GREEN, "Published!"),
                path.display()
            );
        }
        PublishOutcome::SkippedExisting(path) => {
            println!(
                "  {} \"{}\" already exists and was left untouched.",
                paint(GREEN, "Found existing:"),
                path.display()
            );
        }
    }
    Ok(())
}

fn paint(color: &str, text: &str) -> String {
    if std::io::stdout().is_terminal() {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}
