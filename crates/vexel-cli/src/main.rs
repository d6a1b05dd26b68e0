//! Operator tool for Vexel extension descriptors.
//!
//! Validates, inspects and lists `.vex` descriptors without starting
//! the editor — the install-troubleshooting companion to the in-app
//! extension manager.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use vexel_extension::{loader, ErrorLog, Registry};

/// Inspect and validate Vexel extension descriptors.
#[derive(Parser, Debug)]
#[command(name = "vexel-ext")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a descriptor and its dependencies.
    Validate {
        /// Path to the descriptor file.
        #[arg(required = true)]
        path: PathBuf,
        /// Directory for the diagnostic log (defaults to the system
        /// temp directory).
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Show a descriptor's identity, parameters and dependencies.
    Info {
        /// Path to the descriptor file.
        #[arg(required = true)]
        path: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Discover descriptors in a directory.
    List {
        /// Directory to scan.
        #[arg(required = true)]
        dir: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "vexel_extension=debug"
    } else {
        "warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Validate { path, log_dir } => validate(&path, log_dir),
        Command::Info { path, json } => info(&path, json),
        Command::List { dir, json } => list(&dir, json),
    }
}

fn validate(path: &Path, log_dir: Option<PathBuf>) -> Result<()> {
    let registry = Registry::new();
    let ext = loader::build_from_file(path, None, &registry)?;

    let log_dir = log_dir.unwrap_or_else(std::env::temp_dir);
    let log = ErrorLog::open(&log_dir);
    let ok = ext.read().check(&log);
    log.close();

    if ok {
        println!("{}: OK", ext.read().id());
        Ok(())
    } else {
        if let Ok(contents) = std::fs::read_to_string(log.path()) {
            eprint!("{contents}");
        }
        bail!("{}: validation failed", ext.read().id());
    }
}

fn info(path: &Path, json: bool) -> Result<()> {
    let registry = Registry::new();
    let ext = loader::build_from_file(path, None, &registry)?;
    let ext = ext.read();
    let descriptor = ext.descriptor();

    if json {
        let value = serde_json::json!({
            "id": descriptor.id(),
            "name": descriptor.name(),
            "state": ext.state(),
            "gui": descriptor.gui(),
            "parameters": descriptor.parameters(),
            "dependencies": descriptor.dependencies(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("id:    {}", descriptor.id());
    println!("name:  {}", descriptor.name());
    println!("state: {}", ext.state());
    println!("parameters ({}):", descriptor.parameters().len());
    for param in descriptor.parameters() {
        match param.label() {
            Some(label) => println!("  {} ({label})", param.name()),
            None => println!("  {}", param.name()),
        }
    }
    println!("dependencies ({}):", descriptor.dependencies().len());
    for dep in descriptor.dependencies() {
        println!("{dep}");
    }
    Ok(())
}

fn list(dir: &Path, json: bool) -> Result<()> {
    let registry = Registry::new();
    loader::discover(dir, &registry);
    let infos = registry.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    if infos.is_empty() {
        println!("no extensions found in {}", dir.display());
        return Ok(());
    }
    for info in &infos {
        println!(
            "{:<40} {:<24} {} params, {} deps",
            info.id, info.name, info.parameters, info.dependencies
        );
    }
    Ok(())
}
