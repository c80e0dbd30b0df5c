use std::path::{Path, PathBuf};

mod amend;
mod diff;
mod generate;
mod terminal;
mod validate;

use amend::Amend;
use anyhow::Context;
use clap::ArgAction;
use diff::Diff;
use generate::Generate;
use specforge::{Config, Document, SourceFormat, openapi};
use terminal::Colorize;
use tracing::instrument;
use validate::Validate;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the configuration file
    #[arg(short, long, default_value = specforge::config::FILE_NAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command.run(&self.config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Convert a Markdown API description into OpenAPI
    Generate(Generate),

    /// Apply a change description to an existing document
    ///
    /// Conflicting changes are reported, or applied anyway with
    /// `--policy auto`.
    Amend(Amend),

    /// Check a document for structural problems
    Validate(Validate),

    /// Show the differences between two documents
    Diff(Diff),

    /// Write a configuration file with the default settings
    Init,
}

impl Command {
    fn run(self, config_path: &Path) -> anyhow::Result<()> {
        let config = || Config::load_or_default(config_path).map_err(anyhow::Error::msg);
        match self {
            Self::Generate(command) => command.run(&config()?)?,
            Self::Amend(command) => command.run(&config()?)?,
            Self::Validate(command) => command.run(&config()?)?,
            Self::Diff(command) => command.run()?,
            Self::Init => Init::run(config_path)?,
        }
        Ok(())
    }
}

struct Init;

impl Init {
    #[instrument]
    fn run(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!("Configuration already exists at {}", path.display());
        }

        Config::default()
            .save(path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;

        println!("Created {}", path.display());
        Ok(())
    }
}

/// Reads a Markdown or OpenAPI document from disk, or standard input.
///
/// Recoverable errors are printed as warnings. Fatal errors abort.
fn read_document(path: &Path) -> anyhow::Result<Document> {
    let text = read_input(path)?;
    let document = match SourceFormat::detect(&text) {
        SourceFormat::Markdown => specforge::parse(&text),
        SourceFormat::Yaml | SourceFormat::Json => openapi::load(&text)
            .with_context(|| format!("Failed to load {}", path.display()))?,
    };

    if let Some(fatal) = document.errors().iter().find(|e| e.fatal) {
        anyhow::bail!("{}:{fatal}", path.display());
    }
    for error in document.errors() {
        eprintln!("{}", format!("warning: {}:{error}", path.display()).warning());
    }
    Ok(document)
}

/// Reads a file, or standard input when the path is `-`.
fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut text)
            .context("Failed to read standard input")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Writes `content` to a file, or standard output when there is no path.
fn write_output(path: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{content}");
            Ok(())
        }
    }
}
