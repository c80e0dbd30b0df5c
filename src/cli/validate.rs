use std::path::PathBuf;

use clap::Parser;
use specforge::{
    Config,
    validate::{StructuralValidator, ValidationReport, Validator},
};
use tracing::instrument;

use super::{read_input, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Check a document for structural problems")]
pub struct Validate {
    /// The document to validate (Markdown, OpenAPI YAML or JSON)
    spec: PathBuf,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,

    /// Suggest best-practice improvements
    #[arg(long)]
    best_practices: bool,

    /// Accept `x-` extension keys
    #[arg(long)]
    allow_extensions: bool,

    /// Check examples against their schema types
    #[arg(long)]
    examples: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Summary,
}

impl Validate {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let mut validation = config.validation;
        validation.strict |= self.strict;
        validation.check_best_practices |= self.best_practices;
        validation.allow_extensions |= self.allow_extensions;
        validation.validate_examples |= self.examples;

        let text = read_input(&self.spec)?;
        let report = StructuralValidator.validate(&text, &validation);

        match self.output {
            OutputFormat::Table => self.output_table(&report),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Summary => self.output_summary(&report),
        }

        // Exit with code 2 to indicate an invalid document (for CI)
        if !report.valid {
            std::process::exit(2);
        }
        Ok(())
    }

    fn output_table(&self, report: &ValidationReport) {
        for error in &report.errors {
            println!("{}", format!("✗ {error}").error());
        }
        if self.quiet {
            return;
        }
        for warning in &report.warnings {
            println!("{}", format!("! {warning}").warning());
        }
        for suggestion in &report.suggestions {
            println!("{}", format!("· {suggestion}").info());
        }
        if !report.errors.is_empty() || !report.warnings.is_empty() || !report.suggestions.is_empty()
        {
            println!();
        }
        self.output_summary(report);
    }

    fn output_summary(&self, report: &ValidationReport) {
        if self.quiet {
            return;
        }
        let summary = format!(
            "{}: {} errors, {} warnings, {} suggestions",
            self.spec.display(),
            report.errors.len(),
            report.warnings.len(),
            report.suggestions.len()
        );
        if report.valid {
            println!("{}", format!("✓ {summary}").success());
        } else {
            println!("{}", format!("✗ {summary}").error());
        }
    }
}
