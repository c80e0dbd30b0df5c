use std::{
    io::{self, BufRead},
    path::PathBuf,
};

use clap::Parser;
use serde_json::json;
use specforge::{AmendError, AmendOptions, Amender, AmendmentResult, Config, ConflictPolicy, Format};
use tracing::instrument;

use super::{
    read_input,
    terminal::{Colorize, rule},
    write_output,
};

#[derive(Debug, Parser)]
#[command(about = "Apply a change description to an existing document")]
pub struct Amend {
    /// The document to amend (Markdown, OpenAPI YAML or JSON)
    base: PathBuf,

    /// The change description (`-` for standard input)
    changes: PathBuf,

    /// Conflict policy: `strict` or `auto` (overrides the configuration)
    #[arg(long, value_name = "POLICY")]
    policy: Option<ConflictPolicy>,

    /// Output format (overrides the configuration)
    #[arg(long, short, value_name = "FORMAT")]
    format: Option<Format>,

    /// Where to write the amended document (defaults to standard output)
    #[arg(long, short, conflicts_with = "in_place")]
    output: Option<PathBuf>,

    /// Overwrite the base document with the result
    #[arg(long)]
    in_place: bool,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Amend {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let options = AmendOptions {
            policy: self.policy.unwrap_or(config.conflict_policy),
            dry_run: self.dry_run,
            format: self.format.unwrap_or(config.output_format),
        };

        let base = read_input(&self.base)?;
        let changes = read_input(&self.changes)?;

        let result = match Amender::new(options).amend(&base, &changes) {
            Ok(result) => result,
            Err(error @ (AmendError::Base(_) | AmendError::Changes(_))) => {
                let path = match error {
                    AmendError::Base(_) => &self.base,
                    _ => &self.changes,
                };
                for parse_error in error.parse_errors() {
                    eprintln!("{}", format!("{}:{parse_error}", path.display()).error());
                }
                anyhow::bail!(error);
            }
            Err(error) => return Err(error.into()),
        };

        if self.json {
            self.output_json(&result)?;
        } else {
            Self::output_report(&result);
        }

        if let Some(output) = &result.output {
            self.write(output, &result)?;
        }

        // Exit with code 2 to indicate unapplied changes (for CI)
        if !result.is_clean() {
            std::process::exit(2);
        }
        Ok(())
    }

    fn write(&self, output: &str, result: &AmendmentResult) -> anyhow::Result<()> {
        if !self.in_place {
            return write_output(self.output.as_deref(), output);
        }

        if !result.is_clean() {
            eprintln!(
                "{}",
                "Not overwriting the base document: some changes were not applied".warning()
            );
            return Ok(());
        }

        if !self.yes {
            eprint!(
                "\nOverwrite {} with {} changes? (y/N) ",
                self.base.display(),
                result.changes.len()
            );
            let stdin = io::stdin();
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            if !line.trim().eq_ignore_ascii_case("y") {
                eprintln!("Cancelled");
                std::process::exit(130);
            }
        }

        write_output(Some(self.base.as_path()), output)?;
        eprintln!(
            "{}",
            format!("✅ Updated {}", self.base.display()).success()
        );
        Ok(())
    }

    fn output_report(result: &AmendmentResult) {
        eprintln!("{}", rule());
        for change in &result.changes {
            eprintln!("  {} {change}", "✓".success());
        }
        for conflict in &result.conflicts {
            let location = if conflict.line > 0 {
                format!("line {}: ", conflict.line)
            } else {
                String::new()
            };
            eprintln!("  {}", format!("✗ {location}conflict: {conflict}").error());
        }
        for error in &result.errors {
            eprintln!("  {}", format!("✗ {error}").error());
        }
        for warning in &result.warnings {
            eprintln!("  {}", format!("! {warning}").warning());
        }
        eprintln!("{}", rule());

        let summary = format!(
            "{} applied, {} conflicts, {} errors, {} warnings",
            result.changes.len(),
            result.conflicts.len(),
            result.errors.len(),
            result.warnings.len()
        );
        if result.is_clean() {
            eprintln!("{}", summary.success());
        } else {
            eprintln!("{}", summary.warning());
        }
        if result.output.is_none() {
            eprintln!("{}", "Dry run: nothing was written".dim());
        }
    }

    fn output_json(&self, result: &AmendmentResult) -> anyhow::Result<()> {
        let conflicts: Vec<_> = result
            .conflicts
            .iter()
            .map(|conflict| {
                json!({
                    "kind": conflict.kind,
                    "identity": conflict.identity,
                    "reason": conflict.reason.to_string(),
                    "existing": conflict.existing,
                    "incoming": conflict.incoming,
                    "line": conflict.line,
                })
            })
            .collect();

        let report = json!({
            "base": self.base.display().to_string(),
            "dry_run": self.dry_run,
            "changes": result.changes,
            "conflicts": conflicts,
            "errors": result.errors,
            "warnings": result.warnings,
            "output_size": result.output_size,
        });

        eprintln!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
