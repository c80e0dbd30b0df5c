use std::path::PathBuf;

use clap::Parser;
use specforge::diff::{self, DifferenceKind};
use tracing::instrument;

use super::{read_document, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Show the differences between two documents")]
pub struct Diff {
    /// The original document
    base: PathBuf,

    /// The document to compare against it
    target: PathBuf,

    /// Only show breaking differences
    #[arg(long)]
    breaking_only: bool,

    /// Print the differences as JSON
    #[arg(long)]
    json: bool,

    /// Exit with code 2 if any difference is breaking
    #[arg(long)]
    fail_on_breaking: bool,
}

impl Diff {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let base = read_document(&self.base)?;
        let target = read_document(&self.target)?;

        let mut differences = diff::compare(&base, &target);
        if self.breaking_only {
            differences.retain(|d| d.breaking);
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&differences)?);
        } else if differences.is_empty() {
            println!("{}", "No differences".success());
        } else {
            for difference in &differences {
                let marker = match difference.kind {
                    DifferenceKind::Added => "+",
                    DifferenceKind::Removed => "-",
                    DifferenceKind::Modified => "~",
                };
                let line = format!("{marker} {difference}");
                if difference.breaking {
                    println!("{}", line.error());
                } else {
                    println!("{}", line.info());
                }
            }
        }

        if self.fail_on_breaking && differences.iter().any(|d| d.breaking) {
            std::process::exit(2);
        }
        Ok(())
    }
}
