use std::path::PathBuf;

use clap::Parser;
use specforge::{Config, Format, openapi};
use tracing::instrument;

use super::{read_document, terminal::Colorize, write_output};

#[derive(Debug, Parser)]
#[command(about = "Convert a Markdown API description into OpenAPI")]
pub struct Generate {
    /// The Markdown file to convert (`-` for standard input)
    input: PathBuf,

    /// Where to write the result (defaults to standard output)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Output format (overrides the configuration)
    #[arg(long, short, value_name = "FORMAT")]
    format: Option<Format>,

    /// Fail if the input has any errors, including recoverable ones
    #[arg(long)]
    strict: bool,
}

impl Generate {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        let format = self.format.unwrap_or(config.output_format);
        let document = read_document(&self.input)?;

        if self.strict && document.has_errors() {
            anyhow::bail!(
                "{} has {} errors",
                self.input.display(),
                document.errors().len()
            );
        }

        let output = openapi::render(&document, format)?;
        write_output(self.output.as_deref(), &output)?;

        if let Some(path) = &self.output {
            eprintln!(
                "{}",
                format!(
                    "✅ Wrote {} endpoints and {} components to {}",
                    document.endpoints().len(),
                    document.components().len(),
                    path.display()
                )
                .success()
            );
        }
        Ok(())
    }
}
