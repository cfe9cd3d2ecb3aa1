//! Analyze command - run the full pipeline and write every document

use super::Invocation;
use crate::pipeline::run_analysis;
use crate::reporters::{render_summary, write_documents};
use anyhow::{Context, Result};
use console::style;
use std::time::Instant;
use tracing::info;

pub(super) fn run(invocation: &Invocation) -> Result<()> {
    let start = Instant::now();
    eprintln!(
        "\n{} Analyzing {}\n",
        style("◆").cyan().bold(),
        style(invocation.root.display()).bold()
    );

    let report = run_analysis(&invocation.root, &invocation.config, &invocation.options)?;
    let written = write_documents(&report, &invocation.output_dir)
        .with_context(|| format!("Failed to write documents to {}", invocation.output_dir.display()))?;
    info!("Wrote {} documents", written.len());

    print!("{}", render_summary(&report, invocation.format)?);

    eprintln!(
        "\n{}Documents written to {} in {:.2}s",
        style("✓ ").green(),
        style(invocation.output_dir.display()).cyan(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
