//! Markdown summary generation
//!
//! This module renders a human-readable summary of a run: its lifecycle,
//! task counters and the pages that were processed.

use crate::output::traits::{OutputResult, PageRecord, ResultBuffer, RunReport, Writer};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Pages listed in the summary before it is truncated
const MAX_LISTED_PAGES: usize = 100;

/// Writes a markdown summary file
pub struct MarkdownWriter {
    path: PathBuf,
    buffer: ResultBuffer,
}

impl MarkdownWriter {
    pub fn new(path: impl AsRef<Path>, buffer: ResultBuffer) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            buffer,
        }
    }
}

impl Writer for MarkdownWriter {
    fn name(&self) -> &str {
        "markdown"
    }

    fn save(&self, report: &RunReport) -> OutputResult<()> {
        let markdown = format_markdown_summary(report, &self.buffer.snapshot());

        let mut file = File::create(&self.path)?;
        file.write_all(markdown.as_bytes())?;

        tracing::info!(path = %self.path.display(), "summary written");
        Ok(())
    }
}

/// Formats a run report and its pages as markdown
pub fn format_markdown_summary(report: &RunReport, pages: &[PageRecord]) -> String {
    let mut md = String::new();

    md.push_str("# FastGets Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Instance**: {}\n", report.instance_id));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    if let Some(stopped) = report.stopped_at {
        md.push_str(&format!("- **Stopped**: {}\n", stopped.to_rfc3339()));
    }
    if let Some(duration) = report.duration_seconds() {
        md.push_str(&format!("- **Duration**: {:.2} seconds\n", duration));
    }
    let reason = report
        .halt_reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    md.push_str(&format!("- **Halt Reason**: {}\n", reason));
    md.push_str(&format!("- **Worker Threads**: {}\n\n", report.threads));

    md.push_str("## Task Statistics\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Seeded | {} |\n", report.seeded));
    md.push_str(&format!("| Discovered | {} |\n", report.discovered));
    md.push_str(&format!("| Succeeded | {} |\n", report.stats.succeeded));
    md.push_str(&format!("| Crawl Errors | {} |\n", report.stats.crawl_errors));
    md.push_str(&format!(
        "| Process Errors | {} |\n",
        report.stats.process_errors
    ));
    md.push_str(&format!(
        "| Rate Limit Deferrals | {} |\n",
        report.stats.rate_limited
    ));
    md.push_str(&format!("| Unprocessed | {} |\n\n", report.unprocessed));

    if !pages.is_empty() {
        md.push_str(&format!("## Pages ({})\n\n", pages.len()));
        md.push_str("| URL | Title | Status | Depth | Links |\n");
        md.push_str("|-----|-------|--------|-------|-------|\n");

        for page in pages.iter().take(MAX_LISTED_PAGES) {
            let status = page
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                page.url,
                escape_cell(page.title.as_deref().unwrap_or("")),
                status,
                page.depth,
                page.links_found
            ));
        }

        if pages.len() > MAX_LISTED_PAGES {
            md.push_str(&format!(
                "\n*...and {} more*\n",
                pages.len() - MAX_LISTED_PAGES
            ));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str("*Generated by FastGets*\n");

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
