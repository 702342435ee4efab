//! Output module for saving run results
//!
//! This module handles:
//! - The run report produced when an engine run ends
//! - Buffering page records while tasks run
//! - Writing results to SQLite and to a markdown summary

mod markdown;
mod sqlite;
mod traits;

pub use markdown::{format_markdown_summary, MarkdownWriter};
pub use sqlite::{SqliteWriter, SCHEMA_SQL};
pub use traits::{OutputError, OutputResult, PageRecord, ResultBuffer, RunReport, Writer};
