//! HTTP task family
//!
//! Blocking fetches, HTML parsing and the link-following task built on them.

mod fetcher;
mod parser;
mod task;

pub use fetcher::{build_http_client, fetch_page, user_agent};
pub use parser::{parse_html, ParsedPage};
pub use task::{Handler, HttpShared, LinkTask};
