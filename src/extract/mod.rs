//! Field extraction from rendered markup and decoded JSON.
//!
//! Every extractor works one source unit at a time and returns a
//! `Result` for it. Batch helpers collect the records in source order and
//! count the units that had to be skipped.

pub mod pagination;
pub mod products;
pub mod quotes;

use scraper::{ElementRef, Selector};
use serde_json::Value;
use tracing::warn;

use crate::error::ExtractError;

pub use pagination::next_page_url;
pub use products::{
    ProductExtractor, extract_product_list, extract_product_wall, total_resources,
};
pub use quotes::{QuoteExtractor, extract_captured_quotes};

/// Records pulled from one document or JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<R> {
    /// Records in source order.
    pub records: Vec<R>,
    /// Units that produced no record.
    pub skipped: usize,
}

impl<R> Default for Extraction<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

impl<R> Extraction<R> {
    /// Keeps the record, or logs and counts the skip.
    pub fn push(&mut self, unit: &str, result: Result<R, ExtractError>) {
        match result {
            Ok(record) => self.records.push(record),
            Err(e) => {
                warn!("Skipping {}: {}", unit, e);
                self.skipped += 1;
            }
        }
    }

    pub fn append(&mut self, other: Self) {
        self.records.extend(other.records);
        self.skipped += other.skipped;
    }
}

pub(crate) fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::InvalidSelector {
        selector: css.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Trimmed text of the first match, if any.
pub(crate) fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Follows `path` through nested objects and renders the leaf as text.
///
/// Absent keys, nulls, and containers all yield an empty string.
pub(crate) fn text_at(value: &Value, path: &[&str]) -> String {
    let leaf = path.iter().try_fold(value, |node, key| node.get(*key));
    match leaf {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
