//! Quote extraction from rendered pages and captured quote API responses

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::{Extraction, first_text, parse_selector};
use crate::decoder::DecodedBody;
use crate::error::ExtractError;
use crate::models::{CapturedQuote, QuoteRecord, timestamp_now};
use crate::traits::QuoteSelectors;

/// Pulls [`QuoteRecord`]s out of rendered quote pages.
pub struct QuoteExtractor {
    container: Selector,
    text: Selector,
    author: Selector,
    tags: Selector,
}

impl QuoteExtractor {
    pub fn new(selectors: &QuoteSelectors) -> Result<Self, ExtractError> {
        Ok(Self {
            container: parse_selector(&selectors.container)?,
            text: parse_selector(&selectors.text)?,
            author: parse_selector(&selectors.author)?,
            tags: parse_selector(&selectors.tags)?,
        })
    }

    /// Builds a record from one quote block. Text and author are required.
    pub fn extract(&self, quote: ElementRef<'_>) -> Result<QuoteRecord, ExtractError> {
        let text = first_text(quote, &self.text)
            .map(|t| strip_quote_marks(&t).to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ExtractError::MissingField("text"))?;

        let author = first_text(quote, &self.author)
            .filter(|a| !a.is_empty())
            .ok_or(ExtractError::MissingField("author"))?;

        let tags = quote
            .select(&self.tags)
            .map(|tag| tag.text().collect::<String>().trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(QuoteRecord {
            text,
            author,
            tags,
            scraped_at: timestamp_now(),
        })
    }

    /// Extracts every quote block of `html` in document order.
    pub fn extract_all(&self, html: &str) -> Extraction<QuoteRecord> {
        let document = Html::parse_document(html);
        let mut extraction = Extraction::default();

        for (index, quote) in document.select(&self.container).enumerate() {
            extraction.push(&format!("quote #{}", index + 1), self.extract(quote));
        }

        extraction
    }
}

/// Removes the one pair of quotes the site wraps around every quote.
fn strip_quote_marks(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix('“')
        .or_else(|| text.strip_prefix('"'))
        .unwrap_or(text);
    let text = text
        .strip_suffix('”')
        .or_else(|| text.strip_suffix('"'))
        .unwrap_or(text);
    text.trim()
}

/// Builds a record from one quote object of the quotes API.
pub fn captured_quote(quote: &Value, source: &DecodedBody) -> Result<CapturedQuote, ExtractError> {
    let text = quote
        .get("text")
        .and_then(Value::as_str)
        .ok_or(ExtractError::MissingField("text"))?;

    let author = quote
        .get("author")
        .and_then(|a| a.get("name"))
        .and_then(Value::as_str)
        .ok_or(ExtractError::MissingField("author.name"))?;

    let tags: Vec<String> = quote
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(CapturedQuote {
        author: author.to_string(),
        tags,
        text: text.to_string(),
        url: source.url.clone(),
        method: source.method.clone(),
        status: source.status,
        timestamp: timestamp_now(),
    })
}

/// Extracts the `quotes` array of a decoded quotes API body.
pub fn extract_captured_quotes(body: &DecodedBody) -> Extraction<CapturedQuote> {
    let mut extraction = Extraction::default();

    let Some(quotes) = body.json.get("quotes").and_then(Value::as_array) else {
        return extraction;
    };

    for (index, quote) in quotes.iter().enumerate() {
        extraction.push(
            &format!("quote #{} of {}", index + 1, body.url),
            captured_quote(quote, body),
        );
    }

    extraction
}
