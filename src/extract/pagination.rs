//! Next-page discovery for classic "Next →" pagination

use scraper::Html;
use url::Url;

use super::parse_selector;

const NEXT_LINK: &str = "li.next a";

/// Finds the next-page link in `html`, resolved against `current_url`.
pub fn next_page_url(html: &str, current_url: &str) -> Option<String> {
    let selector = parse_selector(NEXT_LINK).ok()?;
    let document = Html::parse_document(html);

    let href = document
        .select(&selector)
        .next()?
        .value()
        .attr("href")?
        .trim();
    if href.is_empty() {
        return None;
    }

    match Url::parse(current_url).and_then(|base| base.join(href)) {
        Ok(next) => Some(next.to_string()),
        Err(_) if href.starts_with("http") => Some(href.to_string()),
        Err(_) => None,
    }
}
