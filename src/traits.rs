//! Traits and selector configuration shared across the pipeline

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::models::RequestSpec;

/// Sends one extraction request and returns the raw JSON body.
///
/// The retry loop in [`crate::client::fetch`] only talks to this trait, so
/// tests can count calls without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single request, bounded by `timeout`.
    ///
    /// # Returns
    /// * `Result<Value, TransportError>` - Parsed response body or the reason the call failed
    async fn send(&self, spec: &RequestSpec, timeout: Duration) -> Result<Value, TransportError>;
}

/// A flat record type that can be written inside a result envelope.
pub trait Record: Serialize + DeserializeOwned {
    /// Key under which the records are stored in the result file.
    const COLLECTION: &'static str;
}

/// CSS selectors for one quote block
#[derive(Debug, Clone)]
pub struct QuoteSelectors {
    /// Container selector for individual quotes
    pub container: String,
    /// Quote text selector within the container
    pub text: String,
    /// Author selector within the container
    pub author: String,
    /// Tag selector within the container
    pub tags: String,
}

impl QuoteSelectors {
    /// Layout of the listing, paginated, and scrolling pages.
    pub fn listing() -> Self {
        Self {
            container: ".quote".to_string(),
            text: ".text".to_string(),
            author: ".author".to_string(),
            tags: ".tags .tag".to_string(),
        }
    }

    /// Layout of the search form's result page.
    pub fn search_results() -> Self {
        Self {
            container: ".quote".to_string(),
            text: ".content".to_string(),
            author: ".author".to_string(),
            tags: ".tag".to_string(),
        }
    }
}

/// CSS selectors for one product card
#[derive(Debug, Clone)]
pub struct ProductSelectors {
    /// Container selector for individual products
    pub container: String,
    /// Product name selector (required)
    pub name: String,
    /// Price selector (required)
    pub price: String,
    /// Subtitle selector (optional)
    pub subtitle: Option<String>,
    /// Product link selector
    pub link: String,
    /// Image selector
    pub image: String,
}

impl ProductSelectors {
    /// Product grid on nike.com category pages.
    pub fn product_grid() -> Self {
        Self {
            container: ".product-card".to_string(),
            name: ".product-card__title".to_string(),
            price: ".product-price".to_string(),
            subtitle: Some(".product-card__subtitle".to_string()),
            link: "a.product-card__link-overlay".to_string(),
            image: "img.product-card__hero-image".to_string(),
        }
    }
}

/// A category listing site whose pages are requested through the API
#[derive(Debug, Clone)]
pub struct ListingSite {
    /// Display name for the website
    pub name: String,
    /// Base URL used to resolve relative links
    pub base_url: String,
    /// Listing URL pattern with a {category} placeholder
    pub listing_url_pattern: String,
    /// URL fragment identifying the product wall API in captures
    pub capture_pattern: String,
}

impl ListingSite {
    pub fn nike() -> Self {
        Self {
            name: "Nike".to_string(),
            base_url: "https://www.nike.com".to_string(),
            listing_url_pattern: "https://www.nike.com/in/w/{category}".to_string(),
            capture_pattern: "product_wall".to_string(),
        }
    }

    /// Process a category id to create the listing URL
    pub fn listing_url(&self, category: &str) -> String {
        let encoded = urlencoding::encode(category);
        self.listing_url_pattern.replace("{category}", &encoded)
    }
}
