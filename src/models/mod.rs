//! Data models for extraction requests, API responses, and extracted records

use std::time::Duration;

use chrono::Local;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::traits::Record;

/// Format used for every record and metadata timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timeout for plain page rendering.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout when network capture is requested; the API does more work per page.
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(60);

/// Current local time at second precision.
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// What the browser should do when an action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    Continue,
    Abort,
}

/// Element locator used by interactive actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementSelector {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ElementSelector {
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            kind: "css".to_string(),
            value: value.into(),
            state: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Browser operation performed before the page is captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionKind {
    ScrollBottom,
    WaitForSelector {
        selector: ElementSelector,
    },
    Select {
        selector: ElementSelector,
        values: Vec<String>,
    },
    Click {
        selector: ElementSelector,
    },
}

/// One entry of the request's `actions` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(rename = "onError", skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnError>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            on_error: None,
        }
    }

    pub fn scroll_bottom() -> Self {
        Self::new(ActionKind::ScrollBottom)
    }

    pub fn wait_for(css: impl Into<String>) -> Self {
        Self::new(ActionKind::WaitForSelector {
            selector: ElementSelector::css(css),
        })
    }

    /// Waits until the element exists in the DOM, visible or not.
    pub fn wait_for_attached(css: impl Into<String>) -> Self {
        Self::new(ActionKind::WaitForSelector {
            selector: ElementSelector::css(css).with_state("attached"),
        })
    }

    pub fn select(css: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(ActionKind::Select {
            selector: ElementSelector::css(css),
            values,
        })
    }

    pub fn click(css: impl Into<String>) -> Self {
        Self::new(ActionKind::Click {
            selector: ElementSelector::css(css),
        })
    }

    #[must_use]
    pub fn on_error(mut self, policy: OnError) -> Self {
        self.on_error = Some(policy);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Contains,
}

/// Selects which browser network exchanges are returned with the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFilter {
    pub filter_type: FilterType,
    pub value: String,
    pub match_type: MatchType,
    pub http_response_body: bool,
}

impl CaptureFilter {
    /// Captures every exchange whose URL contains `pattern`, with its body.
    pub fn url_contains(pattern: impl Into<String>) -> Self {
        Self {
            filter_type: FilterType::Url,
            value: pattern.into(),
            match_type: MatchType::Contains,
            http_response_body: true,
        }
    }
}

/// Which top-level key a successful response must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    BrowserHtml,
    NetworkCapture,
    ProductList,
}

impl PayloadKind {
    pub const fn key(self) -> &'static str {
        match self {
            Self::BrowserHtml => "browserHtml",
            Self::NetworkCapture => "networkCapture",
            Self::ProductList => "productList",
        }
    }
}

/// Declarative request body for the extraction endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub url: String,
    #[serde(skip_serializing_if = "is_false")]
    pub browser_html: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub product_list: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network_capture: Vec<CaptureFilter>,
}

impl RequestSpec {
    /// Rendered-HTML request for `url`.
    pub fn browser_html(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            browser_html: true,
            ..Self::default()
        }
    }

    /// Automatic product-list extraction for `url`.
    pub fn product_list(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            product_list: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_javascript(mut self, enabled: bool) -> Self {
        self.javascript = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn with_capture(mut self, filter: CaptureFilter) -> Self {
        self.network_capture.push(filter);
        self
    }

    /// The payload key whose presence marks a usable response.
    pub fn expected_payload(&self) -> PayloadKind {
        if !self.network_capture.is_empty() {
            PayloadKind::NetworkCapture
        } else if self.browser_html || !self.product_list {
            PayloadKind::BrowserHtml
        } else {
            PayloadKind::ProductList
        }
    }

    pub fn timeout(&self) -> Duration {
        if self.network_capture.is_empty() {
            PAGE_TIMEOUT
        } else {
            CAPTURE_TIMEOUT
        }
    }
}

/// A browser network exchange recorded during rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedExchange {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub status: Option<u16>,
    /// Base64-encoded response body.
    #[serde(default)]
    pub http_response_body: Option<String>,
}

/// Successful response from the extraction endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub browser_html: Option<String>,
    /// Raw exchanges; each one is validated on its own when decoded.
    #[serde(default)]
    pub network_capture: Option<Vec<Value>>,
    #[serde(default)]
    pub product_list: Option<Value>,
}

/// A quote scraped from rendered markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub text: String,
    pub author: String,
    pub tags: Vec<String>,
    pub scraped_at: String,
}

impl Record for QuoteRecord {
    const COLLECTION: &'static str = "quotes";
}

/// A quote decoded from a captured API response, tagged with its exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedQuote {
    pub author: String,
    pub tags: Vec<String>,
    pub text: String,
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub timestamp: String,
}

impl Record for CapturedQuote {
    const COLLECTION: &'static str = "captures";
}

/// A product listing, from markup, captured JSON, or the automatic product list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub subtitle: String,
    pub price: String,
    pub currency: String,
    pub image_url: String,
    pub product_url: String,
    pub colorway: String,
    pub style_code: String,
    pub available: bool,
    pub scraped_at: String,
}

impl Record for ProductRecord {
    const COLLECTION: &'static str = "products";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub count: usize,
    pub timestamp: String,
}

/// Records of one run plus the metadata written alongside them.
///
/// Serializes as `{<collection>: [...], "metadata": {...}}`, records first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEnvelope<R> {
    pub records: Vec<R>,
    pub metadata: Metadata,
}

impl<R> ResultEnvelope<R> {
    pub fn new(records: Vec<R>) -> Self {
        let metadata = Metadata {
            count: records.len(),
            timestamp: timestamp_now(),
        };
        Self { records, metadata }
    }
}

impl<R: Record> Serialize for ResultEnvelope<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(R::COLLECTION, &self.records)?;
        map.serialize_entry("metadata", &self.metadata)?;
        map.end()
    }
}
