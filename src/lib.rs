//! Rendered-page extraction through the Zyte API.
//!
//! Requests are described declaratively ([`models::RequestSpec`]), sent with
//! bounded retry ([`client::fetch`]), decoded ([`decoder`]), mapped to flat
//! records ([`extract`]) and written as JSON envelopes ([`sink`]). The
//! [`harvester::Harvester`] jobs chain those steps for each scraping
//! scenario.

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod harvester;
pub mod models;
pub mod sink;
pub mod traits;

pub use client::{ExtractClient, fetch};
pub use config::ApiConfig;
pub use harvester::{ComparisonReport, ComparisonRun, Harvest, Harvester, RunStats};
