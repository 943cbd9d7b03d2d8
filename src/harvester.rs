use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::client::{ExtractClient, fetch};
use crate::config::ApiConfig;
use crate::decoder::{Payload, decode_captures};
use crate::extract::{
    Extraction, ProductExtractor, QuoteExtractor, extract_captured_quotes, extract_product_list,
    extract_product_wall, next_page_url, total_resources,
};
use crate::models::{
    Action, CaptureFilter, CapturedQuote, OnError, ProductRecord, QuoteRecord, RequestSpec,
    timestamp_now,
};
use crate::sink::ResultSink;
use crate::traits::{ListingSite, ProductSelectors, QuoteSelectors, Record, Transport};

/// Pause between consecutive pages of a paginated crawl.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(2);

/// Products of each strategy copied into a comparison report.
const COMPARISON_SAMPLE: usize = 3;

/// Counters for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub records_found: usize,
    /// Listing size reported by the source, when it reports one.
    pub total_available: usize,
    pub pages_processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration_seconds: f64,
}

impl RunStats {
    pub fn records_per_second(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            self.records_found as f64 / self.duration_seconds
        } else {
            0.0
        }
    }
}

/// What a job produced.
#[derive(Debug)]
pub struct Harvest<R> {
    pub records: Vec<R>,
    pub stats: RunStats,
    /// `None` when nothing was extracted.
    pub saved_to: Option<PathBuf>,
}

/// One strategy's side of a [`ComparisonReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    pub stats: RunStats,
    pub records_per_second: f64,
    pub sample_products: Vec<ProductRecord>,
}

impl StrategyReport {
    fn from_harvest(harvest: &Harvest<ProductRecord>) -> Self {
        Self {
            stats: harvest.stats.clone(),
            records_per_second: harvest.stats.records_per_second(),
            sample_products: harvest
                .records
                .iter()
                .take(COMPARISON_SAMPLE)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyComparison {
    /// Product-wall records minus product-list records.
    pub api_vs_scroll_difference: i64,
    pub api_speed: String,
    pub scroll_speed: String,
    /// `"API"` or `"Scroll"`, whichever produced more records per second.
    pub more_efficient: String,
}

/// Product-wall capture against automatic product list for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub category: String,
    pub timestamp: String,
    pub api_strategy: StrategyReport,
    pub scroll_strategy: StrategyReport,
    pub comparison: StrategyComparison,
}

impl ComparisonReport {
    pub fn new(
        category: &str,
        api: &Harvest<ProductRecord>,
        scroll: &Harvest<ProductRecord>,
    ) -> Self {
        let api_strategy = StrategyReport::from_harvest(api);
        let scroll_strategy = StrategyReport::from_harvest(scroll);

        let api_faster = api_strategy.records_per_second > scroll_strategy.records_per_second;
        let comparison = StrategyComparison {
            api_vs_scroll_difference: api.stats.records_found as i64
                - scroll.stats.records_found as i64,
            api_speed: format!("{:.2} products/sec", api_strategy.records_per_second),
            scroll_speed: format!("{:.2} products/sec", scroll_strategy.records_per_second),
            more_efficient: if api_faster { "API" } else { "Scroll" }.to_string(),
        };

        Self {
            category: category.to_string(),
            timestamp: timestamp_now(),
            api_strategy,
            scroll_strategy,
            comparison,
        }
    }
}

/// What a comparison produced.
#[derive(Debug)]
pub struct ComparisonRun {
    pub report: ComparisonReport,
    pub saved_to: PathBuf,
}

/// Runs the extraction jobs: build request, fetch, decode, extract, save.
pub struct Harvester<T> {
    transport: T,
    sink: ResultSink,
    max_attempts: u32,
    page_delay: Duration,
    site: ListingSite,
}

impl Harvester<ExtractClient> {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let sink = ResultSink::new(config.results_dir.clone());
        let max_attempts = config.max_attempts;
        let client = ExtractClient::new(config)?;

        Ok(Self::with_transport(client, sink, max_attempts))
    }
}

impl<T: Transport> Harvester<T> {
    pub fn with_transport(transport: T, sink: ResultSink, max_attempts: u32) -> Self {
        Self {
            transport,
            sink,
            max_attempts,
            page_delay: DEFAULT_PAGE_DELAY,
            site: ListingSite::nike(),
        }
    }

    #[must_use]
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Scrolls `url` and reads quotes from the captured quote API calls.
    pub async fn capture_quotes(&self, url: &str, pattern: &str) -> Result<Harvest<CapturedQuote>> {
        info!("Capturing network requests matching {} on {}", pattern, url);
        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut extraction = Extraction::default();

        let spec = RequestSpec::browser_html(url)
            .with_action(Action::scroll_bottom())
            .with_capture(CaptureFilter::url_contains(pattern));

        if let Some(Payload::Captures(captures)) = self.request(&spec, &mut stats).await {
            stats.pages_processed = 1;
            info!("Received {} network captures", captures.len());

            let decoded = decode_captures(&captures);
            stats.errors += decoded.failures.len();
            for body in &decoded.bodies {
                extraction.append(extract_captured_quotes(body));
            }
        }

        self.finish("quotes_network_capture", extraction, stats, started)
            .await
    }

    /// Follows "Next" links from `url`, at most `max_pages` pages.
    pub async fn paginate_quotes(&self, url: &str, max_pages: usize) -> Result<Harvest<QuoteRecord>> {
        let extractor = QuoteExtractor::new(&QuoteSelectors::listing())?;
        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut extraction = Extraction::default();
        let mut current_url = url.to_string();

        for page_num in 1..=max_pages {
            info!("Scraping page {} ({})", page_num, current_url);

            let spec = RequestSpec::browser_html(&current_url).with_action(Action::wait_for(".quote"));

            let Some(Payload::Markup(html)) = self.request(&spec, &mut stats).await else {
                break;
            };
            if html.is_empty() {
                warn!("No HTML content received for page {}", page_num);
                break;
            }

            let page = extractor.extract_all(&html);
            if page.records.is_empty() {
                info!("No quotes found on page {}, stopping", page_num);
                break;
            }

            info!("Found {} quotes on page {}", page.records.len(), page_num);
            stats.pages_processed += 1;
            extraction.append(page);

            let Some(next_url) = next_page_url(&html, &current_url) else {
                info!("No next page link found, reached last page");
                break;
            };
            if next_url == current_url {
                info!("Next page URL is the same as current URL, stopping pagination");
                break;
            }

            current_url = next_url;
            if page_num < max_pages {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        self.finish("quotes_pagination", extraction, stats, started)
            .await
    }

    /// Renders `url` after scrolling to the bottom and reads every quote.
    pub async fn scroll_quotes(&self, url: &str) -> Result<Harvest<QuoteRecord>> {
        let extractor = QuoteExtractor::new(&QuoteSelectors::listing())?;
        info!("Starting infinite scroll scrape for {}", url);

        let spec = RequestSpec::browser_html(url)
            .with_javascript(true)
            .with_action(Action::scroll_bottom().on_error(OnError::Continue));

        self.single_page("quotes_infinite_scroll", &spec, |html| {
            extractor.extract_all(html)
        })
        .await
    }

    /// Fills and submits the quote search form for `author` and `tag`.
    pub async fn search_quotes(
        &self,
        search_url: &str,
        author: &str,
        tag: &str,
    ) -> Result<Harvest<QuoteRecord>> {
        let extractor = QuoteExtractor::new(&QuoteSelectors::search_results())?;
        info!("Searching for quotes by {} with tag '{}'", author, tag);

        let spec = RequestSpec::browser_html(search_url)
            .with_action(Action::select("#author", vec![author.to_string()]))
            .with_action(Action::wait_for_attached(format!("[value=\"{tag}\"]")))
            .with_action(Action::select("#tag", vec![tag.to_string()]))
            .with_action(Action::click("[type='submit']"))
            .with_action(Action::wait_for(".quote"));

        let prefix = format!("quotes_search_{}", slug(author));
        self.single_page(&prefix, &spec, |html| extractor.extract_all(html))
            .await
    }

    /// Scrolls a category listing and reads products from the captured
    /// product-wall API responses.
    pub async fn capture_products(&self, category: &str) -> Result<Harvest<ProductRecord>> {
        let url = self.site.listing_url(category);
        info!("Capturing {} product wall for {}", self.site.name, url);
        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut extraction = Extraction::default();

        let spec = RequestSpec::browser_html(&url)
            .with_action(Action::scroll_bottom())
            .with_capture(CaptureFilter::url_contains(&self.site.capture_pattern));

        if let Some(Payload::Captures(captures)) = self.request(&spec, &mut stats).await {
            stats.pages_processed = 1;
            let decoded = decode_captures(&captures);
            stats.errors += decoded.failures.len();
            for body in &decoded.bodies {
                if stats.total_available == 0 {
                    stats.total_available = total_resources(&body.json).unwrap_or(0);
                }
                extraction.append(extract_product_wall(&body.json));
            }
        }

        let prefix = format!("{}_{}", slug(&self.site.name), slug(category));
        self.finish(&prefix, extraction, stats, started).await
    }

    /// Asks the API's automatic extraction for the category's product list.
    pub async fn list_products(&self, category: &str) -> Result<Harvest<ProductRecord>> {
        let url = self.site.listing_url(category);
        info!("Requesting automatic product list for {}", url);
        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut extraction = Extraction::default();

        let spec = RequestSpec::product_list(&url).with_action(Action::scroll_bottom());

        if let Some(Payload::ProductList(list)) = self.request(&spec, &mut stats).await {
            stats.pages_processed = 1;
            extraction = extract_product_list(&list);
        }

        let prefix = format!("{}_{}_list", slug(&self.site.name), slug(category));
        self.finish(&prefix, extraction, stats, started).await
    }

    /// Runs the product-wall capture and the automatic product list for
    /// `category` and writes a report comparing the two.
    pub async fn compare_products(&self, category: &str) -> Result<ComparisonRun> {
        info!("Comparing product strategies for {}", category);

        info!("Testing API strategy...");
        let api = self.capture_products(category).await?;

        info!("Testing scroll strategy...");
        let scroll = self.list_products(category).await?;

        let report = ComparisonReport::new(category, &api, &scroll);
        let prefix = format!("{}_comparison_{}", slug(&self.site.name), slug(category));
        let saved_to = self.sink.save_report(&prefix, &report).await?;

        Ok(ComparisonRun { report, saved_to })
    }

    /// Renders the category listing and reads the product grid markup.
    pub async fn markup_products(&self, category: &str) -> Result<Harvest<ProductRecord>> {
        let extractor =
            ProductExtractor::new(&ProductSelectors::product_grid(), &self.site.base_url)?;
        let url = self.site.listing_url(category);
        info!("Rendering {} product grid for {}", self.site.name, url);

        let spec = RequestSpec::browser_html(&url).with_action(Action::scroll_bottom());

        let prefix = format!("{}_{}_grid", slug(&self.site.name), slug(category));
        self.single_page(&prefix, &spec, |html| extractor.extract_all(html))
            .await
    }

    async fn single_page<R, F>(
        &self,
        prefix: &str,
        spec: &RequestSpec,
        extract: F,
    ) -> Result<Harvest<R>>
    where
        R: Record + Clone,
        F: FnOnce(&str) -> Extraction<R>,
    {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let mut extraction = Extraction::default();

        if let Some(Payload::Markup(html)) = self.request(spec, &mut stats).await {
            stats.pages_processed = 1;
            if html.is_empty() {
                warn!("No HTML content received for {}", spec.url);
            } else {
                extraction = extract(&html);
            }
        }

        self.finish(prefix, extraction, stats, started).await
    }

    async fn request(&self, spec: &RequestSpec, stats: &mut RunStats) -> Option<Payload> {
        match fetch(&self.transport, spec, self.max_attempts).await {
            Ok(response) => {
                let payload = Payload::from_response(response, spec.expected_payload());
                if payload.is_none() {
                    stats.errors += 1;
                }
                payload
            }
            Err(e) => {
                error!("Extraction request for {} failed: {}", spec.url, e);
                stats.errors += 1;
                None
            }
        }
    }

    async fn finish<R: Record + Clone>(
        &self,
        prefix: &str,
        extraction: Extraction<R>,
        mut stats: RunStats,
        started: Instant,
    ) -> Result<Harvest<R>> {
        stats.records_found = extraction.records.len();
        stats.skipped += extraction.skipped;
        stats.duration_seconds = started.elapsed().as_secs_f64();

        let saved_to = self.sink.save_run(prefix, &extraction.records).await?;

        if stats.records_found > 0 {
            info!(
                "Found {} {} ({} skipped, {} errors) in {:.2}s",
                stats.records_found,
                R::COLLECTION,
                stats.skipped,
                stats.errors,
                stats.duration_seconds
            );
        } else {
            warn!("No {} found ({} errors)", R::COLLECTION, stats.errors);
        }

        Ok(Harvest {
            records: extraction.records,
            stats,
            saved_to,
        })
    }
}

fn slug(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "_")
}
