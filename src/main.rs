use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use zyte_scraper::harvester::StrategyReport;
use zyte_scraper::models::{CapturedQuote, ProductRecord, QuoteRecord};
use zyte_scraper::{ApiConfig, ComparisonReport, ExtractClient, Harvest, Harvester};

const QUOTES_SCROLL_URL: &str = "http://quotes.toscrape.com/scroll";
const QUOTES_FIRST_PAGE_URL: &str = "http://quotes.toscrape.com/page/1/";
const QUOTES_SEARCH_URL: &str = "http://quotes.toscrape.com/search.aspx";
const DEFAULT_CATEGORIES: [&str; 3] = ["football-1gdj0", "basketball-3glsm", "running-37v7j"];

#[derive(Parser)]
#[command(version, about = "Scrape rendered pages through the Zyte API")]
struct Cli {
    /// Directory for result files (overrides RESULTS_DIR)
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Attempts per API call (overrides MAX_ATTEMPTS)
    #[arg(long)]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture quote API calls made while scrolling
    Capture {
        #[arg(default_value = QUOTES_SCROLL_URL)]
        url: String,
        /// URL fragment of the requests to capture
        #[arg(long, default_value = "/api/quotes")]
        pattern: String,
    },
    /// Follow "Next" links across quote pages
    Paginate {
        #[arg(default_value = QUOTES_FIRST_PAGE_URL)]
        url: String,
        #[arg(long, default_value_t = 3)]
        max_pages: usize,
    },
    /// Scroll an infinite quote page to the bottom
    Scroll {
        #[arg(default_value = QUOTES_SCROLL_URL)]
        url: String,
    },
    /// Submit the quote search form
    Search {
        #[arg(long, default_value = "Albert Einstein")]
        author: String,
        #[arg(long, default_value = "world")]
        tag: String,
        #[arg(long, default_value = QUOTES_SEARCH_URL)]
        url: String,
    },
    /// Capture product-wall API calls of category listings
    Products {
        #[arg(default_values_t = DEFAULT_CATEGORIES.map(String::from))]
        categories: Vec<String>,
    },
    /// Use automatic product-list extraction on category listings
    ProductList {
        #[arg(default_values_t = DEFAULT_CATEGORIES.map(String::from))]
        categories: Vec<String>,
    },
    /// Read the rendered product grid of category listings
    ProductGrid {
        #[arg(default_values_t = DEFAULT_CATEGORIES.map(String::from))]
        categories: Vec<String>,
    },
    /// Compare product-wall capture with the automatic product list
    Compare {
        #[arg(default_values_t = DEFAULT_CATEGORIES.map(String::from))]
        categories: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(dir) = cli.results_dir {
        config = config.with_results_dir(dir);
    }
    if let Some(attempts) = cli.max_attempts {
        config = config.with_max_attempts(attempts.max(1));
    }

    info!("Results will be written to {}", config.results_dir.display());
    let harvester = Harvester::new(config)?;

    if let Err(e) = run(&harvester, cli.command).await {
        error!("Run failed: {:#}", e);
    }

    Ok(())
}

async fn run(harvester: &Harvester<ExtractClient>, command: Command) -> Result<()> {
    match command {
        Command::Capture { url, pattern } => {
            let harvest = harvester.capture_quotes(&url, &pattern).await?;
            report(&harvest, 2, print_capture);
        }
        Command::Paginate { url, max_pages } => {
            let harvest = harvester.paginate_quotes(&url, max_pages).await?;
            report(&harvest, 2, print_quote);
        }
        Command::Scroll { url } => {
            let harvest = harvester.scroll_quotes(&url).await?;
            report(&harvest, 2, print_quote);
        }
        Command::Search { author, tag, url } => {
            let harvest = harvester.search_quotes(&url, &author, &tag).await?;
            report(&harvest, usize::MAX, print_quote);
        }
        Command::Products { categories } => {
            for (i, category) in categories.iter().enumerate() {
                pause_between(i).await;
                match harvester.capture_products(category).await {
                    Ok(harvest) => report(&harvest, 3, print_product),
                    Err(e) => error!("Category {} failed: {:#}", category, e),
                }
            }
        }
        Command::ProductList { categories } => {
            for (i, category) in categories.iter().enumerate() {
                pause_between(i).await;
                match harvester.list_products(category).await {
                    Ok(harvest) => report(&harvest, 3, print_product),
                    Err(e) => error!("Category {} failed: {:#}", category, e),
                }
            }
        }
        Command::ProductGrid { categories } => {
            for (i, category) in categories.iter().enumerate() {
                pause_between(i).await;
                match harvester.markup_products(category).await {
                    Ok(harvest) => report(&harvest, 3, print_product),
                    Err(e) => error!("Category {} failed: {:#}", category, e),
                }
            }
        }
        Command::Compare { categories } => {
            for (i, category) in categories.iter().enumerate() {
                pause_between(i).await;
                match harvester.compare_products(category).await {
                    Ok(run) => {
                        println!("\nSaved detailed comparison to {}", run.saved_to.display());
                        print_comparison(&run.report);
                    }
                    Err(e) => error!("Comparison for {} failed: {:#}", category, e),
                }
            }
        }
    }

    Ok(())
}

async fn pause_between(index: usize) {
    if index > 0 {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

fn report<R>(harvest: &Harvest<R>, sample: usize, print: fn(&R)) {
    if harvest.records.is_empty() {
        println!("No records found or error occurred");
        return;
    }

    println!("\nFound {} records", harvest.records.len());
    if let Some(path) = &harvest.saved_to {
        println!("Saved results to {}", path.display());
    }
    println!(
        "Pages: {}  Skipped: {}  Errors: {}  Duration: {:.2}s  ({:.2} records/s)",
        harvest.stats.pages_processed,
        harvest.stats.skipped,
        harvest.stats.errors,
        harvest.stats.duration_seconds,
        harvest.stats.records_per_second()
    );

    println!("\nSample:");
    println!("{}", "-".repeat(50));
    for record in harvest.records.iter().take(sample) {
        print(record);
        println!("{}", "-".repeat(30));
    }
}

fn print_quote(quote: &QuoteRecord) {
    println!("Text: {}", quote.text);
    println!("Author: {}", quote.author);
    println!("Tags: {}", quote.tags.join(", "));
}

fn print_capture(quote: &CapturedQuote) {
    println!("Author: {}", quote.author);
    println!("Text: {}", quote.text);
    println!("Tags: {}", quote.tags.join(", "));
    println!("URL: {}", quote.url);
    println!("Method: {}", quote.method);
    match quote.status {
        Some(status) => println!("Status: {status}"),
        None => println!("Status: unknown"),
    }
}

fn print_comparison(report: &ComparisonReport) {
    let api = &report.api_strategy;
    let scroll = &report.scroll_strategy;

    println!("\n{}", "=".repeat(60));
    println!("COMPARISON RESULTS FOR {}", report.category.to_uppercase());
    println!("{}", "=".repeat(60));

    println!("\nAPI STRATEGY:");
    println!("Total Available: {}", api.stats.total_available);
    print_strategy(api);

    println!("\nSCROLL STRATEGY:");
    print_strategy(scroll);

    let diff = report.comparison.api_vs_scroll_difference;
    println!("\nCOMPARISON:");
    println!("Difference (API - Scroll): {diff} products");
    println!("More Products: {}", if diff > 0 { "API" } else { "Scroll" });
    println!("Faster Strategy: {}", report.comparison.more_efficient);
    println!("{}\n", "=".repeat(60));
}

fn print_strategy(strategy: &StrategyReport) {
    println!("Products Found: {}", strategy.stats.records_found);
    println!("Pages Processed: {}", strategy.stats.pages_processed);
    println!("Duration: {:.2} seconds", strategy.stats.duration_seconds);
    println!("Speed: {:.2} products/second", strategy.records_per_second);
    println!("Errors: {}", strategy.stats.errors);
}

fn print_product(product: &ProductRecord) {
    println!("{}", product.name);
    if !product.subtitle.is_empty() {
        println!("  {}", product.subtitle);
    }
    println!("  Price: {} {}", product.price, product.currency);
    if !product.colorway.is_empty() {
        println!("  Colorway: {}", product.colorway);
    }
    println!("  Available: {}", if product.available { "Yes" } else { "No" });
    println!("  URL: {}", product.product_url);
}
