//! Product extraction from product grids, captured product-wall JSON, and
//! the API's automatic product list

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{Extraction, first_text, parse_selector, text_at};
use crate::error::ExtractError;
use crate::models::{ProductRecord, timestamp_now};
use crate::traits::ProductSelectors;

/// Pulls [`ProductRecord`]s out of a rendered product grid.
pub struct ProductExtractor {
    container: Selector,
    name: Selector,
    price: Selector,
    subtitle: Option<Selector>,
    link: Selector,
    image: Selector,
    base_url: Option<Url>,
}

impl ProductExtractor {
    /// `base_url` resolves relative product and image links.
    pub fn new(selectors: &ProductSelectors, base_url: &str) -> Result<Self, ExtractError> {
        let subtitle = selectors
            .subtitle
            .as_deref()
            .map(parse_selector)
            .transpose()?;

        Ok(Self {
            container: parse_selector(&selectors.container)?,
            name: parse_selector(&selectors.name)?,
            price: parse_selector(&selectors.price)?,
            subtitle,
            link: parse_selector(&selectors.link)?,
            image: parse_selector(&selectors.image)?,
            base_url: Url::parse(base_url).ok(),
        })
    }

    /// Builds a record from one product card. Name and price are required.
    pub fn extract(&self, card: ElementRef<'_>) -> Result<ProductRecord, ExtractError> {
        let name = first_text(card, &self.name)
            .filter(|n| !n.is_empty())
            .ok_or(ExtractError::MissingField("name"))?;

        let price = first_text(card, &self.price)
            .filter(|p| !p.is_empty())
            .ok_or(ExtractError::MissingField("price"))?;

        let subtitle = self
            .subtitle
            .as_ref()
            .and_then(|sel| first_text(card, sel))
            .unwrap_or_default();

        let product_url = card
            .select(&self.link)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(|href| self.absolute(href))
            .unwrap_or_default();

        // Lazy-loaded images keep the real URL in data-src
        let image_url = card
            .select(&self.image)
            .next()
            .and_then(|img| {
                img.value()
                    .attr("data-src")
                    .or_else(|| img.value().attr("src"))
            })
            .map(|src| self.absolute(src))
            .unwrap_or_default();

        Ok(ProductRecord {
            name,
            subtitle,
            price,
            currency: String::new(),
            image_url,
            product_url,
            colorway: String::new(),
            style_code: String::new(),
            available: false,
            scraped_at: timestamp_now(),
        })
    }

    /// Extracts every product card of `html` in document order.
    pub fn extract_all(&self, html: &str) -> Extraction<ProductRecord> {
        let document = Html::parse_document(html);
        let mut extraction = Extraction::default();

        for (index, card) in document.select(&self.container).enumerate() {
            extraction.push(&format!("product card #{}", index + 1), self.extract(card));
        }

        extraction
    }

    fn absolute(&self, href: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(href)
                .map_or_else(|_| href.to_string(), |u| u.to_string()),
            None => href.to_string(),
        }
    }
}

/// Maps one product object of the product-wall API.
///
/// Every field is optional; absent values become empty strings so a
/// partially populated product still yields a record.
pub fn product_from_wall(product: &Value) -> ProductRecord {
    ProductRecord {
        name: text_at(product, &["copy", "title"]),
        subtitle: text_at(product, &["copy", "subTitle"]),
        price: text_at(product, &["prices", "currentPrice"]),
        currency: text_at(product, &["prices", "currency"]),
        image_url: text_at(product, &["colorwayImages", "portraitURL"]),
        product_url: text_at(product, &["pdpUrl", "url"]),
        colorway: text_at(product, &["colorDescription"]),
        style_code: text_at(product, &["styleCode"]),
        available: product
            .get("availability")
            .and_then(|a| a.get("available"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        scraped_at: timestamp_now(),
    }
}

/// Extracts `productGroupings[].products[0]` from a decoded product-wall body.
///
/// The first product of a grouping stands for the whole grouping; the
/// rest are colour variants of it.
pub fn extract_product_wall(body: &Value) -> Extraction<ProductRecord> {
    let mut extraction = Extraction::default();

    let Some(groupings) = body.get("productGroupings").and_then(Value::as_array) else {
        return extraction;
    };

    for grouping in groupings {
        match grouping
            .get("products")
            .and_then(Value::as_array)
            .and_then(|products| products.first())
        {
            Some(product) => extraction.records.push(product_from_wall(product)),
            None => debug!("Product grouping without products, skipping"),
        }
    }

    extraction
}

/// Reads `pages.totalResources`, the size of the whole listing as the
/// product wall reports it.
pub fn total_resources(body: &Value) -> Option<usize> {
    body.get("pages")
        .and_then(|pages| pages.get("totalResources"))
        .and_then(Value::as_u64)
        .and_then(|total| usize::try_from(total).ok())
}

/// Maps one item of the automatic product list.
pub fn product_from_list(product: &Value) -> ProductRecord {
    ProductRecord {
        name: text_at(product, &["name"]),
        subtitle: String::new(),
        price: text_at(product, &["price"]),
        currency: text_at(product, &["currency"]),
        image_url: text_at(product, &["mainImage", "url"]),
        product_url: text_at(product, &["url"]),
        colorway: String::new(),
        style_code: String::new(),
        available: false,
        scraped_at: timestamp_now(),
    }
}

/// Extracts the `products` array of a `productList` payload.
pub fn extract_product_list(list: &Value) -> Extraction<ProductRecord> {
    let records: Vec<ProductRecord> = list
        .get("products")
        .and_then(Value::as_array)
        .map(|products| products.iter().map(product_from_list).collect())
        .unwrap_or_default();

    Extraction {
        records,
        skipped: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GRID: &str = r#"
        <div class="product-grid">
          <div class="product-card">
            <a class="product-card__link-overlay" href="/in/t/pegasus-41">Pegasus 41</a>
            <img class="product-card__hero-image" data-src="https://static.nike.com/a/pegasus.png" src="data:," />
            <div class="product-card__title">Nike Pegasus 41</div>
            <div class="product-card__subtitle">Men's Road Running Shoes</div>
            <div class="product-price">MRP : ₹ 11 895.00</div>
          </div>
          <div class="product-card">
            <a class="product-card__link-overlay" href="/in/t/vomero-18">Vomero 18</a>
            <div class="product-card__title">Nike Vomero 18</div>
          </div>
          <div class="product-card">
            <div class="product-card__title">Nike Invincible 3</div>
            <div class="product-price">₹ 16 995.00</div>
          </div>
        </div>
    "#;

    #[test]
    fn grid_card_without_price_is_skipped() {
        let extractor =
            ProductExtractor::new(&ProductSelectors::product_grid(), "https://www.nike.com").unwrap();

        let extraction = extractor.extract_all(GRID);

        assert_eq!(extraction.skipped, 1);
        assert_eq!(extraction.records.len(), 2);

        let first = &extraction.records[0];
        assert_eq!(first.name, "Nike Pegasus 41");
        assert_eq!(first.subtitle, "Men's Road Running Shoes");
        assert_eq!(first.price, "MRP : ₹ 11 895.00");
        assert_eq!(first.product_url, "https://www.nike.com/in/t/pegasus-41");
        assert_eq!(first.image_url, "https://static.nike.com/a/pegasus.png");

        let second = &extraction.records[1];
        assert_eq!(second.name, "Nike Invincible 3");
        assert_eq!(second.subtitle, "");
        assert_eq!(second.product_url, "");
    }

    #[test]
    fn wall_product_missing_subtitle_defaults_to_empty() {
        let body = json!({
            "productGroupings": [{
                "products": [{
                    "copy": {"title": "Air Max"},
                    "prices": {"currentPrice": "120"},
                    "pdpUrl": {"url": "/p/1"}
                }]
            }]
        });

        let extraction = extract_product_wall(&body);

        assert_eq!(extraction.records.len(), 1);
        let product = &extraction.records[0];
        assert_eq!(product.name, "Air Max");
        assert_eq!(product.subtitle, "");
        assert_eq!(product.price, "120");
        assert_eq!(product.product_url, "/p/1");
        assert_eq!(product.currency, "");
        assert!(!product.available);
    }

    #[test]
    fn wall_takes_first_product_per_grouping_in_order() {
        let body = json!({
            "productGroupings": [
                {"products": [
                    {"copy": {"title": "Pegasus", "subTitle": "Road"}, "prices": {"currentPrice": 11895, "currency": "INR"},
                     "colorDescription": "Black/White", "styleCode": "FD2722-002", "availability": {"available": true}},
                    {"copy": {"title": "Pegasus (variant)"}}
                ]},
                {"products": []},
                {"products": [{"copy": {"title": "Vomero"}}]}
            ]
        });

        let extraction = extract_product_wall(&body);

        let names: Vec<&str> = extraction.records.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Pegasus", "Vomero"]);
        let first = &extraction.records[0];
        assert_eq!(first.price, "11895");
        assert_eq!(first.currency, "INR");
        assert_eq!(first.colorway, "Black/White");
        assert_eq!(first.style_code, "FD2722-002");
        assert!(first.available);
    }

    #[test]
    fn wall_reports_listing_size() {
        let body = json!({"pages": {"totalResources": 213, "next": "/next"}, "productGroupings": []});
        assert_eq!(total_resources(&body), Some(213));
        assert_eq!(total_resources(&json!({"productGroupings": []})), None);
    }

    #[test]
    fn product_list_items_are_mapped() {
        let list = json!({
            "products": [
                {"name": "Nike Zoom Fly 6", "price": "15995.0", "currency": "INR",
                 "url": "https://www.nike.com/in/t/zoom-fly-6", "mainImage": {"url": "https://static.nike.com/zf6.png"}},
                {"url": "https://www.nike.com/in/t/unknown"}
            ]
        });

        let extraction = extract_product_list(&list);

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].name, "Nike Zoom Fly 6");
        assert_eq!(extraction.records[0].image_url, "https://static.nike.com/zf6.png");
        assert_eq!(extraction.records[1].name, "");
        assert_eq!(extraction.records[1].product_url, "https://www.nike.com/in/t/unknown");
    }
}
