//! JSON result files: record envelopes and comparison reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::models::{Metadata, ResultEnvelope};
use crate::traits::Record;

/// Writes result envelopes into one directory.
pub struct ResultSink {
    dir: PathBuf,
}

impl ResultSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves `records` to a fresh `<prefix>_<timestamp>.json` file.
    ///
    /// Returns the written path, or `None` when there was nothing to save.
    pub async fn save_run<R: Record + Clone>(
        &self,
        prefix: &str,
        records: &[R],
    ) -> Result<Option<PathBuf>> {
        save(records, &timestamped_path(&self.dir, prefix)).await
    }

    /// Saves a free-form report to a fresh `<prefix>_<timestamp>.json` file.
    pub async fn save_report<T: Serialize>(&self, prefix: &str, report: &T) -> Result<PathBuf> {
        let path = timestamped_path(&self.dir, prefix);
        write_json(report, &path).await?;
        info!("Saved report to {}", path.display());
        Ok(path)
    }
}

impl Clone for ResultSink {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
        }
    }
}

/// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.json`
pub fn timestamped_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!(
        "{}_{}.json",
        prefix,
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Writes `records` wrapped in a [`ResultEnvelope`] to `path`.
///
/// Does nothing when `records` is empty. Otherwise creates the parent
/// directory and writes indented UTF-8 JSON.
pub async fn save<R: Record + Clone>(records: &[R], path: &Path) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        debug!("No {} to save, skipping {}", R::COLLECTION, path.display());
        return Ok(None);
    }

    let envelope = ResultEnvelope::new(records.to_vec());
    write_json(&envelope, path).await?;

    info!(
        "Saved {} {} to {}",
        envelope.metadata.count,
        R::COLLECTION,
        path.display()
    );
    Ok(Some(path.to_path_buf()))
}

/// Creates the parent directory and writes `value` as indented UTF-8 JSON.
async fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// Reads an envelope written by [`save`].
pub async fn load<R: Record>(path: &Path) -> Result<ResultEnvelope<R>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let mut value: Value = serde_json::from_str(&text)?;

    let records = value
        .get_mut(R::COLLECTION)
        .map(Value::take)
        .ok_or_else(|| anyhow!("{} has no `{}` array", path.display(), R::COLLECTION))?;
    let metadata = value
        .get_mut("metadata")
        .map(Value::take)
        .ok_or_else(|| anyhow!("{} has no metadata", path.display()))?;

    Ok(ResultEnvelope {
        records: serde_json::from_value(records)?,
        metadata: serde_json::from_value::<Metadata>(metadata)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductRecord, QuoteRecord};

    fn quote(text: &str, author: &str) -> QuoteRecord {
        QuoteRecord {
            text: text.to_string(),
            author: author.to_string(),
            tags: vec!["life".to_string()],
            scraped_at: "2024-05-01 12:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_records_create_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("responses");
        let path = dir.join("quotes.json");

        let written = save::<QuoteRecord>(&[], &path).await.unwrap();

        assert_eq!(written, None);
        assert!(!path.exists());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn round_trip_keeps_count_and_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("quotes.json");
        let records = vec![
            quote("First", "A"),
            quote("Second", "B"),
            quote("Third", "C"),
        ];

        let written = save(&records, &path).await.unwrap();
        assert_eq!(written.as_deref(), Some(path.as_path()));

        let envelope = load::<QuoteRecord>(&path).await.unwrap();
        assert_eq!(envelope.metadata.count, records.len());
        assert_eq!(envelope.records, records);
    }

    #[tokio::test]
    async fn output_is_readable_and_field_ordered() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("products.json");
        let product = ProductRecord {
            name: "Nike Air Zoom Pegasus".to_string(),
            subtitle: "Chaussure de running sur route".to_string(),
            price: "₹ 11 895".to_string(),
            currency: "INR".to_string(),
            image_url: String::new(),
            product_url: "/p/1".to_string(),
            colorway: "Noir/Blanc".to_string(),
            style_code: "FD2722-002".to_string(),
            available: true,
            scraped_at: "2024-05-01 12:00:00".to_string(),
        };

        save(&[product], &path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.contains("₹ 11 895"));
        assert!(!text.contains("\\u"));
        assert!(text.starts_with("{\n  \"products\": [\n"));

        let positions: Vec<usize> = ["\"name\"", "\"subtitle\"", "\"price\"", "\"scraped_at\"", "\"metadata\""]
            .iter()
            .map(|key| text.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn timestamped_path_uses_prefix() {
        let path = timestamped_path(Path::new("responses"), "quotes_pagination");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("quotes_pagination_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "quotes_pagination_".len() + "20240101_000000".len() + ".json".len());
        assert_eq!(path.parent(), Some(Path::new("responses")));
    }

    #[tokio::test]
    async fn sink_writes_into_its_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(tmp.path().join("out"));

        let written = sink
            .save_run("quotes_search", &[quote("Only", "Me")])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(written.parent(), Some(sink.dir()));
        assert!(written.exists());
    }
}
