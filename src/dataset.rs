use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use serde::Deserialize;

use crate::labeled_text::LabeledText;

const DATASET_FILE: &str = "ExtractedTweets.csv";

/// Tweets truncated by the export end in a mis-decoded ellipsis.
const TRUNCATION_MARKER: &str = "â€¦";

/// Label of the Democrat class; every other party maps to 1.
const DEMOCRAT: &str = "Democrat";

// The Handle column is deliberately not read.
#[derive(Debug, Deserialize)]
struct DatasetRow {
    #[serde(rename = "Party")]
    party: String,
    #[serde(rename = "Tweet", default)]
    tweet: Option<String>,
}

fn dataset_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DATASET_FILE)
    } else {
        path.to_path_buf()
    }
}

/// Loads the Democrat-vs-Republican tweets dataset with binarized labels.
pub fn load_dataset(path: &Path) -> anyhow::Result<Vec<LabeledText>> {
    let file = dataset_file(path);
    info!("Path to dataset file: {}", file.display());

    let mut reader = csv::Reader::from_path(&file)
        .with_context(|| format!("failed to open dataset {}", file.display()))?;

    let mut data = Vec::new();
    let mut truncated = 0;
    for row in reader.deserialize::<DatasetRow>() {
        let row = row.with_context(|| format!("malformed row in {}", file.display()))?;
        let text = row.tweet.unwrap_or_default();
        if text.contains(TRUNCATION_MARKER) {
            truncated += 1;
            continue;
        }
        let label = if row.party == DEMOCRAT { 0 } else { 1 };
        data.push(LabeledText { label, text });
    }

    info!(
        "loaded {} tweets, dropped {truncated} truncated ones",
        data.len()
    );
    Ok(data)
}
