//! Loading of the speech corpus: a JSON document whose `speechs` array holds
//! one object per speech, each with a list of `speakers`.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::Context;
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value};

const DROPPED_FIELDS: [&str; 3] = ["datetime", "readtime", "kind"];

/// A single-speaker speech with its remaining fields flattened to dotted keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerRecord {
    pub speaker: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRow {
    pub speaker: String,
    pub text: String,
}

fn read_speeches(path: &Path) -> anyhow::Result<Vec<Map<String, Value>>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read speech corpus {}", path.display()))?;
    let corpus: Value = serde_json::from_str(&raw)
        .with_context(|| format!("speech corpus {} is not valid json", path.display()))?;
    let speeches = corpus
        .get("speechs")
        .and_then(Value::as_array)
        .map(|speeches| {
            speeches
                .iter()
                .filter_map(Value::as_object)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    Ok(speeches)
}

/// The name of the speech's speaker, if there is exactly one.
fn sole_speaker(speech: &Map<String, Value>) -> Option<&Value> {
    match speech.get("speakers").and_then(Value::as_array) {
        Some(speakers) if speakers.len() == 1 => Some(&speakers[0]),
        _ => None,
    }
}

fn speaker_name(speaker: &Value) -> Option<String> {
    speaker.get("name").and_then(Value::as_str).map(String::from)
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}.{key}"), nested, out);
            }
        }
        _ => {
            out.insert(prefix.to_string(), value.clone());
        }
    }
}

pub fn extract_speakers(path: &Path) -> anyhow::Result<Vec<SpeakerRecord>> {
    let speeches = read_speeches(path)?;
    let total = speeches.len();

    let mut records = Vec::new();
    for speech in &speeches {
        let Some(speaker) = sole_speaker(speech) else {
            continue;
        };
        let Some(name) = speaker_name(speaker) else {
            warn!("skipping speech whose speaker has no name: {speaker}");
            continue;
        };

        let mut fields = BTreeMap::new();
        for (key, value) in speech {
            if key == "speakers" || DROPPED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            flatten_into(key, value, &mut fields);
        }
        records.push(SpeakerRecord {
            speaker: name,
            fields,
        });
    }

    info!("kept {} of {total} speeches with a single speaker", records.len());
    Ok(records)
}

/// Speaker and text of every single-speaker speech that has a text.
pub fn load_speech_file(path: &Path) -> anyhow::Result<Vec<SpeechRow>> {
    let speeches = read_speeches(path)?;

    let rows = speeches
        .iter()
        .filter_map(|speech| {
            let speaker = speaker_name(sole_speaker(speech)?)?;
            let text = match speech.get("text") {
                None => String::new(),
                Some(Value::Null) => return None,
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
            };
            Some(SpeechRow { speaker, text })
        })
        .collect();
    Ok(rows)
}
