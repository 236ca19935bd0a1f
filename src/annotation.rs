use std::{fs, path::Path};

use anyhow::{Context, bail};
use log::info;

use crate::{
    labeled_text::LabeledText,
    speech::{SpeechRow, load_speech_file},
};

/// One `speaker,label` line of the hand-written annotation file.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub speaker: String,
    pub label: String,
}

pub fn parse_annotations(raw: &str) -> anyhow::Result<Vec<Annotation>> {
    let mut annotations = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        let speaker = fields.next().unwrap_or_default();
        let Some(label) = fields.next() else {
            bail!("annotation line {} has no label: {line:?}", line_no + 1);
        };
        annotations.push(Annotation {
            speaker: speaker.to_string(),
            label: label.to_string(),
        });
    }
    Ok(annotations)
}

pub fn load_annotations(path: &Path) -> anyhow::Result<Vec<Annotation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read annotations {}", path.display()))?;
    parse_annotations(&raw).with_context(|| format!("malformed annotations {}", path.display()))
}

/// Replaces speaker names by their labels, one annotation at a time in file
/// order, so a label that names another annotated speaker gets replaced again.
pub fn annotate(mut rows: Vec<SpeechRow>, annotations: &[Annotation]) -> Vec<SpeechRow> {
    for annotation in annotations {
        for row in rows.iter_mut().filter(|row| row.speaker == annotation.speaker) {
            row.speaker.clone_from(&annotation.label);
        }
    }
    rows
}

fn parse_label(speaker: &str) -> Option<i64> {
    if speaker.is_empty() || !speaker.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    speaker.parse().ok()
}

/// Keeps rows whose speaker became a numeric label and whose text is not blank.
pub fn clean_data(rows: Vec<SpeechRow>) -> Vec<LabeledText> {
    rows.into_iter()
        .filter_map(|row| {
            let label = parse_label(&row.speaker)?;
            if row.text.trim().is_empty() {
                return None;
            }
            Some(LabeledText {
                label,
                text: row.text,
            })
        })
        .collect()
}

pub fn load_speech_data(corpus: &Path, annotations: &Path) -> anyhow::Result<Vec<LabeledText>> {
    let rows = load_speech_file(corpus)?;
    let total = rows.len();
    let annotations = load_annotations(annotations)?;
    let labeled = clean_data(annotate(rows, &annotations));
    info!("{} of {total} single-speaker speeches carry a label", labeled.len());
    Ok(labeled)
}
