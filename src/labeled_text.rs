use serde::{Deserialize, Serialize};

/// A short text tagged with an integer political label, ready for training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledText {
    pub label: i64,
    pub text: String,
}

impl LabeledText {
    pub fn new(label: i64, text: impl Into<String>) -> Self {
        Self {
            label,
            text: text.into(),
        }
    }
}
