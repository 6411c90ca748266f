//! Core data models shared by ingestion, the conversation engine and the UI.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A loaded source document before chunking. PDFs yield one document per
/// page, all sharing the file name as id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Source id: the file name the text came from.
    pub id: String,
    /// Zero-based page number for paged sources.
    pub page: Option<usize>,
    pub text: String,
}

/// A token-bounded slice of a [`Document`], the unit stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source id of the parent document.
    pub source_id: String,
    /// Page of the parent document, for paged sources.
    #[serde(default)]
    pub page: Option<i64>,
    /// Position within the parent document (or page).
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    /// Summary shared by every chunk of the same document.
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Metadata in the shape it is handed to the vector collection, before
    /// sanitization. The embedding rides along as a non-primitive value.
    pub fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("id".into(), self.source_id.clone().into());
        if let Some(page) = self.page {
            map.insert("page".into(), page.into());
        }
        map.insert("chunk_index".into(), self.chunk_index.into());
        if let Some(summary) = &self.summary {
            map.insert("summary".into(), summary.clone().into());
        }
        if let Some(embedding) = &self.embedding {
            map.insert("embedding".into(), serde_json::json!(embedding));
        }
        map
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The four assessment levels, stored with their Vietnamese labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreLevel {
    #[serde(rename = "kém")]
    Poor,
    #[serde(rename = "trung bình")]
    Average,
    #[serde(rename = "bình thường")]
    Normal,
    #[serde(rename = "tốt")]
    Good,
}

impl ScoreLevel {
    pub const ALL: [ScoreLevel; 4] = [
        ScoreLevel::Poor,
        ScoreLevel::Average,
        ScoreLevel::Normal,
        ScoreLevel::Good,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ScoreLevel::Poor => "kém",
            ScoreLevel::Average => "trung bình",
            ScoreLevel::Normal => "bình thường",
            ScoreLevel::Good => "tốt",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|l| l.label() == label)
    }
}

/// Timestamp format used in the scores file and the UI.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One assessment appended by the `save_score` tool.
///
/// `Score` and `Level` are kept as recorded: entries written by other
/// tools may carry fractional scores or labels outside [`ScoreLevel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(rename = "Time", with = "score_time")]
    pub time: NaiveDateTime,
    #[serde(rename = "Score")]
    pub score: serde_json::Number,
    #[serde(rename = "Level")]
    pub level: String,
    #[serde(rename = "Content")]
    pub content: String,
    /// Free text supplied by the model; no structure is assumed.
    #[serde(rename = "Total guess")]
    pub total_guess: String,
}

impl ScoreEntry {
    /// Score as a float for charting.
    pub fn score_value(&self) -> f64 {
        self.score.as_f64().unwrap_or(0.0)
    }
}

mod score_time {
    use super::TIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}
