//! Conversation transcript persisted as JSON Lines.
//!
//! Each message is one `{"role": ..., "content": ...}` object per line, in
//! chronological order. The in-memory [`Transcript`] remembers how many of
//! its messages are already on disk, so [`Transcript::flush`] only appends
//! the new tail.
//!
//! Older deployments wrote the whole conversation as a single
//! `{"messages": [...]}` document. That shape is still accepted on load and
//! is rewritten as JSON Lines on the next flush. A file with malformed lines
//! or a torn final line is rewritten the same way, so new messages are never
//! appended onto a partial record.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::ChatMessage;

#[derive(Debug, Serialize, Deserialize)]
struct LegacyTranscript {
    messages: Vec<ChatMessage>,
}

#[derive(Debug)]
pub struct Transcript {
    path: PathBuf,
    messages: Vec<ChatMessage>,
    /// Number of leading messages already written to `path`.
    persisted: usize,
    /// Set when the file on disk cannot be appended to safely.
    rewrite: bool,
}

impl Transcript {
    /// Load the transcript at `path`. A missing or unreadable file yields an
    /// empty transcript; malformed lines are skipped with a warning.
    pub fn load(path: &Path) -> Self {
        let mut transcript = Self {
            path: path.to_path_buf(),
            messages: Vec::new(),
            persisted: 0,
            rewrite: false,
        };

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read transcript, starting empty");
                }
                return transcript;
            }
        };

        if let Ok(legacy) = serde_json::from_str::<LegacyTranscript>(&raw) {
            transcript.messages = legacy.messages;
            transcript.rewrite = true;
            return transcript;
        }

        let mut skipped = 0usize;
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatMessage>(line) {
                Ok(msg) => transcript.messages.push(msg),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        path = %path.display(),
                        line = lineno + 1,
                        error = %e,
                        "skipping malformed transcript line"
                    );
                }
            }
        }
        transcript.persisted = transcript.messages.len();
        transcript.rewrite = skipped > 0 || (!raw.is_empty() && !raw.ends_with('\n'));
        transcript
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Messages not yet written to disk.
    pub fn pending(&self) -> &[ChatMessage] {
        &self.messages[self.persisted..]
    }

    /// Append unsaved messages to the file (or rewrite it once if it was in
    /// the legacy shape).
    pub fn flush(&mut self) -> Result<()> {
        if !self.rewrite && self.pending().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let to_write = if self.rewrite {
            &self.messages[..]
        } else {
            &self.messages[self.persisted..]
        };
        let mut buf = String::new();
        for msg in to_write {
            buf.push_str(&serde_json::to_string(msg)?);
            buf.push('\n');
        }

        if self.rewrite {
            let tmp = self.path.with_extension("jsonl.tmp");
            std::fs::write(&tmp, buf.as_bytes())
                .with_context(|| format!("Failed to write transcript {}", tmp.display()))?;
            std::fs::rename(&tmp, &self.path)
                .with_context(|| format!("Failed to replace transcript {}", self.path.display()))?;
        } else {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(buf.as_bytes())
                .with_context(|| format!("Failed to write transcript {}", self.path.display()))?;
            file.flush()?;
        }

        self.persisted = self.messages.len();
        self.rewrite = false;
        Ok(())
    }

    /// Delete the file and forget every message.
    pub fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to delete {}", self.path.display()))
            }
        }
        self.messages.clear();
        self.persisted = 0;
        self.rewrite = false;
        Ok(())
    }

    /// The transcript in the `{"messages": [...]}` export shape.
    pub fn export(&self) -> serde_json::Value {
        serde_json::json!({ "messages": self.messages })
    }
}
