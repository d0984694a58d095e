//! Corpus persistence: JSON array and JSON Lines.
//!
//! Records are parsed individually so malformed input can be reported with
//! the offending record position.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::{Corpus, EvidenceChunk};
use crate::errors::CorpusLoadError;

/// On-disk corpus layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    /// A single JSON array of records.
    JsonArray,
    /// One JSON record per line (`.jsonl` / `.ndjson`).
    JsonLines,
}

impl CorpusFormat {
    /// Pick the format from the file extension; anything but `.jsonl`/`.ndjson` is an array.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("ndjson") => Self::JsonLines,
            _ => Self::JsonArray,
        }
    }
}

/// A corpus record as found on disk. Only `text` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CorpusRecord {
    #[serde(default)]
    id: Option<u64>,
    text: String,
    #[serde(default, alias = "source_label", alias = "source", alias = "label")]
    source_label: Option<String>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl CorpusRecord {
    fn into_chunk(self, position: usize) -> EvidenceChunk {
        let source_label = self
            .source_label
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        // An empty vector means "not embedded".
        let embedding = self.embedding.filter(|v| !v.is_empty());

        EvidenceChunk {
            id: self.id.unwrap_or(position as u64),
            text: self.text,
            source_label,
            embedding,
        }
    }
}

/// Load and validate the corpus at `path`.
pub async fn load_corpus(path: &Path) -> Result<Corpus, CorpusLoadError> {
    debug!("Loading corpus from {}", path.display());

    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CorpusLoadError::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(CorpusLoadError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    let corpus = parse_corpus(path, &raw, CorpusFormat::from_path(path))?;
    info!(
        "Loaded {} chunks from {} (dimension: {})",
        corpus.len(),
        path.display(),
        corpus
            .dimension()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    Ok(corpus)
}

/// Parse corpus text already in memory. `path` is used for attribution only.
pub fn parse_corpus(path: &Path, raw: &str, format: CorpusFormat) -> Result<Corpus, CorpusLoadError> {
    let malformed = |message: String| CorpusLoadError::Malformed {
        path: path.to_path_buf(),
        message,
    };

    let chunks = match format {
        CorpusFormat::JsonArray => {
            let value: serde_json::Value =
                serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
            let serde_json::Value::Array(items) = value else {
                return Err(malformed("expected a JSON array of chunk records".to_string()));
            };
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    serde_json::from_value::<CorpusRecord>(item)
                        .map(|r| r.into_chunk(i))
                        .map_err(|e| malformed(format!("record {}: {}", i, e)))
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        CorpusFormat::JsonLines => {
            let mut chunks = Vec::new();
            for (line_no, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: CorpusRecord = serde_json::from_str(line)
                    .map_err(|e| malformed(format!("line {}: {}", line_no + 1, e)))?;
                let position = chunks.len();
                chunks.push(record.into_chunk(position));
            }
            chunks
        }
    };

    Corpus::new(path, chunks)
}

/// Write chunks to `path`, as a pretty-printed array or JSON Lines by extension.
///
/// Used by `corpus embed` to persist precomputed embeddings.
pub async fn write_corpus(path: &Path, chunks: &[EvidenceChunk]) -> Result<(), CorpusLoadError> {
    let io_err = |path: PathBuf, e: &dyn std::fmt::Display| CorpusLoadError::Io {
        path,
        message: e.to_string(),
    };

    let body = match CorpusFormat::from_path(path) {
        CorpusFormat::JsonArray => {
            serde_json::to_string_pretty(chunks).map_err(|e| io_err(path.to_path_buf(), &e))?
        }
        CorpusFormat::JsonLines => {
            let mut out = String::new();
            for chunk in chunks {
                out.push_str(&serde_json::to_string(chunk).map_err(|e| io_err(path.to_path_buf(), &e))?);
                out.push('\n');
            }
            out
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent.to_path_buf(), &e))?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| io_err(path.to_path_buf(), &e))?;

    info!("Wrote {} chunks to {}", chunks.len(), path.display());
    Ok(())
}
