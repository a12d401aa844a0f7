//! Memory records as delivered by the external store, and the batch they
//! arrive in.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;

use crate::error::EmbeddingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Memory,
    Dream,
    Thought,
    Interaction,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Memory,
        NodeKind::Dream,
        NodeKind::Thought,
        NodeKind::Interaction,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Dream => "dream",
            Self::Thought => "thought",
            Self::Interaction => "interaction",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub kind: NodeKind,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub relevance: Option<f32>,
    pub created_at: String,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, kind: NodeKind, embedding: Option<Vec<f32>>) -> Self {
        Self {
            id: id.into(),
            kind,
            text: String::new(),
            embedding,
            relevance: None,
            created_at: String::new(),
        }
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Wire shape of a record. Field aliases cover the store's column names.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RawRecord {
    id: String,
    #[serde(default, alias = "group_type")]
    kind: Option<String>,
    #[serde(default, alias = "content")]
    text: String,
    #[serde(default)]
    embedding: Option<Value>,
    #[serde(default)]
    relevance: Option<f64>,
    #[serde(default, alias = "createdAt")]
    created_at: String,
}

/// Parses an embedding that is either a JSON array of numbers or a string
/// holding one.
pub fn parse_embedding(value: Option<&Value>) -> Result<Vec<f32>, EmbeddingError> {
    let components: Vec<f64> = match value {
        None | Some(Value::Null) => return Err(EmbeddingError::Missing),
        Some(Value::String(encoded)) => serde_json::from_str(encoded)?,
        Some(other) => Vec::<f64>::deserialize(other)?,
    };

    let embedding = components
        .into_iter()
        .map(|component| component as f32)
        .collect::<Vec<_>>();
    check_embedding(&embedding)?;
    Ok(embedding)
}

/// Rejects empty vectors and vectors with a NaN or infinite component.
pub fn check_embedding(embedding: &[f32]) -> Result<(), EmbeddingError> {
    if embedding.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    match embedding.iter().position(|component| !component.is_finite()) {
        Some(index) => Err(EmbeddingError::NonFinite { index }),
        None => Ok(()),
    }
}

/// An immutable batch of records fetched for one opening of the map.
///
/// Only built through [`RecordBatch::from_records`] (or the loaders on top of
/// it), so ids are unique and every kept embedding is valid with length
/// `dimension`.
#[derive(Clone, Debug, Default)]
pub struct RecordBatch {
    records: Vec<NodeRecord>,
    dimension: Option<usize>,
}

impl RecordBatch {
    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    /// Shared embedding dimension, taken from the first valid embedding.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn into_records(self) -> Vec<NodeRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Builds a batch from already-typed records, enforcing unique ids and a
    /// shared embedding dimension.
    pub fn from_records(records: Vec<NodeRecord>) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let mut dimension = None;
        let mut kept = Vec::with_capacity(records.len());

        for mut record in records {
            if !seen.insert(record.id.clone()) {
                tracing::warn!(id = %record.id, "dropping record with duplicate id");
                continue;
            }

            if let Some(embedding) = &record.embedding {
                let checked = check_embedding(embedding).and_then(|()| {
                    let expected = *dimension.get_or_insert(embedding.len());
                    if embedding.len() == expected {
                        Ok(())
                    } else {
                        Err(EmbeddingError::DimensionMismatch {
                            expected,
                            found: embedding.len(),
                        })
                    }
                });
                if let Err(error) = checked {
                    tracing::warn!(id = %record.id, %error, "record kept without edges");
                    record.embedding = None;
                }
            }

            record.relevance = record
                .relevance
                .filter(|value| value.is_finite())
                .map(|value| value.clamp(0.0, 1.0));
            kept.push(record);
        }

        Self {
            records: kept,
            dimension,
        }
    }

    pub(crate) fn from_raw(raw: Vec<RawRecord>) -> Self {
        let records = raw
            .into_iter()
            .map(|raw| {
                let kind = match raw.kind.as_deref() {
                    Some(label) => NodeKind::parse(label).unwrap_or_else(|| {
                        tracing::warn!(id = %raw.id, kind = label, "unknown kind, using memory");
                        NodeKind::Memory
                    }),
                    None => NodeKind::Memory,
                };

                let embedding = match parse_embedding(raw.embedding.as_ref()) {
                    Ok(embedding) => Some(embedding),
                    Err(error) => {
                        tracing::warn!(id = %raw.id, %error, "record kept without edges");
                        None
                    }
                };

                NodeRecord {
                    id: raw.id,
                    kind,
                    text: raw.text,
                    embedding,
                    relevance: raw.relevance.map(|value| value as f32),
                    created_at: raw.created_at,
                }
            })
            .collect();

        Self::from_records(records)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(raw).context("invalid JSON in record batch")?;
        let entries = match parsed {
            Value::Array(entries) => entries,
            Value::Object(mut object) => match object.remove("records") {
                Some(Value::Array(entries)) => entries,
                _ => return Err(anyhow!("expected a JSON array or an object with `records`")),
            },
            _ => return Err(anyhow!("unexpected JSON type for record batch")),
        };

        let mut raw_records = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            match RawRecord::deserialize(entry) {
                Ok(record) => raw_records.push(record),
                Err(error) => tracing::warn!(position, %error, "skipping unreadable record"),
            }
        }

        Ok(Self::from_raw(raw_records))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let batch = Self::from_json(&raw)
            .with_context(|| format!("failed to parse records from {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            records = batch.len(),
            dimension = ?batch.dimension,
            "loaded record batch"
        );
        Ok(batch)
    }

    /// Synthetic batch with clustered embeddings, one cluster per theme.
    pub fn demo(count: usize, dimension: usize, seed: u64) -> Self {
        const THEMES: [&str; 6] = [
            "the sea at night",
            "a half-remembered song",
            "questions about silence",
            "the user's garden",
            "a recurring dream of stairs",
            "small talk about the weather",
        ];

        let dimension = dimension.max(2);
        let mut rng = StdRng::seed_from_u64(seed);
        let centroids = (0..THEMES.len())
            .map(|_| {
                (0..dimension)
                    .map(|_| rng.random_range(-1.0_f32..1.0))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let records = (0..count)
            .map(|index| {
                let theme = rng.random_range(0..THEMES.len());
                let kind = NodeKind::ALL[rng.random_range(0..NodeKind::ALL.len())];
                let embedding = centroids[theme]
                    .iter()
                    .map(|component| component + rng.random_range(-0.45_f32..0.45))
                    .collect::<Vec<_>>();

                NodeRecord {
                    id: format!("demo-{index:04}"),
                    kind,
                    text: format!("{kind} about {}", THEMES[theme]),
                    embedding: Some(embedding),
                    relevance: None,
                    created_at: format!("2024-01-01T00:{:02}:{:02}Z", index / 60 % 60, index % 60),
                }
            })
            .collect();

        Self::from_records(records)
    }
}

/// Where a batch comes from. Cloneable so a loader thread can re-run it.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordSource {
    File(PathBuf),
    Demo {
        count: usize,
        dimension: usize,
        seed: u64,
    },
}

impl RecordSource {
    pub fn load(&self) -> Result<RecordBatch> {
        match self {
            Self::File(path) => RecordBatch::load(path),
            Self::Demo {
                count,
                dimension,
                seed,
            } => {
                let batch = RecordBatch::demo(*count, *dimension, *seed);
                tracing::info!(records = batch.len(), seed, "generated demo batch");
                Ok(batch)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Demo { count, seed, .. } => format!("demo ({count} records, seed {seed})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_and_string_embeddings() {
        let batch = RecordBatch::from_json(
            r#"[
                {"id": "a", "group_type": "dream", "content": "stairs", "embedding": [1, 0, 0]},
                {"id": "b", "kind": "Thought", "text": "sea", "embedding": "[0.5, 0.5, 0]"}
            ]"#,
        )
        .unwrap();

        assert_eq!(batch.dimension, Some(3));
        assert_eq!(batch.records[0].kind, NodeKind::Dream);
        assert_eq!(batch.records[0].text, "stairs");
        assert_eq!(batch.records[1].kind, NodeKind::Thought);
        assert_eq!(batch.records[1].embedding, Some(vec![0.5, 0.5, 0.0]));
    }

    #[test]
    fn malformed_embeddings_keep_the_record() {
        let batch = RecordBatch::from_json(
            r#"[
                {"id": "ok", "embedding": [1, 2]},
                {"id": "garbled", "embedding": "[1, 2"},
                {"id": "missing"},
                {"id": "empty", "embedding": []},
                {"id": "wrong-dim", "embedding": [1, 2, 3]}
            ]"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 5);
        let with_embedding = batch
            .records
            .iter()
            .filter(|record| record.has_embedding())
            .map(|record| record.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(with_embedding, vec!["ok"]);
    }

    #[test]
    fn typed_embeddings_are_checked_before_fixing_the_dimension() {
        let batch = RecordBatch::from_records(vec![
            NodeRecord::new("blank", NodeKind::Memory, Some(Vec::new())),
            NodeRecord::new("nan", NodeKind::Memory, Some(vec![f32::NAN, 0.0])),
            NodeRecord::new("inf", NodeKind::Dream, Some(vec![1.0, f32::INFINITY])),
            NodeRecord::new("e1", NodeKind::Memory, Some(vec![1.0, 0.0])),
            NodeRecord::new("e2", NodeKind::Memory, Some(vec![1.0, 0.0])),
            NodeRecord::new("wide", NodeKind::Thought, Some(vec![1.0, 0.0, 0.0])),
        ]);

        assert_eq!(batch.len(), 6);
        assert_eq!(batch.dimension(), Some(2));
        let with_embedding = batch
            .records()
            .iter()
            .filter(|record| record.has_embedding())
            .map(|record| record.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(with_embedding, vec!["e1", "e2"]);

        let settings = crate::similarity::GraphSettings {
            threshold: 0.5,
            ..Default::default()
        };
        let graph = crate::similarity::build(
            batch.records(),
            &settings,
            crate::similarity::EdgeTuning::default(),
        );
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.skipped, 4);
    }

    #[test]
    fn check_embedding_reports_the_first_bad_component() {
        assert!(matches!(check_embedding(&[]), Err(EmbeddingError::Empty)));
        assert!(matches!(
            check_embedding(&[0.0, f32::NEG_INFINITY, f32::NAN]),
            Err(EmbeddingError::NonFinite { index: 1 })
        ));
        assert!(check_embedding(&[0.5, -0.5]).is_ok());
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let batch = RecordBatch::from_records(vec![
            NodeRecord::new("x", NodeKind::Memory, None),
            NodeRecord::new("x", NodeKind::Dream, None),
        ]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records[0].kind, NodeKind::Memory);
    }

    #[test]
    fn relevance_is_clamped() {
        let mut high = NodeRecord::new("high", NodeKind::Memory, None);
        high.relevance = Some(3.0);
        let mut nan = NodeRecord::new("nan", NodeKind::Memory, None);
        nan.relevance = Some(f32::NAN);

        let batch = RecordBatch::from_records(vec![high, nan]);
        assert_eq!(batch.records[0].relevance, Some(1.0));
        assert_eq!(batch.records[1].relevance, None);
    }

    #[test]
    fn accepts_wrapped_records_object() {
        let batch = RecordBatch::from_json(r#"{"records": [{"id": "a"}]}"#).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(RecordBatch::from_json("42").is_err());
    }

    #[test]
    fn demo_batch_is_deterministic() {
        let first = RecordBatch::demo(12, 8, 7);
        let second = RecordBatch::demo(12, 8, 7);
        assert_eq!(first.records, second.records);
        assert_eq!(first.dimension, Some(8));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let source = RecordSource::File(PathBuf::from("/nonexistent/records.json"));
        let error = source.load().unwrap_err();
        assert!(format!("{error:#}").contains("/nonexistent/records.json"));
    }

    #[test]
    fn demo_source_generates_requested_count() {
        let source = RecordSource::Demo {
            count: 12,
            dimension: 8,
            seed: 1,
        };
        let batch = source.load().unwrap();
        assert_eq!(batch.len(), 12);
        assert_eq!(batch.dimension, Some(8));
    }
}
