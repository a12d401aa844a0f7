//! Edge construction from pairwise embedding similarity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::records::{NodeKind, NodeRecord};

/// Which record kinds take part in the map. An empty filter admits nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindFilter(BTreeSet<NodeKind>);

impl KindFilter {
    pub fn all() -> Self {
        Self(NodeKind::ALL.into_iter().collect())
    }

    pub fn only(kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    pub fn allows(&self, kind: NodeKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn toggle(&mut self, kind: NodeKind) {
        if !self.0.remove(&kind) {
            self.0.insert(kind);
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = NodeKind> + '_ {
        self.0.iter().copied()
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Parameters that change which edges exist. Any change triggers a rebuild.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphSettings {
    pub threshold: f32,
    pub kinds: KindFilter,
    pub max_nodes: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            kinds: KindFilter::all(),
            max_nodes: 250,
        }
    }
}

/// Maps similarity to spring rest length.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeTuning {
    pub rest_min: f32,
    pub rest_range: f32,
}

impl Default for EdgeTuning {
    fn default() -> Self {
        Self {
            rest_min: 20.0,
            rest_range: 300.0,
        }
    }
}

impl EdgeTuning {
    pub fn rest_length(&self, similarity: f32) -> f32 {
        self.rest_min + (1.0 - similarity) * self.rest_range
    }
}

/// An undirected similarity edge between two record indices, `a < b`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub similarity: f32,
    pub rest_length: f32,
}

#[derive(Clone, Debug, Default)]
pub struct SimilarityGraph {
    /// Record indices admitted by the filter and cap, in record order.
    pub members: Vec<usize>,
    pub edges: Vec<Edge>,
    /// Members that take no part in edge math for lack of an embedding.
    pub skipped: usize,
}

/// Cosine similarity. Zero-norm, mismatched or non-finite input yields `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Record indices passing the kind filter, in order, capped at `max_nodes`.
pub fn members(records: &[NodeRecord], settings: &GraphSettings) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| settings.kinds.allows(record.kind))
        .map(|(index, _)| index)
        .take(settings.max_nodes)
        .collect()
}

pub fn build(
    records: &[NodeRecord],
    settings: &GraphSettings,
    tuning: EdgeTuning,
) -> SimilarityGraph {
    let members = members(records, settings);
    let embedded = members
        .iter()
        .filter_map(|&index| {
            records[index]
                .embedding
                .as_deref()
                .map(|embedding| (index, embedding))
        })
        .collect::<Vec<_>>();
    let skipped = members.len() - embedded.len();

    let mut edges = Vec::new();
    for (position, &(a, embedding_a)) in embedded.iter().enumerate() {
        for &(b, embedding_b) in &embedded[position + 1..] {
            let similarity = cosine_similarity(embedding_a, embedding_b);
            if similarity > settings.threshold {
                edges.push(Edge {
                    a,
                    b,
                    similarity,
                    rest_length: tuning.rest_length(similarity),
                });
            }
        }
    }

    tracing::debug!(
        members = members.len(),
        edges = edges.len(),
        skipped,
        threshold = settings.threshold,
        "rebuilt similarity graph"
    );

    SimilarityGraph {
        members,
        edges,
        skipped,
    }
}

/// Relevance of every record to `focus`, as clamped cosine similarity.
pub fn relevance_against(records: &[NodeRecord], focus: usize) -> Vec<Option<f32>> {
    let Some(focus_embedding) = records.get(focus).and_then(|record| record.embedding.as_deref())
    else {
        return vec![None; records.len()];
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            if index == focus {
                return Some(1.0);
            }
            record
                .embedding
                .as_deref()
                .map(|embedding| cosine_similarity(focus_embedding, embedding).clamp(0.0, 1.0))
        })
        .collect()
}
