use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::interaction::InteractionConfig;
use crate::layout::PhysicsConfig;
use crate::projection::ProjectionConfig;
use crate::records::NodeKind;
use crate::similarity::{EdgeTuning, GraphSettings, KindFilter};

/// Every tunable of the map. Missing fields take their defaults, so a config
/// file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub threshold: f32,
    pub max_nodes: usize,
    /// Kind labels admitted at start; empty means all.
    pub kinds: Vec<String>,
    pub seed: Option<u64>,
    pub edges: EdgeTuning,
    pub physics: PhysicsConfig,
    pub camera: CameraConfig,
    pub projection: ProjectionConfig,
    pub interaction: InteractionConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        let settings = GraphSettings::default();
        Self {
            threshold: settings.threshold,
            max_nodes: settings.max_nodes,
            kinds: Vec::new(),
            seed: None,
            edges: EdgeTuning::default(),
            physics: PhysicsConfig::default(),
            camera: CameraConfig::default(),
            projection: ProjectionConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

impl MapConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid map config in {}", path.display()))
    }

    pub fn kind_filter(&self) -> KindFilter {
        if self.kinds.is_empty() {
            return KindFilter::all();
        }

        KindFilter::only(self.kinds.iter().filter_map(|label| {
            let kind = NodeKind::parse(label);
            if kind.is_none() {
                tracing::warn!(kind = %label, "ignoring unknown kind in filter");
            }
            kind
        }))
    }

    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            threshold: self.threshold.clamp(0.0, 1.0),
            kinds: self.kind_filter(),
            max_nodes: self.max_nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: MapConfig =
            serde_json::from_str(r#"{"threshold": 0.6, "physics": {"damping": 0.9}}"#).unwrap();
        assert_eq!(config.threshold, 0.6);
        assert_eq!(config.physics.damping, 0.9);
        assert_eq!(config.physics.spring, PhysicsConfig::default().spring);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn kind_labels_become_a_filter() {
        let config = MapConfig {
            kinds: vec!["dream".into(), "Thought".into(), "bogus".into()],
            ..MapConfig::default()
        };
        let filter = config.kind_filter();
        assert!(filter.allows(NodeKind::Dream));
        assert!(filter.allows(NodeKind::Thought));
        assert!(!filter.allows(NodeKind::Memory));
    }

    #[test]
    fn threshold_is_clamped_into_unit_range() {
        let config = MapConfig {
            threshold: 1.7,
            ..MapConfig::default()
        };
        assert_eq!(config.graph_settings().threshold, 1.0);
    }
}
