//! Pointer and wheel handling: orbit drags, zoom, and click picking.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::projection::DrawList;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Net pointer travel below which a press-release counts as a click.
    pub click_epsilon: f32,
    /// Smallest hit radius in pixels, whatever the projected size.
    pub min_hit_radius: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            click_epsilon: 4.0,
            min_hit_radius: 15.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerState {
    Idle,
    Dragging { start: Vec2, last: Vec2 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerRelease {
    /// Short gesture, resolved against the draw list. Holds the arena slot
    /// that was hit.
    Click(Option<usize>),
    /// The gesture rotated the camera; nothing is selected.
    Rotated,
    /// Release without a matching press.
    Ignored,
}

/// The sprite under `point`, preferring the one nearest the camera.
pub fn pick(draw_list: &DrawList, point: Vec2, min_hit_radius: f32) -> Option<usize> {
    draw_list
        .nodes
        .iter()
        .filter(|sprite| sprite.screen().distance(point) <= sprite.size.max(min_hit_radius))
        .min_by(|a, b| a.depth.total_cmp(&b.depth))
        .map(|sprite| sprite.index)
}

#[derive(Clone, Debug)]
pub struct InteractionController {
    state: PointerState,
    config: InteractionConfig,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            state: PointerState::Idle,
            config,
        }
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, PointerState::Dragging { .. })
    }

    pub fn pointer_down(&mut self, point: Vec2) {
        self.state = PointerState::Dragging {
            start: point,
            last: point,
        };
    }

    pub fn pointer_move(&mut self, point: Vec2, camera: &mut Camera) {
        let PointerState::Dragging { start, last } = self.state else {
            return;
        };

        camera.drag(point - last);
        self.state = PointerState::Dragging { start, last: point };
    }

    pub fn pointer_up(&mut self, point: Vec2, draw_list: &DrawList) -> PointerRelease {
        let PointerState::Dragging { start, .. } = self.state else {
            return PointerRelease::Ignored;
        };
        self.state = PointerState::Idle;

        if point.distance(start) < self.config.click_epsilon {
            PointerRelease::Click(pick(draw_list, point, self.config.min_hit_radius))
        } else {
            PointerRelease::Rotated
        }
    }

    /// Abandons a drag, e.g. when the pointer leaves the view.
    pub fn pointer_leave(&mut self) {
        self.state = PointerState::Idle;
    }

    pub fn wheel(&mut self, delta: f32, camera: &mut Camera) {
        camera.zoom_by(delta);
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(InteractionConfig::default())
    }
}
