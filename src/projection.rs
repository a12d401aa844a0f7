//! World-to-screen projection and the per-frame draw list handed to a
//! renderer.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::records::NodeKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const SELECTED: Rgb = Rgb(245, 206, 93);

    pub fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Memory => Rgb(129, 140, 248),
            NodeKind::Dream => Rgb(236, 72, 153),
            NodeKind::Thought => Rgb(251, 191, 36),
            NodeKind::Interaction => Rgb(52, 211, 153),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub focal_length: f32,
    /// Nodes closer to the eye than this are dropped from the frame.
    pub near_clip: f32,
    /// Depth span over which opacity fades from full to `min_opacity`.
    pub fog_range: f32,
    pub min_opacity: f32,
    pub min_size: f32,
    pub max_size: f32,
    /// Relevance below this marks a node as dust.
    pub dust_cutoff: f32,
    pub dust_opacity: f32,
    pub edge_opacity: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            focal_length: 600.0,
            near_clip: 10.0,
            fog_range: 400.0,
            min_opacity: 0.2,
            min_size: 0.75,
            max_size: 48.0,
            dust_cutoff: 0.35,
            dust_opacity: 0.15,
            edge_opacity: 0.6,
        }
    }
}

fn base_size(kind: NodeKind) -> f32 {
    match kind {
        NodeKind::Memory => 6.0,
        NodeKind::Dream => 7.0,
        NodeKind::Thought => 5.0,
        NodeKind::Interaction => 5.5,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// One arena slot as seen by the projector.
#[derive(Clone, Copy, Debug)]
pub struct NodeView {
    pub position: Vec3,
    pub kind: NodeKind,
    pub relevance: Option<f32>,
    pub selected: bool,
}

/// An edge between two arena slots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub a: usize,
    pub b: usize,
    pub similarity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeSprite {
    /// Arena slot of the node.
    pub index: usize,
    pub screen_x: f32,
    pub screen_y: f32,
    pub depth: f32,
    pub size: f32,
    pub color: Rgb,
    pub opacity: f32,
    pub dust: bool,
    pub selected: bool,
}

impl NodeSprite {
    pub fn screen(&self) -> Vec2 {
        Vec2::new(self.screen_x, self.screen_y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeSegment {
    pub a: usize,
    pub b: usize,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub depth: f32,
    pub opacity: f32,
}

/// Everything a renderer needs for one frame, sorted back to front.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    pub nodes: Vec<NodeSprite>,
    pub edges: Vec<EdgeSegment>,
    pub(crate) slot_to_sprite: Vec<Option<usize>>,
}

impl DrawList {
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.slot_to_sprite.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The sprite drawn for an arena slot, if it survived clipping.
    pub fn sprite(&self, slot: usize) -> Option<&NodeSprite> {
        self.slot_to_sprite
            .get(slot)
            .copied()
            .flatten()
            .map(|position| &self.nodes[position])
    }
}

fn depth_falloff(depth: f32, zoom: f32, config: &ProjectionConfig) -> f32 {
    let range = config.fog_range.max(f32::EPSILON);
    (1.0 - (depth - zoom) / (2.0 * range)).clamp(config.min_opacity, 1.0)
}

/// Projects a single world point. `None` when it falls behind the near clip.
pub fn project_point(
    world: Vec3,
    camera: &Camera,
    viewport: Viewport,
    config: &ProjectionConfig,
) -> Option<(Vec2, f32, f32)> {
    let rotated = camera.rotate(world);
    let depth = rotated.z + camera.zoom;
    if !(depth >= config.near_clip) {
        return None;
    }

    let scale = config.focal_length / depth;
    let screen = Vec2::new(rotated.x, rotated.y) * scale + viewport.center();
    if !screen.is_finite() || !scale.is_finite() {
        return None;
    }
    Some((screen, depth, scale))
}

pub fn project(
    nodes: &[NodeView],
    links: &[Link],
    camera: &Camera,
    viewport: Viewport,
    config: &ProjectionConfig,
    out: &mut DrawList,
) {
    out.clear();
    out.nodes.reserve(nodes.len());

    for (index, node) in nodes.iter().enumerate() {
        let Some((screen, depth, scale)) = project_point(node.position, camera, viewport, config)
        else {
            continue;
        };

        let mut size = (base_size(node.kind) * scale).clamp(config.min_size, config.max_size);
        let mut opacity = depth_falloff(depth, camera.zoom, config);
        let mut dust = false;
        match node.relevance {
            Some(relevance) if relevance < config.dust_cutoff => {
                dust = true;
                opacity *= config.dust_opacity;
                size *= 0.5;
            }
            Some(relevance) => {
                opacity *= 0.5 + 0.5 * relevance;
                size *= 1.0 + 0.6 * relevance;
            }
            None => {}
        }

        out.nodes.push(NodeSprite {
            index,
            screen_x: screen.x,
            screen_y: screen.y,
            depth,
            size,
            color: if node.selected {
                Rgb::SELECTED
            } else {
                Rgb::for_kind(node.kind)
            },
            opacity,
            dust,
            selected: node.selected,
        });
    }

    out.nodes.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    out.slot_to_sprite.resize(nodes.len(), None);
    for (position, sprite) in out.nodes.iter().enumerate() {
        out.slot_to_sprite[sprite.index] = Some(position);
    }

    for link in links {
        let (Some(from), Some(to)) = (out.sprite(link.a), out.sprite(link.b)) else {
            continue;
        };
        let weight = link.similarity.clamp(0.0, 1.0);
        let segment = EdgeSegment {
            a: link.a,
            b: link.b,
            x1: from.screen_x,
            y1: from.screen_y,
            x2: to.screen_x,
            y2: to.screen_y,
            depth: (from.depth + to.depth) * 0.5,
            opacity: config.edge_opacity * weight * from.opacity.min(to.opacity),
        };
        out.edges.push(segment);
    }
    out.edges.sort_by(|a, b| b.depth.total_cmp(&a.depth));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(position: Vec3) -> NodeView {
        NodeView {
            position,
            kind: NodeKind::Memory,
            relevance: None,
            selected: false,
        }
    }

    fn still_camera() -> Camera {
        Camera::default()
    }

    #[test]
    fn origin_projects_to_viewport_center() {
        let viewport = Viewport::new(800.0, 600.0);
        let mut list = DrawList::default();
        project(
            &[view(Vec3::ZERO)],
            &[],
            &still_camera(),
            viewport,
            &ProjectionConfig::default(),
            &mut list,
        );
        assert_eq!(list.nodes[0].screen(), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn reused_draw_list_grows_with_the_scene() {
        let mut list = DrawList::default();
        let config = ProjectionConfig::default();
        let small = [view(Vec3::ZERO), view(Vec3::X * 10.0)];
        project(&small, &[], &still_camera(), Viewport::default(), &config, &mut list);
        let grown = (0..40)
            .map(|step| view(Vec3::new(step as f32 * 4.0 - 80.0, 0.0, 0.0)))
            .collect::<Vec<_>>();
        project(&grown, &[], &still_camera(), Viewport::default(), &config, &mut list);

        assert_eq!(list.nodes.len(), 40);
        assert!(list.nodes.capacity() >= grown.len());
        assert!((0..40).all(|slot| list.sprite(slot).is_some()));
    }

    #[test]
    fn nodes_behind_the_near_clip_are_omitted() {
        let camera = still_camera();
        let behind = Vec3::new(0.0, 0.0, -camera.zoom - 1.0);
        let mut list = DrawList::default();
        project(
            &[view(behind), view(Vec3::ZERO)],
            &[Link {
                a: 0,
                b: 1,
                similarity: 0.9,
            }],
            &camera,
            Viewport::default(),
            &ProjectionConfig::default(),
            &mut list,
        );
        assert_eq!(list.nodes.len(), 1);
        assert_eq!(list.nodes[0].index, 1);
        assert!(list.edges.is_empty());
        assert!(list.sprite(0).is_none());
    }

    #[test]
    fn draw_list_is_sorted_back_to_front() {
        let nodes = [
            view(Vec3::new(0.0, 0.0, -100.0)),
            view(Vec3::new(0.0, 0.0, 300.0)),
            view(Vec3::new(0.0, 0.0, 50.0)),
        ];
        let mut list = DrawList::default();
        project(
            &nodes,
            &[
                Link {
                    a: 0,
                    b: 2,
                    similarity: 0.8,
                },
                Link {
                    a: 1,
                    b: 2,
                    similarity: 0.8,
                },
            ],
            &still_camera(),
            Viewport::default(),
            &ProjectionConfig::default(),
            &mut list,
        );
        let order = list.nodes.iter().map(|sprite| sprite.index).collect::<Vec<_>>();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(list.edges[0].depth >= list.edges[1].depth);
        assert_eq!((list.edges[0].a, list.edges[0].b), (1, 2));
    }

    #[test]
    fn nearer_nodes_draw_larger() {
        let nodes = [view(Vec3::new(0.0, 0.0, 200.0)), view(Vec3::new(0.0, 0.0, -200.0))];
        let mut list = DrawList::default();
        project(
            &nodes,
            &[],
            &still_camera(),
            Viewport::default(),
            &ProjectionConfig::default(),
            &mut list,
        );
        let far = list.sprite(0).unwrap();
        let near = list.sprite(1).unwrap();
        assert!(near.size > far.size);
        assert!(near.opacity >= far.opacity);
    }

    #[test]
    fn low_relevance_becomes_dust() {
        let mut dusty = view(Vec3::ZERO);
        dusty.relevance = Some(0.1);
        let mut relevant = view(Vec3::ZERO);
        relevant.relevance = Some(0.9);
        let mut list = DrawList::default();
        project(
            &[dusty, relevant],
            &[],
            &still_camera(),
            Viewport::default(),
            &ProjectionConfig::default(),
            &mut list,
        );
        let dusty = list.sprite(0).unwrap();
        let relevant = list.sprite(1).unwrap();
        assert!(dusty.dust && !relevant.dust);
        assert!(dusty.opacity < relevant.opacity);
        assert!(dusty.opacity > 0.0);
    }

    #[test]
    fn selected_node_uses_highlight_color() {
        let mut selected = view(Vec3::ZERO);
        selected.selected = true;
        let mut list = DrawList::default();
        project(
            &[selected],
            &[],
            &still_camera(),
            Viewport::default(),
            &ProjectionConfig::default(),
            &mut list,
        );
        assert_eq!(list.nodes[0].color, Rgb::SELECTED);
    }
}
