use eframe::egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, vec2};
use engram_map::projection::{DrawList, EdgeSegment, NodeSprite, Rgb};
use engram_map::{Renderer, Scene};

const EDGE_TINT: Rgb = Rgb(148, 163, 184);

pub(super) fn rgba(color: Rgb, opacity: f32) -> Color32 {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(color.0, color.1, color.2, alpha)
}

pub(super) fn to_pos(origin: Pos2, x: f32, y: f32) -> Pos2 {
    origin + vec2(x, y)
}

/// Dark backdrop with faint orbit rings whose spacing follows the zoom.
pub(super) fn draw_background(painter: &Painter, rect: Rect, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(11, 13, 24));

    let step = (48_000.0 / zoom.max(1.0)).clamp(40.0, 240.0);
    let reach = rect.width().hypot(rect.height()) * 0.5;
    let mut radius = step;
    while radius < reach {
        painter.circle_stroke(
            rect.center(),
            radius,
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(70, 80, 120, 28)),
        );
        radius += step;
    }
}

/// Turns each finished frame into egui shapes, offset into the graph rect.
/// The view drains the shapes into its painter after every tick.
pub(super) struct EguiRenderer {
    origin: Pos2,
    shapes: Vec<Shape>,
}

impl EguiRenderer {
    pub(super) fn new() -> Self {
        Self {
            origin: Pos2::ZERO,
            shapes: Vec::new(),
        }
    }

    pub(super) fn set_origin(&mut self, origin: Pos2) {
        self.origin = origin;
    }

    pub(super) fn drain(&mut self) -> std::vec::Drain<'_, Shape> {
        self.shapes.drain(..)
    }
}

impl EguiRenderer {
    fn push_edge(&mut self, edge: &EdgeSegment) {
        self.shapes.push(Shape::line_segment(
            [
                to_pos(self.origin, edge.x1, edge.y1),
                to_pos(self.origin, edge.x2, edge.y2),
            ],
            Stroke::new(1.0, rgba(EDGE_TINT, edge.opacity)),
        ));
    }

    fn push_sprite(&mut self, sprite: &NodeSprite) {
        let center = to_pos(self.origin, sprite.screen_x, sprite.screen_y);
        let radius = sprite.size * 0.5;
        if !sprite.dust && !sprite.selected {
            self.shapes.push(Shape::circle_filled(
                center,
                radius * 1.8,
                rgba(sprite.color, sprite.opacity * 0.12),
            ));
        }

        self.shapes.push(Shape::circle_filled(
            center,
            radius,
            rgba(sprite.color, sprite.opacity),
        ));

        if sprite.selected {
            self.shapes.push(Shape::circle_stroke(
                center,
                radius + 5.0,
                Stroke::new(1.6, rgba(Rgb::SELECTED, 0.8)),
            ));
        }
    }
}

impl Renderer for EguiRenderer {
    /// Edges and nodes are each sorted far to near; merging them keeps a far
    /// node from painting over a nearer edge. Ties draw the edge first.
    fn render(&mut self, draw_list: &DrawList, _scene: &Scene) {
        self.shapes.clear();
        self.shapes
            .reserve(draw_list.edges.len() + draw_list.nodes.len() * 2);

        let mut edges = draw_list.edges.iter().peekable();
        let mut nodes = draw_list.nodes.iter().peekable();
        loop {
            let edge_first = match (edges.peek(), nodes.peek()) {
                (Some(edge), Some(sprite)) => edge.depth >= sprite.depth,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if edge_first {
                if let Some(edge) = edges.next() {
                    self.push_edge(edge);
                }
            } else if let Some(sprite) = nodes.next() {
                self.push_sprite(sprite);
            }
        }
    }

    fn release(&mut self) {
        self.shapes = Vec::new();
        tracing::debug!("viewer renderer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_maps_onto_alpha() {
        assert_eq!(rgba(Rgb(10, 20, 30), 1.0).a(), 255);
        assert_eq!(rgba(Rgb(10, 20, 30), 0.0).a(), 0);
        assert_eq!(rgba(Rgb(10, 20, 30), 7.0).a(), 255);
    }

    fn sprite(depth: f32) -> NodeSprite {
        NodeSprite {
            index: 0,
            screen_x: 0.0,
            screen_y: 0.0,
            depth,
            size: 4.0,
            color: Rgb(200, 200, 200),
            opacity: 1.0,
            dust: true,
            selected: false,
        }
    }

    fn edge(depth: f32) -> EdgeSegment {
        EdgeSegment {
            a: 0,
            b: 1,
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            depth,
            opacity: 1.0,
        }
    }

    #[test]
    fn edges_and_nodes_interleave_by_depth() {
        let mut draw_list = DrawList::default();
        draw_list.nodes = vec![sprite(900.0), sprite(300.0)];
        draw_list.edges = vec![edge(1000.0), edge(600.0), edge(300.0)];
        let scene = Scene::new(
            engram_map::RecordBatch::default(),
            &engram_map::MapConfig::default(),
        );

        let mut renderer = EguiRenderer::new();
        renderer.render(&draw_list, &scene);
        let order = renderer
            .drain()
            .map(|shape| match shape {
                Shape::LineSegment { .. } => 'e',
                _ => 'n',
            })
            .collect::<String>();
        assert_eq!(order, "eneen");
    }
}
