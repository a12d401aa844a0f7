use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Ui, vec2};
use engram_map::LoopStatus;
use engram_map::interaction::pick;
use engram_map::projection::Viewport;

use crate::util::record_label;

use super::ViewModel;
use super::render_utils::{draw_background, to_pos};

impl ViewModel {
    fn forward_pointer(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        let local = |pos: Pos2| glam::Vec2::new(pos.x - rect.min.x, pos.y - rect.min.y);
        let (pressed, released, latest, scroll) = ui.input(|input| {
            (
                input.pointer.primary_pressed(),
                input.pointer.primary_released(),
                input.pointer.latest_pos(),
                input.raw_scroll_delta.y,
            )
        });

        let scene = self.frame_loop.scene_mut();
        if let Some(pos) = latest {
            if pressed && response.hovered() {
                scene.pointer_down(local(pos));
            } else if scene.is_dragging() {
                scene.pointer_move(local(pos));
            }

            if released && scene.is_dragging() {
                scene.pointer_up(local(pos));
            }
        }

        if scene.is_dragging() && !response.contains_pointer() {
            scene.pointer_leave();
        }

        if response.hovered() && scroll.abs() > f32::EPSILON {
            // Scrolling up moves the eye closer.
            scene.wheel(-scroll);
        }
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.forward_pointer(ui, rect, &response);
        self.frame_loop
            .scene_mut()
            .set_viewport(Viewport::new(rect.width(), rect.height()));
        self.frame_loop.renderer_mut().set_origin(rect.min);

        if self.frame_loop.tick() == LoopStatus::Stopped {
            return;
        }

        draw_background(&painter, rect, self.frame_loop.scene().camera().zoom);
        painter.extend(self.frame_loop.renderer_mut().drain());

        let search_matches = self.cached_search_matches();
        let scene = self.frame_loop.scene();
        let draw_list = scene.draw_list();

        if scene.stats().members == 0 {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No records match the current filters.",
                FontId::proportional(15.0),
                Color32::from_gray(180),
            );
        }

        if let Some(matches) = search_matches.as_deref() {
            for sprite in &draw_list.nodes {
                let Some(record) = scene.record_at_slot(sprite.index) else {
                    continue;
                };
                if matches.contains(&record.id) {
                    painter.circle_stroke(
                        to_pos(rect.min, sprite.screen_x, sprite.screen_y),
                        sprite.size * 0.5 + 3.0,
                        Stroke::new(1.4, Color32::from_rgba_unmultiplied(240, 240, 255, 200)),
                    );
                }
            }
        }

        let hovered = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|pos| rect.contains(*pos))
            .and_then(|pos| {
                let local = glam::Vec2::new(pos.x - rect.min.x, pos.y - rect.min.y);
                pick(draw_list, local, self.config.interaction.min_hit_radius)
            })
            .and_then(|slot| {
                let sprite = draw_list.sprite(slot)?;
                Some((sprite, scene.record_at_slot(slot)?))
            });

        if let Some((sprite, record)) = hovered {
            let center = to_pos(rect.min, sprite.screen_x, sprite.screen_y);
            painter.text(
                center + vec2(sprite.size * 0.5 + 6.0, 0.0),
                Align2::LEFT_CENTER,
                record_label(&record.id, &record.text, 48),
                FontId::proportional(13.0),
                Color32::from_gray(238),
            );
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!("{}  |  {}  |  {}", record.kind, record.id, record.created_at),
                FontId::proportional(13.0),
                Color32::from_gray(200),
            );
        }

        ui.ctx().request_repaint();
    }

    pub(in crate::app) fn cached_search_matches(&mut self) -> Option<Arc<HashSet<String>>> {
        self.refresh_search_cache();
        self.search_match_cache
            .as_ref()
            .map(|cache| Arc::clone(&cache.matches))
    }
}
