use eframe::egui::{self, RichText, Ui};
use engram_map::SceneCommand;
use engram_map::scene::Scene;

use crate::util::record_label;

use super::super::ViewModel;

enum DetailsAction {
    Select(Option<String>),
    Focus(Option<String>),
}

/// Records linked to `index`, most similar first.
fn neighbors(scene: &Scene, index: usize) -> Vec<(usize, f32)> {
    let mut linked = scene
        .graph()
        .edges
        .iter()
        .filter_map(|edge| {
            if edge.a == index {
                Some((edge.b, edge.similarity))
            } else if edge.b == index {
                Some((edge.a, edge.similarity))
            } else {
                None
            }
        })
        .collect::<Vec<_>>();
    linked.sort_by(|a, b| b.1.total_cmp(&a.1));
    linked
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Details");
        ui.separator();

        let scene = self.frame_loop.scene();
        let Some(index) = scene
            .selected()
            .and_then(|selected| scene.records().iter().position(|r| r.id == selected.id))
        else {
            ui.label("Click a node to inspect it.");
            return;
        };
        let record = &scene.records()[index];
        let mut action = None;

        egui::Grid::new("record_details")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                ui.label("id");
                ui.label(record.id.as_str());
                ui.end_row();
                ui.label("kind");
                ui.label(record.kind.label());
                ui.end_row();
                ui.label("created");
                ui.label(record.created_at.as_str());
                ui.end_row();
                ui.label("relevance");
                ui.label(match scene.relevance(index) {
                    Some(relevance) => format!("{relevance:.3}"),
                    None => "unscored".to_owned(),
                });
                ui.end_row();
                ui.label("embedding");
                ui.label(match &record.embedding {
                    Some(embedding) => format!("{} dims", embedding.len()),
                    None => "none (isolated)".to_owned(),
                });
                ui.end_row();
            });

        ui.add_space(6.0);
        egui::ScrollArea::vertical()
            .id_salt("record_text_scroll")
            .max_height(200.0)
            .show(ui, |ui| {
                ui.label(record.text.as_str());
            });

        ui.separator();
        ui.horizontal(|ui| {
            let focused = scene.focus() == Some(record.id.as_str());
            if focused {
                if ui.button("Clear relevance").clicked() {
                    action = Some(DetailsAction::Focus(None));
                }
            } else if ui
                .add_enabled(record.has_embedding(), egui::Button::new("Score relevance"))
                .on_hover_text("Dim records that are unlike this one.")
                .clicked()
            {
                action = Some(DetailsAction::Focus(Some(record.id.clone())));
            }

            if ui.button("Deselect").clicked() {
                action = Some(DetailsAction::Select(None));
            }
        });

        ui.separator();
        ui.label(RichText::new("Similar records").strong());
        let linked = neighbors(scene, index);
        if linked.is_empty() {
            ui.label("No links above the current threshold.");
        } else {
            let row_count = linked.len().min(self.neighbor_rows_visible);
            egui::ScrollArea::vertical()
                .id_salt("neighbor_scroll")
                .max_height(320.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for &(neighbor, similarity) in &linked[..row_count] {
                        let other = &scene.records()[neighbor];
                        let label = format!(
                            "{:.2}  {}",
                            similarity,
                            record_label(&other.id, &other.text, 36)
                        );
                        if ui.link(label).on_hover_text(other.id.as_str()).clicked() {
                            action = Some(DetailsAction::Select(Some(other.id.clone())));
                        }
                    }
                });

            if row_count < linked.len() && ui.button("Show more").clicked() {
                self.neighbor_rows_visible = (row_count + Self::NEIGHBOR_PAGE_ROWS).min(linked.len());
            }
        }

        match action {
            Some(DetailsAction::Select(id)) => self.frame_loop.scene_mut().select(id),
            Some(DetailsAction::Focus(id)) => self.send(SceneCommand::Focus(id)),
            None => {}
        }
    }
}
