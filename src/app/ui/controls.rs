use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{self, Ui};
use engram_map::{NodeKind, NodeRecord, SceneCommand};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::util::record_label;

use super::super::{SearchMatchCache, ViewModel};

const MAX_NODES_LIMIT: usize = 1500;
const SEARCH_RESULT_ROWS: usize = 40;

fn fuzzy_match_score(matcher: &SkimMatcherV2, record: &NodeRecord, query: &str) -> Option<i64> {
    let text_score = matcher
        .fuzzy_match(&record.text, query)
        .or_else(|| matcher.fuzzy_match(&record.text.to_lowercase(), &query.to_lowercase()));
    let id_score = matcher.fuzzy_match(&record.id, query);
    text_score.max(id_score)
}

fn rank_matches(records: &[NodeRecord], query: &str) -> Vec<String> {
    let matcher = SkimMatcherV2::default();
    let mut scored = records
        .iter()
        .filter_map(|record| {
            fuzzy_match_score(&matcher, record, query).map(|score| (score, record.id.clone()))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, id)| id).collect()
}

impl ViewModel {
    pub(in crate::app) fn refresh_search_cache(&mut self) {
        let query = self.search.trim();
        if query.is_empty() {
            self.search_match_cache = None;
            return;
        }

        if let Some(cached) = &self.search_match_cache
            && cached.batch_revision == self.batch_revision
            && cached.query == query
        {
            return;
        }

        let ranked = rank_matches(self.frame_loop.scene().records(), query);
        let matches = Arc::new(ranked.iter().cloned().collect::<HashSet<_>>());
        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            batch_revision: self.batch_revision,
            ranked,
            matches,
        });
    }

    pub(in crate::app) fn send(&self, command: SceneCommand) {
        if !self.commands.send(command) {
            tracing::warn!("scene is gone, dropping command");
        }
    }

    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Map Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Search")
            .on_hover_text("Fuzzy-highlight records whose text or id matches.");
        ui.text_edit_singleline(&mut self.search);
        self.draw_search_results(ui);

        ui.separator();

        let threshold = ui
            .add(egui::Slider::new(&mut self.threshold, 0.0..=1.0).text("Similarity threshold"))
            .on_hover_text("Only pairs more similar than this are linked.");
        if threshold.changed() {
            self.send(SceneCommand::SetThreshold(self.threshold));
        }

        let max_nodes = ui
            .add(
                egui::Slider::new(&mut self.max_nodes, 1..=MAX_NODES_LIMIT)
                    .logarithmic(true)
                    .text("Max nodes"),
            )
            .on_hover_text("Records beyond this many are left out of the map.");
        if max_nodes.changed() {
            self.send(SceneCommand::SetMaxNodes(self.max_nodes));
        }

        ui.separator();
        ui.label("Kinds");
        ui.horizontal_wrapped(|ui| {
            for kind in NodeKind::ALL {
                let mut enabled = self.kinds.allows(kind);
                if ui.checkbox(&mut enabled, kind.label()).changed() {
                    self.kinds.toggle(kind);
                    self.send(SceneCommand::ToggleKind(kind));
                }
            }
        });

        ui.separator();
        if ui
            .checkbox(&mut self.auto_rotate, "Auto-rotate")
            .changed()
        {
            self.send(SceneCommand::SetAutoRotate(self.auto_rotate));
        }
        if ui
            .checkbox(&mut self.paused, "Pause layout")
            .on_hover_text("Freeze node positions; the camera still moves.")
            .changed()
        {
            self.send(SceneCommand::SetPaused(self.paused));
        }
        ui.checkbox(&mut self.show_fps_bar, "FPS display");
    }

    fn draw_search_results(&mut self, ui: &mut Ui) {
        self.refresh_search_cache();
        let Some(cache) = &self.search_match_cache else {
            return;
        };

        ui.label(format!("{} matches", cache.ranked.len()));
        let scene = self.frame_loop.scene();
        let selected_id = scene.selected().map(|record| record.id.clone());
        let mut clicked = None;

        egui::ScrollArea::vertical()
            .id_salt("search_results_scroll")
            .max_height(220.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for id in cache.ranked.iter().take(SEARCH_RESULT_ROWS) {
                    let Some(record) = scene.record(id) else {
                        continue;
                    };
                    let is_selected = selected_id.as_deref() == Some(id.as_str());
                    if ui
                        .selectable_label(is_selected, record_label(id, &record.text, 40))
                        .on_hover_text(format!("{} · {}", record.kind, record.id))
                        .clicked()
                    {
                        clicked = Some(id.clone());
                    }
                }
            });

        if let Some(id) = clicked {
            self.frame_loop.scene_mut().select(Some(id));
        }
    }
}
