use std::collections::VecDeque;
use std::sync::mpsc;

use eframe::egui::{self, Align, Context, Layout};
use engram_map::{FrameLoop, MapConfig, RecordBatch, Scene, SceneCommand};

use super::super::ViewModel;
use super::super::render_utils::EguiRenderer;

impl ViewModel {
    pub(in crate::app) const INITIAL_NEIGHBOR_ROWS: usize = 12;
    pub(in crate::app) const NEIGHBOR_PAGE_ROWS: usize = 12;

    pub(in crate::app) fn new(batch: RecordBatch, config: &MapConfig) -> Self {
        let mut scene = Scene::new(batch, config);
        let commands = scene.commands();

        let (selection_tx, selection_rx) = mpsc::channel();
        scene.on_select(move |record| {
            let _ = selection_tx.send(record.map(|record| record.id.clone()));
        });

        let settings = scene.settings().clone();
        Self {
            frame_loop: FrameLoop::new(scene, EguiRenderer::new()),
            commands,
            selection_rx,
            config: config.clone(),
            threshold: settings.threshold,
            max_nodes: settings.max_nodes,
            kinds: settings.kinds,
            auto_rotate: config.camera.auto_rotate,
            paused: false,
            search: String::new(),
            search_match_cache: None,
            batch_revision: 0,
            neighbor_rows_visible: Self::INITIAL_NEIGHBOR_ROWS,
            show_fps_bar: true,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
        }
    }

    pub(in crate::app) fn replace_records(&mut self, batch: RecordBatch) {
        self.batch_revision += 1;
        self.send(SceneCommand::ReplaceRecords(batch));
    }

    fn drain_selection(&mut self) {
        while let Ok(selected) = self.selection_rx.try_recv() {
            tracing::debug!(?selected, "viewer selection");
            self.neighbor_rows_visible = Self::INITIAL_NEIGHBOR_ROWS;
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        source: &str,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        self.update_fps_counter(ctx);
        self.drain_selection();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("engram-map");
                    ui.separator();
                    ui.label(format!("source: {source}"));
                    ui.label(format!(
                        "records: {}",
                        self.frame_loop.scene().records().len()
                    ));
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload records"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    if is_loading {
                        ui.spinner();
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.graph_stats_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui));
    }
}
