use eframe::egui::Context;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        const FPS_SAMPLE_WINDOW: usize = 180;

        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> Option<String> {
        if !self.show_fps_bar {
            return None;
        }

        let mut parts = vec![format!("FPS {:.0}", self.fps_current)];
        if !self.fps_samples.is_empty() {
            let avg = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
            parts.push(format!("avg {avg:.1}"));
        }
        if let Some(low) = self.fps_samples.iter().copied().reduce(f32::min) {
            parts.push(format!("low {low:.0}"));
        }

        Some(parts.join(" | "))
    }

    pub(in crate::app) fn graph_stats_text(&self) -> String {
        let stats = self.frame_loop.scene().stats();
        let mut text = format!(
            "nodes {}/{}  edges {}/{}  energy {:.2}",
            stats.visible_nodes, stats.members, stats.visible_edges, stats.edges, stats.kinetic_energy
        );
        if stats.skipped > 0 {
            text.push_str(&format!("  no embedding {}", stats.skipped));
        }
        text
    }
}
