use anyhow::Result;
use engram_map::projection::DrawList;
use engram_map::scene::FrameStats;
use engram_map::{FrameLoop, MapConfig, RecordSource, Renderer, Scene};

const LOG_EVERY: u64 = 60;

/// Stands in for a window: logs what each frame would have drawn.
#[derive(Default)]
struct LogRenderer {
    frames: u64,
    last: FrameStats,
}

impl Renderer for LogRenderer {
    fn render(&mut self, _draw_list: &DrawList, scene: &Scene) {
        self.frames += 1;
        self.last = scene.stats();
        if self.frames % LOG_EVERY == 0 {
            tracing::info!(
                frame = self.last.frame,
                nodes = self.last.visible_nodes,
                edges = self.last.visible_edges,
                energy = self.last.kinetic_energy,
                "frame"
            );
        }
    }

    fn release(&mut self) {
        tracing::info!(
            frames = self.frames,
            members = self.last.members,
            edges = self.last.edges,
            skipped = self.last.skipped,
            energy = self.last.kinetic_energy,
            "headless run finished"
        );
    }
}

pub fn run(source: &RecordSource, config: &MapConfig, frames: u64) -> Result<()> {
    let batch = source.load()?;
    let mut scene = Scene::new(batch, config);
    scene.on_select(|record| {
        if let Some(record) = record {
            tracing::info!(id = %record.id, kind = %record.kind, "selected");
        }
    });

    let mut frame_loop = FrameLoop::new(scene, LogRenderer::default());
    let rendered = frame_loop.run_frames(frames);
    frame_loop.shutdown();
    tracing::debug!(rendered, "frame loop stopped");
    Ok(())
}
