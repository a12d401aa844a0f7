//! The simulation context: one per open map, owned by whoever shows it.
//!
//! Event handlers never touch simulation state directly. They push
//! [`SceneCommand`]s, and the scene applies them at the top of the next
//! frame, so a rebuild can never interleave with a physics tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use glam::Vec2;

use crate::camera::Camera;
use crate::config::MapConfig;
use crate::interaction::{InteractionController, PointerRelease};
use crate::layout::{LayoutEngine, Spring};
use crate::projection::{self, DrawList, Link, NodeView, ProjectionConfig, Viewport};
use crate::records::{NodeKind, NodeRecord, RecordBatch};
use crate::similarity::{self, EdgeTuning, GraphSettings, KindFilter, SimilarityGraph};

#[derive(Debug)]
pub enum SceneCommand {
    SetThreshold(f32),
    SetKinds(KindFilter),
    ToggleKind(NodeKind),
    SetMaxNodes(usize),
    /// New data arrived from the store. Surviving ids keep their place.
    ReplaceRecords(RecordBatch),
    /// Score every record against one record's embedding, or clear scoring.
    Focus(Option<String>),
    SetAutoRotate(bool),
    SetPaused(bool),
}

/// Cloneable handle for queueing commands from input handlers or loaders.
#[derive(Clone, Debug)]
pub struct SceneCommands(Sender<SceneCommand>);

impl SceneCommands {
    /// Queues a command. Returns `false` once the scene is gone.
    pub fn send(&self, command: SceneCommand) -> bool {
        self.0.send(command).is_ok()
    }
}

pub type SelectionCallback = Box<dyn FnMut(Option<&NodeRecord>)>;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub members: usize,
    pub edges: usize,
    pub skipped: usize,
    pub visible_nodes: usize,
    pub visible_edges: usize,
    pub kinetic_energy: f32,
}

pub struct Scene {
    batch: RecordBatch,
    settings: GraphSettings,
    tuning: EdgeTuning,
    projection: ProjectionConfig,
    graph: SimilarityGraph,
    /// Record index drawn in each arena slot.
    slot_records: Vec<usize>,
    springs: Vec<Spring>,
    links: Vec<Link>,
    focus: Option<String>,
    focus_relevance: Vec<Option<f32>>,
    layout: LayoutEngine,
    camera: Camera,
    controller: InteractionController,
    viewport: Viewport,
    selected: Option<String>,
    on_select: Option<SelectionCallback>,
    paused: bool,
    sender: Sender<SceneCommand>,
    receiver: Receiver<SceneCommand>,
    views: Vec<NodeView>,
    draw_list: DrawList,
    frame: u64,
}

impl Scene {
    pub fn new(batch: RecordBatch, config: &MapConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let seed = config.seed.unwrap_or_else(rand::random);

        let mut scene = Self {
            batch,
            settings: config.graph_settings(),
            tuning: config.edges,
            projection: config.projection,
            graph: SimilarityGraph::default(),
            slot_records: Vec::new(),
            springs: Vec::new(),
            links: Vec::new(),
            focus: None,
            focus_relevance: Vec::new(),
            layout: LayoutEngine::new(config.physics, seed),
            camera: Camera::new(config.camera),
            controller: InteractionController::new(config.interaction),
            viewport: Viewport::default(),
            selected: None,
            on_select: None,
            paused: false,
            sender,
            receiver,
            views: Vec::new(),
            draw_list: DrawList::default(),
            frame: 0,
        };
        scene.rebuild();
        scene
    }

    pub fn commands(&self) -> SceneCommands {
        SceneCommands(self.sender.clone())
    }

    /// Queues a command for the next frame.
    pub fn queue(&self, command: SceneCommand) {
        // The scene owns a sender, so the channel cannot be closed here.
        let _ = self.sender.send(command);
    }

    pub fn on_select(&mut self, callback: impl FnMut(Option<&NodeRecord>) + 'static) {
        self.on_select = Some(Box::new(callback));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn records(&self) -> &[NodeRecord] {
        self.batch.records()
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn graph(&self) -> &SimilarityGraph {
        &self.graph
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    /// The record drawn in an arena slot.
    pub fn record_at_slot(&self, slot: usize) -> Option<&NodeRecord> {
        self.slot_records
            .get(slot)
            .and_then(|&index| self.batch.records().get(index))
    }

    pub fn record(&self, id: &str) -> Option<&NodeRecord> {
        self.batch.records().iter().find(|record| record.id == id)
    }

    pub fn selected(&self) -> Option<&NodeRecord> {
        self.selected.as_deref().and_then(|id| self.record(id))
    }

    /// Effective relevance of a record: focus scoring when active, else the
    /// score delivered with the record.
    pub fn relevance(&self, record_index: usize) -> Option<f32> {
        if self.focus.is_some() {
            return self.focus_relevance.get(record_index).copied().flatten();
        }
        self.batch
            .records()
            .get(record_index)
            .and_then(|record| record.relevance)
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            frame: self.frame,
            members: self.slot_records.len(),
            edges: self.graph.edges.len(),
            skipped: self.graph.skipped,
            visible_nodes: self.draw_list.nodes.len(),
            visible_edges: self.draw_list.edges.len(),
            kinetic_energy: self.layout.kinetic_energy(),
        }
    }

    fn rebuild(&mut self) {
        self.graph = similarity::build(self.batch.records(), &self.settings, self.tuning);
        self.layout.sync(
            self.graph
                .members
                .iter()
                .map(|&index| self.batch.records()[index].id.as_str()),
        );

        // A repeated id shares the first occurrence's slot and is not drawn twice.
        self.slot_records.clear();
        for &index in &self.graph.members {
            let id = self.batch.records()[index].id.as_str();
            if self.layout.index_of(id) == Some(self.slot_records.len()) {
                self.slot_records.push(index);
            }
        }

        let mut slot_by_record = vec![None; self.batch.records().len()];
        for (slot, &index) in self.slot_records.iter().enumerate() {
            slot_by_record[index] = Some(slot);
        }

        self.springs.clear();
        self.links.clear();
        for edge in &self.graph.edges {
            let (Some(a), Some(b)) = (slot_by_record[edge.a], slot_by_record[edge.b]) else {
                continue;
            };
            self.springs.push(Spring {
                a,
                b,
                rest_length: edge.rest_length,
            });
            self.links.push(Link {
                a,
                b,
                similarity: edge.similarity,
            });
        }
    }

    fn refresh_focus(&mut self) {
        let focus_index = self
            .focus
            .as_deref()
            .and_then(|id| self.batch.records().iter().position(|record| record.id == id));

        match focus_index {
            Some(index) => {
                self.focus_relevance = similarity::relevance_against(self.batch.records(), index);
            }
            None => {
                if let Some(id) = self.focus.take() {
                    tracing::debug!(%id, "focus record not in batch, clearing focus");
                }
                self.focus_relevance.clear();
            }
        }
    }

    /// Drains queued commands. Returns `true` when the graph was rebuilt.
    fn apply_pending(&mut self) -> bool {
        let mut needs_rebuild = false;
        let mut focus_changed = false;

        loop {
            let command = match self.receiver.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };

            match command {
                SceneCommand::SetThreshold(threshold) => {
                    let threshold = if threshold.is_finite() {
                        threshold.clamp(0.0, 1.0)
                    } else {
                        self.settings.threshold
                    };
                    needs_rebuild |= threshold != self.settings.threshold;
                    self.settings.threshold = threshold;
                }
                SceneCommand::SetKinds(kinds) => {
                    needs_rebuild |= kinds != self.settings.kinds;
                    self.settings.kinds = kinds;
                }
                SceneCommand::ToggleKind(kind) => {
                    self.settings.kinds.toggle(kind);
                    needs_rebuild = true;
                }
                SceneCommand::SetMaxNodes(max_nodes) => {
                    needs_rebuild |= max_nodes != self.settings.max_nodes;
                    self.settings.max_nodes = max_nodes;
                }
                SceneCommand::ReplaceRecords(batch) => {
                    tracing::info!(records = batch.len(), "replacing record batch");
                    self.batch = batch;
                    needs_rebuild = true;
                    focus_changed = true;
                }
                SceneCommand::Focus(id) => {
                    self.focus = id;
                    focus_changed = true;
                }
                SceneCommand::SetAutoRotate(enabled) => self.camera.set_auto_rotate(enabled),
                SceneCommand::SetPaused(paused) => self.paused = paused,
            }
        }

        if needs_rebuild {
            self.rebuild();
        }
        if focus_changed {
            self.refresh_focus();
        }
        needs_rebuild
    }

    fn project(&mut self) {
        self.views.clear();
        for (&index, &position) in self.slot_records.iter().zip(self.layout.positions()) {
            let record = &self.batch.records()[index];
            let view = NodeView {
                position,
                kind: record.kind,
                relevance: self.relevance(index),
                selected: self.selected.as_deref() == Some(record.id.as_str()),
            };
            self.views.push(view);
        }

        projection::project(
            &self.views,
            &self.links,
            &self.camera,
            self.viewport,
            &self.projection,
            &mut self.draw_list,
        );
    }

    /// One frame: pending commands, camera, physics tick, projection.
    pub fn frame(&mut self) -> &DrawList {
        self.apply_pending();
        self.camera.advance(self.controller.is_dragging());
        if !self.paused {
            self.layout.step(&self.springs);
        }
        self.project();
        self.frame += 1;
        &self.draw_list
    }

    pub fn pointer_down(&mut self, point: Vec2) {
        self.controller.pointer_down(point);
    }

    pub fn pointer_move(&mut self, point: Vec2) {
        self.controller.pointer_move(point, &mut self.camera);
    }

    pub fn pointer_up(&mut self, point: Vec2) -> PointerRelease {
        let release = self.controller.pointer_up(point, &self.draw_list);
        if let PointerRelease::Click(slot) = release {
            let id = slot
                .and_then(|slot| self.record_at_slot(slot))
                .map(|record| record.id.clone());
            self.select(id);
        }
        release
    }

    pub fn pointer_leave(&mut self) {
        self.controller.pointer_leave();
    }

    pub fn wheel(&mut self, delta: f32) {
        self.controller.wheel(delta, &mut self.camera);
    }

    pub fn is_dragging(&self) -> bool {
        self.controller.is_dragging()
    }

    /// Sets the selection and notifies the selection callback.
    pub fn select(&mut self, id: Option<String>) {
        self.selected = id.filter(|id| self.record(id).is_some());
        tracing::debug!(selected = ?self.selected, "selection changed");

        if let Some(callback) = self.on_select.as_mut() {
            let record = self
                .selected
                .as_deref()
                .and_then(|id| self.batch.records().iter().find(|record| record.id == id));
            callback(record);
        }
    }
}

/// Receives one finished frame at a time.
pub trait Renderer {
    fn render(&mut self, draw_list: &DrawList, scene: &Scene);

    /// Called exactly once when the loop stops.
    fn release(&mut self) {}
}

#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopStatus {
    Continue,
    Stopped,
}

/// Drives a scene into a renderer, one frame per tick, until cancelled.
pub struct FrameLoop<R: Renderer> {
    scene: Scene,
    renderer: R,
    cancel: CancelToken,
    released: bool,
}

impl<R: Renderer> FrameLoop<R> {
    pub fn new(scene: Scene, renderer: R) -> Self {
        Self {
            scene,
            renderer,
            cancel: CancelToken::default(),
            released: false,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn is_running(&self) -> bool {
        !self.released && !self.cancel.is_cancelled()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.renderer.release();
            tracing::debug!(frames = self.scene.frame, "frame loop released");
        }
    }

    pub fn tick(&mut self) -> LoopStatus {
        if self.cancel.is_cancelled() {
            self.release();
            return LoopStatus::Stopped;
        }

        self.scene.frame();
        self.renderer.render(&self.scene.draw_list, &self.scene);
        LoopStatus::Continue
    }

    /// Runs up to `frames` ticks and returns how many rendered.
    pub fn run_frames(&mut self, frames: u64) -> u64 {
        let mut rendered = 0;
        while rendered < frames && self.tick() == LoopStatus::Continue {
            rendered += 1;
        }
        rendered
    }

    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.release();
    }
}

impl<R: Renderer> Drop for FrameLoop<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
