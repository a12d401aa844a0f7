use engram_map::camera::{Camera, CameraConfig};
use engram_map::interaction::PointerRelease;
use engram_map::layout::{LayoutEngine, PhysicsConfig, Spring};
use engram_map::projection::{self, DrawList, NodeView, ProjectionConfig, Viewport};
use engram_map::similarity::{self, EdgeTuning, GraphSettings};
use engram_map::{MapConfig, NodeKind, NodeRecord, RecordBatch, Scene, SceneCommand};
use glam::{Vec2, Vec3};

fn trio() -> Vec<NodeRecord> {
    vec![
        NodeRecord::new("e1", NodeKind::Memory, Some(vec![1.0, 0.0])),
        NodeRecord::new("e2", NodeKind::Memory, Some(vec![1.0, 0.0])),
        NodeRecord::new("e3", NodeKind::Memory, Some(vec![0.0, 1.0])),
    ]
}

fn settings(threshold: f32) -> GraphSettings {
    GraphSettings {
        threshold,
        ..GraphSettings::default()
    }
}

fn still_config(threshold: f32) -> MapConfig {
    MapConfig {
        threshold,
        seed: Some(11),
        camera: CameraConfig {
            auto_rotate: false,
            ..CameraConfig::default()
        },
        ..MapConfig::default()
    }
}

fn edge_pairs(threshold: f32) -> Vec<(usize, usize)> {
    similarity::build(&trio(), &settings(threshold), EdgeTuning::default())
        .edges
        .iter()
        .map(|edge| (edge.a, edge.b))
        .collect()
}

#[test]
fn identical_pair_links_and_orthogonal_node_stays_isolated() {
    assert_eq!(edge_pairs(0.5), vec![(0, 1)]);
}

#[test]
fn raising_the_threshold_keeps_the_identical_pair() {
    let loose = edge_pairs(0.5);
    let tight = edge_pairs(0.99);
    assert_eq!(tight, vec![(0, 1)]);
    assert!(tight.len() <= loose.len());
}

#[test]
fn similarity_equal_to_threshold_makes_no_edge() {
    assert!(edge_pairs(1.0).is_empty());
}

#[test]
fn threshold_rebuild_keeps_positions() {
    let mut scene = Scene::new(RecordBatch::from_records(trio()), &still_config(0.5));
    for _ in 0..5 {
        scene.frame();
    }

    scene.queue(SceneCommand::SetPaused(true));
    scene.frame();
    let before = ["e1", "e2", "e3"].map(|id| scene.layout().position(id));

    scene.queue(SceneCommand::SetThreshold(0.99));
    scene.queue(SceneCommand::ToggleKind(NodeKind::Dream));
    scene.frame();
    let after = ["e1", "e2", "e3"].map(|id| scene.layout().position(id));

    assert_eq!(before, after);
    assert!(after.iter().all(Option::is_some));
}

#[test]
fn filtered_out_ids_keep_no_state() {
    let mut records = trio();
    records[2].kind = NodeKind::Dream;
    let mut scene = Scene::new(RecordBatch::from_records(records), &still_config(0.5));
    scene.frame();

    scene.queue(SceneCommand::ToggleKind(NodeKind::Dream));
    scene.frame();
    assert_eq!(scene.layout().position("e3"), None);
    assert_eq!(scene.stats().members, 2);
}

#[test]
fn replacing_records_carries_surviving_ids() {
    let mut scene = Scene::new(RecordBatch::from_records(trio()), &still_config(0.5));
    scene.queue(SceneCommand::SetPaused(true));
    scene.frame();
    let e1 = scene.layout().position("e1");

    let mut next = trio();
    next.remove(1);
    next.push(NodeRecord::new("e4", NodeKind::Thought, Some(vec![0.6, 0.8])));
    scene.queue(SceneCommand::ReplaceRecords(RecordBatch::from_records(next)));
    scene.frame();

    assert_eq!(scene.layout().position("e1"), e1);
    assert_eq!(scene.layout().position("e2"), None);
    assert!(scene.layout().position("e4").is_some());
}

#[test]
fn kinetic_energy_dissipates() {
    let records = RecordBatch::demo(60, 16, 3);
    let graph = similarity::build(&records.records(), &settings(0.6), EdgeTuning::default());
    let mut layout = LayoutEngine::new(PhysicsConfig::default(), 3);
    layout.sync(graph.members.iter().map(|&index| records.records()[index].id.as_str()));
    let springs = graph
        .edges
        .iter()
        .map(|edge| Spring {
            a: edge.a,
            b: edge.b,
            rest_length: edge.rest_length,
        })
        .collect::<Vec<_>>();

    layout.step(&springs);
    let first = layout.kinetic_energy();
    for _ in 0..1500 {
        layout.step(&springs);
    }
    let last = layout.kinetic_energy();

    assert!(first > 0.0);
    assert!(last < first, "energy {last} did not fall below {first}");
    assert!(layout.positions().iter().all(|position| position.is_finite()));
}

#[test]
fn origin_lands_on_viewport_center() {
    let camera = Camera::new(CameraConfig {
        auto_rotate: false,
        ..CameraConfig::default()
    });
    let view = NodeView {
        position: Vec3::ZERO,
        kind: NodeKind::Memory,
        relevance: None,
        selected: false,
    };
    let mut list = DrawList::default();
    projection::project(
        &[view],
        &[],
        &camera,
        Viewport::new(640.0, 480.0),
        &ProjectionConfig::default(),
        &mut list,
    );
    assert_eq!(list.nodes[0].screen(), Vec2::new(320.0, 240.0));
}

#[test]
fn clicking_a_node_selects_it_and_empty_space_clears() {
    let mut scene = Scene::new(RecordBatch::from_records(trio()), &still_config(0.5));
    scene.frame();

    // The last sprite is the nearest one, so it wins any overlap.
    let nearest = *scene.draw_list().nodes.last().unwrap();
    let expected = scene.record_at_slot(nearest.index).unwrap().id.clone();

    scene.pointer_down(nearest.screen());
    assert_eq!(
        scene.pointer_up(nearest.screen()),
        PointerRelease::Click(Some(nearest.index))
    );
    assert_eq!(scene.selected().map(|record| record.id.clone()), Some(expected));

    let far = Vec2::new(-5_000.0, -5_000.0);
    scene.pointer_down(far);
    assert_eq!(scene.pointer_up(far), PointerRelease::Click(None));
    assert!(scene.selected().is_none());
}

#[test]
fn records_without_embeddings_are_isolated_members() {
    let mut records = trio();
    records.push(NodeRecord::new("bare", NodeKind::Thought, None));
    let mut scene = Scene::new(RecordBatch::from_records(records), &still_config(0.5));
    scene.frame();

    let stats = scene.stats();
    assert_eq!(stats.members, 4);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.edges, 1);
    assert!(scene.layout().position("bare").is_some());
}

#[test]
fn cap_drops_records_beyond_the_limit() {
    let mut config = still_config(0.0);
    config.max_nodes = 2;
    let mut scene = Scene::new(RecordBatch::from_records(trio()), &config);
    scene.frame();
    assert_eq!(scene.layout().ids(), ["e1", "e2"]);
    assert!(scene.draw_list().nodes.iter().all(|sprite| sprite.index < 2));
}
