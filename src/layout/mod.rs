//! Force-directed layout in three dimensions.
//!
//! Node state lives in parallel arrays indexed through a rebuildable
//! id-to-index map, so a rebuild is an id-keyed copy and never resets a
//! surviving node.

mod forces;

use std::collections::HashMap;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use forces::{finite_or_zero, gravity, repulsion_between, spring_between};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub repulsion: f32,
    pub spring: f32,
    /// Velocity retained per tick, in `(0, 1)`.
    pub damping: f32,
    pub max_force: f32,
    pub max_speed: f32,
    /// Half side of the cube new nodes spawn in.
    pub spawn_extent: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.0015,
            repulsion: 900.0,
            spring: 0.004,
            damping: 0.92,
            max_force: 6.0,
            max_speed: 24.0,
            spawn_extent: 200.0,
        }
    }
}

/// A spring between two arena slots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
}

pub struct LayoutEngine {
    config: PhysicsConfig,
    ids: Vec<String>,
    index_by_id: HashMap<String, usize>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    forces: Vec<Vec3>,
    rng: StdRng,
}

impl LayoutEngine {
    pub fn new(config: PhysicsConfig, seed: u64) -> Self {
        Self {
            config,
            ids: Vec::new(),
            index_by_id: HashMap::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
            forces: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> PhysicsConfig {
        self.config
    }

    pub fn set_config(&mut self, config: PhysicsConfig) {
        self.config = config;
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn position(&self, id: &str) -> Option<Vec3> {
        self.index_of(id).map(|index| self.positions[index])
    }

    pub fn velocity(&self, id: &str) -> Option<Vec3> {
        self.index_of(id).map(|index| self.velocities[index])
    }

    /// Places a node explicitly. Returns `false` for unknown ids.
    pub fn place(&mut self, id: &str, position: Vec3, velocity: Vec3) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.positions[index] = position;
        self.velocities[index] = velocity;
        true
    }

    fn spawn_position(&mut self) -> Vec3 {
        let extent = self.config.spawn_extent.abs().max(f32::EPSILON);
        Vec3::new(
            self.rng.random_range(-extent..=extent),
            self.rng.random_range(-extent..=extent),
            self.rng.random_range(-extent..=extent),
        )
    }

    /// Rebuilds the arena for `ids` in the given order. Surviving ids keep
    /// their position and velocity; new ids spawn at rest inside the cube.
    pub fn sync<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prior = std::mem::take(&mut self.index_by_id);
        let prior_positions = std::mem::take(&mut self.positions);
        let prior_velocities = std::mem::take(&mut self.velocities);
        self.ids.clear();

        let mut carried = 0usize;
        let mut spawned = 0usize;
        for id in ids {
            let id = id.as_ref();
            if self.index_by_id.contains_key(id) {
                continue;
            }

            let (position, velocity) = match prior.remove(id) {
                Some(old) => {
                    carried += 1;
                    (prior_positions[old], prior_velocities[old])
                }
                None => {
                    spawned += 1;
                    (self.spawn_position(), Vec3::ZERO)
                }
            };

            self.index_by_id.insert(id.to_owned(), self.ids.len());
            self.ids.push(id.to_owned());
            self.positions.push(position);
            self.velocities.push(velocity);
        }

        tracing::debug!(
            nodes = self.ids.len(),
            carried,
            spawned,
            dropped = prior.len(),
            "synced layout arena"
        );
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self, springs: &[Spring]) {
        let node_count = self.positions.len();
        if node_count == 0 {
            return;
        }

        let config = self.config;
        let positions = &self.positions;
        let forces = &mut self.forces;
        forces.clear();
        forces.resize(node_count, Vec3::ZERO);

        for (force, &position) in forces.iter_mut().zip(positions) {
            *force += gravity(position, config.gravity);
        }

        for i in 0..node_count {
            for j in (i + 1)..node_count {
                let push = repulsion_between(
                    positions[i],
                    positions[j],
                    i,
                    j,
                    config.repulsion,
                    config.max_force,
                );
                forces[i] += push;
                forces[j] -= push;
            }
        }

        for spring in springs {
            if spring.a >= node_count || spring.b >= node_count || spring.a == spring.b {
                continue;
            }
            let pull = spring_between(
                positions[spring.a],
                positions[spring.b],
                spring.rest_length,
                config.spring,
            );
            forces[spring.a] += pull;
            forces[spring.b] -= pull;
        }

        let max_speed_sq = config.max_speed * config.max_speed;
        for ((position, velocity), &force) in self
            .positions
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .zip(self.forces.iter())
        {
            let mut next = (*velocity + finite_or_zero(force)) * config.damping;
            let speed_sq = next.length_squared();
            if speed_sq > max_speed_sq {
                next *= config.max_speed / speed_sq.sqrt();
            }

            if !next.is_finite() {
                *velocity = Vec3::ZERO;
                continue;
            }

            *velocity = next;
            *position += next;
        }
    }

    /// Total kinetic energy, `Σ|v|²`.
    pub fn kinetic_energy(&self) -> f32 {
        self.velocities.iter().map(|velocity| velocity.length_squared()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LayoutEngine {
        LayoutEngine::new(PhysicsConfig::default(), 11)
    }

    #[test]
    fn new_nodes_spawn_inside_the_cube_at_rest() {
        let mut layout = engine();
        layout.sync(["a", "b", "c"]);
        let extent = PhysicsConfig::default().spawn_extent;
        for (position, velocity) in layout.positions().iter().zip(layout.velocities()) {
            assert!(position.abs().max_element() <= extent);
            assert_eq!(*velocity, Vec3::ZERO);
        }
    }

    #[test]
    fn sync_carries_surviving_state_by_id() {
        let mut layout = engine();
        layout.sync(["a", "b", "c"]);
        layout.step(&[]);
        let b_position = layout.position("b").unwrap();
        let b_velocity = layout.velocity("b").unwrap();

        layout.sync(["c", "b", "d"]);
        assert_eq!(layout.ids(), ["c", "b", "d"]);
        assert_eq!(layout.index_of("b"), Some(1));
        assert_eq!(layout.position("b"), Some(b_position));
        assert_eq!(layout.velocity("b"), Some(b_velocity));
        assert_eq!(layout.position("a"), None);
    }

    #[test]
    fn duplicate_ids_in_sync_are_collapsed() {
        let mut layout = engine();
        layout.sync(["a", "a", "b"]);
        assert_eq!(layout.len(), 2);
    }

    #[test]
    fn gravity_pulls_a_lone_node_toward_the_origin() {
        let mut layout = engine();
        layout.sync(["solo"]);
        layout.place("solo", Vec3::new(100.0, 0.0, 0.0), Vec3::ZERO);
        layout.step(&[]);
        assert!(layout.position("solo").unwrap().x < 100.0);
    }

    #[test]
    fn coincident_nodes_separate_without_nan() {
        let mut layout = engine();
        layout.sync(["a", "b"]);
        layout.place("a", Vec3::ZERO, Vec3::ZERO);
        layout.place("b", Vec3::ZERO, Vec3::ZERO);
        layout.step(&[]);
        let a = layout.position("a").unwrap();
        let b = layout.position("b").unwrap();
        assert!(a.is_finite() && b.is_finite());
        assert!(a.distance(b) > 0.0);
    }

    #[test]
    fn spring_forces_are_equal_and_opposite() {
        let mut layout = LayoutEngine::new(
            PhysicsConfig {
                gravity: 0.0,
                repulsion: 0.0,
                ..PhysicsConfig::default()
            },
            3,
        );
        layout.sync(["a", "b"]);
        layout.place("a", Vec3::new(-100.0, 0.0, 0.0), Vec3::ZERO);
        layout.place("b", Vec3::new(100.0, 0.0, 0.0), Vec3::ZERO);
        layout.step(&[Spring {
            a: 0,
            b: 1,
            rest_length: 50.0,
        }]);
        let va = layout.velocity("a").unwrap();
        let vb = layout.velocity("b").unwrap();
        assert!(va.x > 0.0);
        assert!((va + vb).length() < 1e-5);
    }

    #[test]
    fn empty_arena_steps_quietly() {
        let mut layout = engine();
        layout.step(&[]);
        assert_eq!(layout.kinetic_energy(), 0.0);
    }
}
