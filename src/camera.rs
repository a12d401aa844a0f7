use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Radians of rotation per pixel of drag.
    pub rotate_sensitivity: f32,
    /// Fraction of the remaining angle covered each frame, in `(0, 1]`.
    /// `1.0` applies drag input immediately.
    pub smoothing: f32,
    /// Radians added to the yaw target each idle frame.
    pub auto_rotate_speed: f32,
    pub auto_rotate: bool,
    pub pitch_limit: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_default: f32,
    pub zoom_sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rotate_sensitivity: 0.005,
            smoothing: 0.15,
            auto_rotate_speed: 0.0015,
            auto_rotate: true,
            pitch_limit: std::f32::consts::FRAC_PI_2 - 0.05,
            zoom_min: 150.0,
            zoom_max: 2400.0,
            zoom_default: 700.0,
            zoom_sensitivity: 0.8,
        }
    }
}

/// Orbit camera around the world origin. `zoom` is the eye distance.
#[derive(Clone, Debug)]
pub struct Camera {
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
    target_yaw: f32,
    target_pitch: f32,
    config: CameraConfig,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        let zoom = config.zoom_default.clamp(config.zoom_min, config.zoom_max);
        Self {
            yaw: 0.0,
            pitch: 0.0,
            zoom,
            target_yaw: 0.0,
            target_pitch: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.config.auto_rotate = enabled;
    }

    pub fn targets(&self) -> (f32, f32) {
        (self.target_yaw, self.target_pitch)
    }

    /// Moves the rotation targets by a screen-space drag delta.
    pub fn drag(&mut self, delta: Vec2) {
        self.target_yaw += delta.x * self.config.rotate_sensitivity;
        self.target_pitch = (self.target_pitch + delta.y * self.config.rotate_sensitivity)
            .clamp(-self.config.pitch_limit, self.config.pitch_limit);
    }

    pub fn zoom_by(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        self.zoom = (self.zoom + delta * self.config.zoom_sensitivity)
            .clamp(self.config.zoom_min, self.config.zoom_max);
    }

    /// Snaps both angles, targets included.
    pub fn look(&mut self, yaw: f32, pitch: f32) {
        let pitch = pitch.clamp(-self.config.pitch_limit, self.config.pitch_limit);
        self.yaw = yaw;
        self.pitch = pitch;
        self.target_yaw = yaw;
        self.target_pitch = pitch;
    }

    /// Per-frame update: ambient rotation while idle, then smoothing toward
    /// the targets.
    pub fn advance(&mut self, dragging: bool) {
        if self.config.auto_rotate && !dragging {
            self.target_yaw += self.config.auto_rotate_speed;
        }

        let smoothing = self.config.smoothing.clamp(f32::EPSILON, 1.0);
        self.yaw += (self.target_yaw - self.yaw) * smoothing;
        self.pitch += (self.target_pitch - self.pitch) * smoothing;
    }

    /// Rotates a world position into camera space: yaw about Y, then pitch
    /// about X.
    pub fn rotate(&self, world: Vec3) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();

        let x = world.x * cos_yaw - world.z * sin_yaw;
        let z = world.x * sin_yaw + world.z * cos_yaw;
        let y = world.y * cos_pitch - z * sin_pitch;
        let z = world.y * sin_pitch + z * cos_pitch;
        Vec3::new(x, y, z)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}
