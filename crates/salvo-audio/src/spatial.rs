//! On/off-screen presentation.
//!
//! A simple linear approximation: emitters inside the viewport use the
//! on-screen preset at center pan; emitters outside it fall off linearly with
//! distance and pan toward their side, never reaching a hard pan.

use glam::Vec2;

use crate::config::SchedulerConfig;

/// Reference listener, usually the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    /// Listener position in world units.
    pub position: Vec2,
    /// Half-extent of the visible viewport.
    pub half_view: Vec2,
    /// World width, used to scale falloff and pan.
    pub world_width: f32,
}

impl Default for Listener {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl Listener {
    /// Listener at the origin with viewport and world sizes from config.
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            position: Vec2::ZERO,
            half_view: Vec2::new(config.view_half_width, config.view_half_height),
            world_width: config.world_width,
        }
    }

    /// Move the listener.
    #[must_use]
    pub const fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Whether a world position is inside the viewport.
    #[must_use]
    pub fn is_on_screen(&self, point: Vec2) -> bool {
        let delta = (point - self.position).abs();
        delta.x <= self.half_view.x && delta.y <= self.half_view.y
    }

    /// Linear falloff in [0, 1]: 1 at the listener, 0 one world width away.
    #[must_use]
    pub fn falloff(&self, point: Vec2) -> f32 {
        if self.world_width <= 0.0 {
            return 1.0;
        }
        (1.0 - point.distance(self.position) / self.world_width).clamp(0.0, 1.0)
    }

    /// Signed pan in [-max_pan, max_pan] from horizontal offset relative to
    /// half the world width.
    #[must_use]
    pub fn pan(&self, point: Vec2, max_pan: f32) -> f32 {
        let half_world = self.world_width * 0.5;
        if half_world <= 0.0 {
            return 0.0;
        }
        ((point.x - self.position.x) / half_world).clamp(-1.0, 1.0) * max_pan
    }

    /// Volume and pan for a sound with the given presets.
    #[must_use]
    pub fn present(
        &self,
        target: Option<Vec2>,
        on_screen_volume: f32,
        off_screen_volume: f32,
        max_pan: f32,
    ) -> Presentation {
        match target {
            Some(point) if !self.is_on_screen(point) => {
                let volume = (on_screen_volume * self.falloff(point)).max(off_screen_volume);
                Presentation {
                    volume,
                    pan: self.pan(point, max_pan),
                    on_screen: false,
                }
            },
            _ => Presentation {
                volume: on_screen_volume,
                pan: 0.0,
                on_screen: true,
            },
        }
    }
}

/// Computed volume and pan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presentation {
    /// Volume (0.0-1.0).
    pub volume: f32,
    /// Pan (-1.0-1.0).
    pub pan: f32,
    /// Whether the on-screen preset was used.
    pub on_screen: bool,
}
