//! Verlet Sandbox - a parallel point-mass simulation engine
//!
//! Core modules:
//! - `sim`: Particles, spatial grid, step orchestration, scene spawning
//! - `pool`: Fixed-size worker pool with blocking range dispatch
//! - `features`: Runtime feature toggles
//! - `render`: Per-particle instance data for an external renderer
//! - `settings`: JSON-backed configuration

#![forbid(unsafe_code)]

pub mod error;
pub mod features;
pub mod pool;
pub mod render;
pub mod settings;
pub mod sim;

pub use error::{Error, Result};
pub use features::{Feature, FeatureFlags};
pub use glam::Vec2;
pub use pool::WorkerPool;
pub use render::{RenderInstance, Tint};
pub use settings::Settings;
pub use sim::{EngineConfig, Particle, VerletEngine};

/// Simulation constants
pub mod consts {
    use glam::Vec2;

    /// Default box size
    pub const SCREEN_WIDTH: f32 = 800.0;
    pub const SCREEN_HEIGHT: f32 = 600.0;

    /// Target step rate
    pub const PREFERRED_FPS: u32 = 120;
    /// Fixed simulation timestep
    pub const SIM_DT: f32 = 1.0 / PREFERRED_FPS as f32;

    /// Downward acceleration (y grows downward)
    pub const GRAVITY: Vec2 = Vec2::new(0.0, 9.81);
    pub const WIND_FORCE: Vec2 = Vec2::ZERO;

    /// Spawn defaults
    pub const PARTICLE_RADIUS: f32 = 5.0;
    pub const SPAWN_PROBABILITY: f32 = 0.4;
    pub const SPAWN_LIMIT: usize = 2000;
    pub const DEFAULT_SEED: u64 = 0x5EED;

    /// Canonical contact tolerance: a pair collides only when
    /// `(r1 + r2) - distance >= CONTACT_EPSILON`, so overlaps thinner than
    /// this count as resting contact, not as a collision.
    pub const CONTACT_EPSILON: f32 = 1e-4;
    /// Velocity kept after a wall bounce or collision
    pub const DAMPENING: f32 = 0.98;

    /// Fraction of temperature lost per integration step
    pub const HEAT_LOSS_RATE: f32 = 0.01;
    /// Fraction of half the temperature gap moved per collision
    pub const HEAT_DIFFUSION_RATE: f32 = 0.5;
    /// Heat gained per step resting on the floor
    pub const FLOOR_HEAT: f32 = 2.0;
    pub const MAX_TEMPERATURE: f32 = 100.0;

    /// Default RGBA fills
    pub const MOVABLE_COLOR: [u8; 4] = [230, 41, 55, 255];
    pub const FIXED_COLOR: [u8; 4] = [130, 130, 130, 255];
}
