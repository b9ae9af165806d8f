//! Particle simulation
//!
//! Everything that moves particles lives here:
//! - Fixed timestep supplied by the caller
//! - Seeded RNG only (resolve-order coin flip, scene spawning)
//! - Particles addressed by stable index into one arena
//! - No rendering or platform dependencies

pub mod engine;
pub mod grid;
pub mod particle;
pub mod spawn;

pub use engine::{
    CollisionStats, CollisionStrategy, EngineConfig, ResolveOrder, StepStats, VerletEngine,
    lock_pair,
};
pub use grid::{GridHasher, SpatialGrid};
pub use particle::{Particle, WallContact};
pub use spawn::{default_anchor_positions, fill_grid, fixed_anchors};
