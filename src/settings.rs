//! Sandbox settings
//!
//! Loaded from a JSON file by the driver. Every field has a default, so a
//! settings file only needs the values it wants to change.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Error, Result};
use crate::features::FeatureFlags;
use crate::sim::EngineConfig;

/// Sandbox settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === World ===
    /// Box width in pixels
    pub width: f32,
    /// Box height in pixels (y grows downward)
    pub height: f32,
    pub gravity: Vec2,
    pub wind: Vec2,

    // === Spawning ===
    pub particle_radius: f32,
    /// Chance each lattice slot gets a particle
    pub spawn_probability: f32,
    /// Upper bound on spawned particles
    pub spawn_limit: usize,
    /// Place two fixed anchors at mid-height
    pub fixed_anchors: bool,

    // === Engine ===
    /// `None` = one worker per logical CPU
    pub worker_threads: Option<usize>,
    pub seed: u64,
    pub features: FeatureFlags,

    // === Run ===
    /// Fixed timestep in seconds
    pub dt: f32,
    /// Steps the driver runs before exiting
    pub steps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            gravity: GRAVITY,
            wind: WIND_FORCE,

            particle_radius: PARTICLE_RADIUS,
            spawn_probability: SPAWN_PROBABILITY,
            spawn_limit: SPAWN_LIMIT,
            fixed_anchors: true,

            worker_threads: None,
            seed: DEFAULT_SEED,
            features: FeatureFlags::default(),

            dt: SIM_DT,
            steps: PREFERRED_FPS * 10,
        }
    }
}

impl Settings {
    /// Parse and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// `load`, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Could not load {}: {e}; using default settings", path.display());
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(Error::InvalidParam(msg)) };

        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return invalid(format!(
                "world must have positive size, got {}x{}",
                self.width, self.height
            ));
        }
        if !self.particle_radius.is_finite() || self.particle_radius <= 0.0 {
            return invalid(format!("particle_radius must be > 0, got {}", self.particle_radius));
        }
        if !(0.0..=1.0).contains(&self.spawn_probability) {
            return invalid(format!(
                "spawn_probability must be in [0, 1], got {}",
                self.spawn_probability
            ));
        }
        if self.worker_threads == Some(0) {
            return invalid("worker_threads must be at least 1".into());
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return invalid(format!("dt must be > 0, got {}", self.dt));
        }
        if !(self.gravity.is_finite() && self.wind.is_finite()) {
            return invalid("gravity and wind must be finite".into());
        }
        Ok(())
    }

    /// Engine configuration for these settings
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            gravity: self.gravity,
            wind: self.wind,
            features: self.features,
            seed: self.seed,
            worker_threads: self.worker_threads,
        }
    }
}
