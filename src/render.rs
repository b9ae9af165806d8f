//! Instance data for an external renderer
//!
//! The engine does not draw. It exposes one GPU-friendly instance per
//! particle and a hint telling the renderer which field to color by.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::consts::MAX_TEMPERATURE;
use crate::sim::Particle;

/// Per-particle draw data
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct RenderInstance {
    pub position: [f32; 2],
    pub radius: f32,
    pub temperature: f32,
    pub color: [u8; 4],
}

impl RenderInstance {
    pub fn from_particle(particle: &Particle) -> Self {
        Self {
            position: particle.position().to_array(),
            radius: particle.radius(),
            temperature: particle.temperature(),
            color: particle.color(),
        }
    }

    /// Temperature mapped to `[0, 1]`
    #[inline]
    pub fn heat(&self) -> f32 {
        (self.temperature / MAX_TEMPERATURE).clamp(0.0, 1.0)
    }
}

/// Which instance field the renderer should derive the fill color from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tint {
    /// `RenderInstance::color`
    Color,
    /// `RenderInstance::heat`, through the renderer's own palette
    Temperature,
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_instance_from_particle() {
        let mut p = Particle::new(Vec2::new(3.0, 4.0), 2.5, false).unwrap();
        p.set_temperature(MAX_TEMPERATURE / 4.0);
        let instance = RenderInstance::from_particle(&p);
        assert_eq!(instance.position, [3.0, 4.0]);
        assert_eq!(instance.radius, 2.5);
        assert_eq!(instance.color, p.color());
        assert!((instance.heat() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_instances_cast_to_bytes() {
        let p = Particle::new(Vec2::ZERO, 1.0, true).unwrap();
        let instances = [RenderInstance::from_particle(&p); 3];
        let bytes: &[u8] = bytemuck::cast_slice(&instances);
        assert_eq!(bytes.len(), 3 * std::mem::size_of::<RenderInstance>());
        assert_eq!(std::mem::size_of::<RenderInstance>(), 20);
    }
}
