//! Scene population helpers

use glam::Vec2;
use rand::Rng;

use super::engine::VerletEngine;
use crate::error::{Error, Result};

/// Fill the box row by row, top to bottom, on a lattice one diameter apart.
///
/// Each lattice slot is skipped with probability `1 - probability`, and
/// spawning stops after `limit` particles. Returns how many were added.
pub fn fill_grid<R: Rng>(
    engine: &mut VerletEngine,
    rng: &mut R,
    width: f32,
    height: f32,
    radius: f32,
    probability: f32,
    limit: usize,
) -> Result<usize> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(Error::InvalidParam(format!(
            "spawn probability must be in [0, 1], got {probability}"
        )));
    }
    if !radius.is_finite() || radius <= 0.0 {
        return Err(Error::InvalidParam(format!(
            "radius must be finite and > 0, got {radius}"
        )));
    }

    let diameter = radius * 2.0;
    let columns = (width / diameter).floor().max(0.0) as usize;
    let rows = (height / diameter).floor().max(0.0) as usize;
    engine.reserve(limit.min(rows * columns));

    let mut spawned = 0;
    'rows: for row in 0..rows {
        for column in 0..columns {
            if spawned >= limit {
                break 'rows;
            }
            if rng.random::<f32>() >= probability {
                continue;
            }
            let position = Vec2::new(
                column as f32 * diameter + radius,
                row as f32 * diameter + radius,
            );
            engine.add_particle(position, radius)?;
            spawned += 1;
        }
    }

    log::info!("Spawned {spawned} particles ({columns}x{rows} lattice)");
    Ok(spawned)
}

/// Add a fixed particle at each position; returns their indices
pub fn fixed_anchors(
    engine: &mut VerletEngine,
    positions: &[Vec2],
    radius: f32,
) -> Result<Vec<usize>> {
    positions
        .iter()
        .map(|&position| engine.add_fixed_particle(position, radius))
        .collect()
}

/// Two anchors at mid-height, a quarter in from each side
pub fn default_anchor_positions(width: f32, height: f32) -> [Vec2; 2] {
    [
        Vec2::new(width / 4.0, height / 2.0),
        Vec2::new(width * 3.0 / 4.0, height / 2.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureFlags;
    use crate::sim::engine::EngineConfig;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn engine() -> VerletEngine {
        VerletEngine::new(EngineConfig {
            worker_threads: Some(2),
            features: FeatureFlags::default(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_fill_grid_full_probability() {
        let mut engine = engine();
        let mut rng = Pcg32::seed_from_u64(1);
        let spawned = fill_grid(&mut engine, &mut rng, 100.0, 40.0, 5.0, 1.0, 1000).unwrap();
        // 10 columns x 4 rows
        assert_eq!(spawned, 40);
        assert_eq!(engine.len(), 40);
        assert_eq!(engine.particle(0).unwrap().position(), Vec2::new(5.0, 5.0));
        assert_eq!(engine.particle(10).unwrap().position(), Vec2::new(5.0, 15.0));
        for p in engine.snapshot() {
            assert!(p.position().x + p.radius() <= 100.0);
            assert!(p.position().y + p.radius() <= 40.0);
        }
    }

    #[test]
    fn test_fill_grid_respects_limit_and_probability() {
        let mut engine = engine();
        let mut rng = Pcg32::seed_from_u64(2);
        assert_eq!(fill_grid(&mut engine, &mut rng, 800.0, 600.0, 5.0, 1.0, 25).unwrap(), 25);

        let mut engine = self::engine();
        let spawned = fill_grid(&mut engine, &mut rng, 800.0, 600.0, 5.0, 0.4, 10_000).unwrap();
        // 4800 slots at 40%
        assert!(spawned > 1600 && spawned < 2200, "spawned {spawned}");

        let mut engine = self::engine();
        assert_eq!(fill_grid(&mut engine, &mut rng, 800.0, 600.0, 5.0, 0.0, 100).unwrap(), 0);
    }

    #[test]
    fn test_fill_grid_rejects_bad_input() {
        let mut engine = engine();
        let mut rng = Pcg32::seed_from_u64(3);
        assert!(fill_grid(&mut engine, &mut rng, 100.0, 100.0, 5.0, 1.5, 10).is_err());
        assert!(fill_grid(&mut engine, &mut rng, 100.0, 100.0, 0.0, 0.5, 10).is_err());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_fixed_anchors() {
        let mut engine = engine();
        let positions = default_anchor_positions(800.0, 600.0);
        assert_eq!(positions[0], Vec2::new(200.0, 300.0));
        assert_eq!(positions[1], Vec2::new(600.0, 300.0));

        let indices = fixed_anchors(&mut engine, &positions, 20.0).unwrap();
        assert_eq!(indices, vec![0, 1]);
        assert!(engine.particle(1).unwrap().is_fixed());
        assert_eq!(engine.max_radius(), 20.0);
    }
}
