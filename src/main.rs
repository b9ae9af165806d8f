//! Verlet Sandbox entry point
//!
//! Headless driver: loads settings, spawns the default scene and runs a fixed
//! number of steps, logging a summary at the end.
//!
//! Usage: `verlet-sandbox [settings.json]`

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_pcg::Pcg32;

use verlet_sandbox::sim::{default_anchor_positions, fill_grid, fixed_anchors};
use verlet_sandbox::{Feature, Settings, VerletEngine};

fn main() {
    env_logger::init();
    log::info!("Verlet Sandbox starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> verlet_sandbox::Result<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => {
            log::info!("No settings file given, using defaults");
            Settings::default()
        }
    };

    let mut engine = VerletEngine::new(settings.engine_config())?;
    // Scene RNG is separate from the engine's coin flip
    let mut rng = Pcg32::seed_from_u64(settings.seed.wrapping_add(1));

    if settings.fixed_anchors {
        let anchors = default_anchor_positions(settings.width, settings.height);
        fixed_anchors(&mut engine, &anchors, settings.particle_radius * 4.0)?;
    }
    fill_grid(
        &mut engine,
        &mut rng,
        settings.width,
        settings.height,
        settings.particle_radius,
        settings.spawn_probability,
        settings.spawn_limit,
    )?;

    let enabled: Vec<&str> = engine.features().iter().map(|f| f.as_str()).collect();
    log::info!(
        "Running {} steps of {:.4}s with {} particles on {} workers, features: {}",
        settings.steps,
        settings.dt,
        engine.len(),
        engine.pool().thread_count(),
        enabled.join(", ")
    );

    let mut total = Duration::ZERO;
    let mut resolved = 0;
    for step in 0..settings.steps {
        let start = Instant::now();
        let stats = engine.step(settings.dt, settings.width, settings.height)?;
        total += start.elapsed();
        resolved += stats.collisions.resolved;

        if engine.features().is_enabled(Feature::Logging) && step % 120 == 0 {
            log::info!(
                "step {step}: kinetic energy {:.4}",
                engine.kinetic_energy()
            );
        }
    }

    let mean = total / settings.steps.max(1);
    log::info!(
        "Done: {} particles, kinetic energy {:.4}, {} contacts resolved, mean step {:.3?}",
        engine.len(),
        engine.kinetic_energy(),
        resolved,
        mean
    );
    Ok(())
}
