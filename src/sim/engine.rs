//! Step orchestration
//!
//! Each step runs four phases in a fixed order, every one of them finishing
//! (dispatch barrier) before the next starts:
//! 1. global forces (parallel, disjoint writes)
//! 2. Verlet integration (parallel, disjoint writes)
//! 3. boundary constraints (parallel, disjoint writes)
//! 4. collisions: exhaustive (sequential) or spatial hash (parallel,
//!    pairwise-locked)
//!
//! Particles live in one `Vec<Mutex<Particle>>`, addressed by index. The
//! vector only reallocates through `&mut self`, which proves no lock is held.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec2;
use parking_lot::{Mutex, MutexGuard};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::grid::{GridHasher, SpatialGrid};
use super::particle::Particle;
use crate::consts::*;
use crate::error::Result;
use crate::features::{Feature, FeatureFlags};
use crate::pool::WorkerPool;
use crate::render::{RenderInstance, Tint};

/// Construction-time engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Global force applied every step
    pub gravity: Vec2,
    /// Second global force, summed with gravity
    pub wind: Vec2,
    pub features: FeatureFlags,
    /// Seed for the per-step resolve-order coin flip
    pub seed: u64,
    /// `None` = one worker per logical CPU
    pub worker_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            wind: WIND_FORCE,
            features: FeatureFlags::default(),
            seed: DEFAULT_SEED,
            worker_threads: None,
        }
    }
}

/// Narrow-phase strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionStrategy {
    /// Every pair, sequentially. O(n²) reference path.
    Exhaustive,
    /// Grid broad phase, candidate pairs resolved on the pool
    SpatialHash,
}

/// Direction pairs are walked in during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveOrder {
    Forward,
    Backward,
}

impl ResolveOrder {
    /// Fair coin
    pub fn coin_flip<R: Rng>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            ResolveOrder::Forward
        } else {
            ResolveOrder::Backward
        }
    }
}

/// Outcome of one collision phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionStats {
    pub strategy: CollisionStrategy,
    pub order: ResolveOrder,
    /// Pairs inspected by the narrow phase
    pub candidate_pairs: usize,
    /// Pairs actually pushed apart
    pub resolved: usize,
}

/// Outcome of one full step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStats {
    pub particles: usize,
    pub collisions: CollisionStats,
}

/// Lock two particles in ascending index order.
///
/// Guards come back in argument order. Returns `None` for `a == b` or an
/// out-of-range index. Every code path that needs two particle locks goes
/// through here, so no two workers can wait on each other in a cycle.
pub fn lock_pair(
    particles: &[Mutex<Particle>],
    a: usize,
    b: usize,
) -> Option<(MutexGuard<'_, Particle>, MutexGuard<'_, Particle>)> {
    if a == b {
        return None;
    }
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    let low_guard = particles.get(low)?.lock();
    let high_guard = particles.get(high)?.lock();
    Some(if a < b {
        (low_guard, high_guard)
    } else {
        (high_guard, low_guard)
    })
}

/// Exclusive access to two distinct particles; `i < j`
fn pair_mut(particles: &mut [Mutex<Particle>], i: usize, j: usize) -> (&mut Particle, &mut Particle) {
    debug_assert!(i < j);
    let (head, tail) = particles.split_at_mut(j);
    (head[i].get_mut(), tail[0].get_mut())
}

/// Owns the particles and the worker pool that steps them
pub struct VerletEngine {
    particles: Vec<Mutex<Particle>>,
    max_radius: f32,
    config: EngineConfig,
    rng: Pcg32,
    pool: WorkerPool,
    grid: SpatialGrid,
    pairs: Vec<(usize, usize)>,
}

impl VerletEngine {
    /// Create an engine with its own worker pool
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = match config.worker_threads {
            Some(threads) => WorkerPool::new(threads)?,
            None => WorkerPool::with_available_parallelism()?,
        };
        Ok(Self::with_pool(config, pool))
    }

    /// Create an engine around an existing pool
    pub fn with_pool(config: EngineConfig, pool: WorkerPool) -> Self {
        Self {
            particles: Vec::new(),
            max_radius: 0.0,
            rng: Pcg32::seed_from_u64(config.seed),
            config,
            pool,
            grid: SpatialGrid::new(),
            pairs: Vec::new(),
        }
    }

    pub fn features(&self) -> FeatureFlags {
        self.config.features
    }

    pub fn features_mut(&mut self) -> &mut FeatureFlags {
        &mut self.config.features
    }

    pub fn set_features(&mut self, features: FeatureFlags) {
        self.config.features = features;
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    pub fn wind(&self) -> Vec2 {
        self.config.wind
    }

    pub fn set_wind(&mut self, wind: Vec2) {
        self.config.wind = wind;
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Make room for `additional` more particles, growing by at least 1.5x
    pub fn reserve(&mut self, additional: usize) {
        let required = self.particles.len() + additional;
        let capacity = self.particles.capacity();
        if required > capacity {
            let target = (required + 1).max(capacity * 3 / 2);
            self.particles.reserve_exact(target - self.particles.len());
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.capacity()
    }

    /// Append a movable particle; returns its index
    pub fn add_particle(&mut self, position: Vec2, radius: f32) -> Result<usize> {
        self.add_particle_with(Particle::new(position, radius, false)?)
    }

    /// Append a fixed particle; returns its index
    pub fn add_fixed_particle(&mut self, position: Vec2, radius: f32) -> Result<usize> {
        self.add_particle_with(Particle::new(position, radius, true)?)
    }

    /// Append a fully built particle; returns its index.
    ///
    /// Rejects a particle whose radius or positions are invalid.
    pub fn add_particle_with(&mut self, particle: Particle) -> Result<usize> {
        particle.validate()?;
        if self.particles.len() == self.particles.capacity() {
            self.reserve(1);
        }
        self.max_radius = self.max_radius.max(particle.radius());
        self.particles.push(Mutex::new(particle));
        Ok(self.particles.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Largest radius ever inserted
    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    /// Copy of one particle
    pub fn particle(&self, index: usize) -> Option<Particle> {
        self.particles.get(index).map(|p| *p.lock())
    }

    /// Direct access between steps
    pub fn particle_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index).map(Mutex::get_mut)
    }

    /// Copy of every particle, in index order
    pub fn snapshot(&self) -> Vec<Particle> {
        self.particles.iter().map(|p| *p.lock()).collect()
    }

    /// Sum of squared per-step speeds
    pub fn kinetic_energy(&self) -> f32 {
        self.particles.iter().map(|p| p.lock().kinetic_energy()).sum()
    }

    /// Which instance field a renderer should color by
    pub fn render_tint(&self) -> Tint {
        if self.config.features.is_enabled(Feature::SimulateFire) {
            Tint::Temperature
        } else {
            Tint::Color
        }
    }

    /// Read-only view for rendering; call between steps
    pub fn instances(&self) -> impl Iterator<Item = RenderInstance> + '_ {
        self.particles
            .iter()
            .map(|p| RenderInstance::from_particle(&p.lock()))
    }

    /// Run one full step inside a `width` x `height` box
    pub fn step(&mut self, dt: f32, width: f32, height: f32) -> Result<StepStats> {
        let motion = self.config.features.is_enabled(Feature::Motion);

        // Forces only accumulate while something will consume them
        if motion && self.config.features.is_enabled(Feature::Gravity) {
            self.apply_gravity(self.config.gravity + self.config.wind)?;
        }
        if motion {
            self.integrate(dt)?;
        }
        self.apply_constraints(width, height)?;
        let collisions = self.resolve_collisions()?;

        let stats = StepStats {
            particles: self.particles.len(),
            collisions,
        };
        if self.config.features.is_enabled(Feature::Logging) {
            log::debug!(
                "step: {} particles, {:?}/{:?}, {} candidates, {} resolved",
                stats.particles,
                collisions.strategy,
                collisions.order,
                collisions.candidate_pairs,
                collisions.resolved
            );
        }
        Ok(stats)
    }

    /// Add `force` to every particle's pending force
    pub fn apply_gravity(&mut self, force: Vec2) -> Result<()> {
        self.pool.dispatch_mut(&mut self.particles, |_, chunk| {
            for particle in chunk {
                particle.get_mut().apply_force(force);
            }
        })
    }

    /// Verlet-step every particle
    pub fn integrate(&mut self, dt: f32) -> Result<()> {
        let thermal = self.config.features.is_enabled(Feature::SimulateFire);
        self.pool.dispatch_mut(&mut self.particles, |_, chunk| {
            for particle in chunk {
                particle.get_mut().update(dt, thermal);
            }
        })
    }

    /// Keep every movable circle inside `[0, width] x [0, height]`.
    ///
    /// With thermal simulation on, touching the floor heats the particle.
    pub fn apply_constraints(&mut self, width: f32, height: f32) -> Result<()> {
        let thermal = self.config.features.is_enabled(Feature::SimulateFire);
        self.pool.dispatch_mut(&mut self.particles, |_, chunk| {
            for particle in chunk {
                let particle = particle.get_mut();
                let contact = particle.confine(width, height);
                if thermal && contact.floor {
                    particle.increment_temperature(FLOOR_HEAT);
                }
            }
        })
    }

    /// Collision phase using the configured strategy and a fresh coin flip
    pub fn resolve_collisions(&mut self) -> Result<CollisionStats> {
        let strategy = if self.config.features.is_enabled(Feature::SpatialHash) {
            CollisionStrategy::SpatialHash
        } else {
            CollisionStrategy::Exhaustive
        };
        let order = ResolveOrder::coin_flip(&mut self.rng);
        self.resolve_collisions_with(strategy, order)
    }

    /// Collision phase with an explicit strategy and walk direction
    pub fn resolve_collisions_with(
        &mut self,
        strategy: CollisionStrategy,
        order: ResolveOrder,
    ) -> Result<CollisionStats> {
        let thermal = self.config.features.is_enabled(Feature::SimulateFire);
        let (candidate_pairs, resolved) = match strategy {
            CollisionStrategy::Exhaustive => self.resolve_exhaustive(order, thermal),
            CollisionStrategy::SpatialHash => self.resolve_spatial(order, thermal)?,
        };
        Ok(CollisionStats {
            strategy,
            order,
            candidate_pairs,
            resolved,
        })
    }

    /// Candidate pairs for the current positions, as the spatial path sees them
    pub fn candidate_pairs(&mut self) -> Vec<(usize, usize)> {
        self.build_grid();
        self.grid.candidate_pairs()
    }

    fn build_grid(&mut self) {
        let hasher = GridHasher::new(2.0 * self.max_radius);
        self.grid.build(
            &hasher,
            self.particles.iter_mut().map(|p| p.get_mut().position()),
        );
    }

    /// Pairs that pass the narrow-phase test under `strategy`, walked in
    /// `order` without resolving anything. Sorted ascending.
    pub fn contacts(
        &mut self,
        strategy: CollisionStrategy,
        order: ResolveOrder,
    ) -> Result<Vec<(usize, usize)>> {
        let mut contacts = match strategy {
            CollisionStrategy::Exhaustive => {
                let mut contacts = Vec::new();
                self.walk_exhaustive(order, |i, j, first, second| {
                    if Particle::check_collision(first, second) {
                        contacts.push((i, j));
                    }
                });
                contacts
            }
            CollisionStrategy::SpatialHash => {
                let contacts = Mutex::new(Vec::new());
                self.walk_spatial(order, |i, j, first, second| {
                    if Particle::check_collision(first, second) {
                        contacts.lock().push((i, j));
                    }
                })?;
                contacts.into_inner()
            }
        };
        contacts.sort_unstable();
        Ok(contacts)
    }

    fn resolve_exhaustive(&mut self, order: ResolveOrder, thermal: bool) -> (usize, usize) {
        let mut resolved = 0;
        let visited = self.walk_exhaustive(order, |_, _, first, second| {
            if Particle::check_collision(first, second)
                && Particle::resolve_collision(first, second, thermal)
            {
                resolved += 1;
            }
        });
        (visited, resolved)
    }

    fn resolve_spatial(&mut self, order: ResolveOrder, thermal: bool) -> Result<(usize, usize)> {
        let resolved = AtomicUsize::new(0);
        let visited = self.walk_spatial(order, |_, _, first, second| {
            if Particle::check_collision(first, second)
                && Particle::resolve_collision(first, second, thermal)
            {
                resolved.fetch_add(1, Ordering::Relaxed);
            }
        })?;
        Ok((visited, resolved.into_inner()))
    }

    /// Visit every pair `i < j` sequentially; returns the pair count
    fn walk_exhaustive<F>(&mut self, order: ResolveOrder, mut visit: F) -> usize
    where
        F: FnMut(usize, usize, &mut Particle, &mut Particle),
    {
        let n = self.particles.len();
        if n < 2 {
            return 0;
        }
        let particles = &mut self.particles;
        let mut visit_pair = |i: usize, j: usize| {
            let (first, second) = pair_mut(particles, i, j);
            visit(i, j, first, second);
        };

        match order {
            ResolveOrder::Forward => {
                for i in 0..n {
                    for j in (i + 1)..n {
                        visit_pair(i, j);
                    }
                }
            }
            ResolveOrder::Backward => {
                for i in (0..n).rev() {
                    for j in ((i + 1)..n).rev() {
                        visit_pair(i, j);
                    }
                }
            }
        }
        n * (n - 1) / 2
    }

    /// Visit every grid candidate pair on the pool, each under `lock_pair`;
    /// returns the candidate count
    fn walk_spatial<F>(&mut self, order: ResolveOrder, visit: F) -> Result<usize>
    where
        F: Fn(usize, usize, &mut Particle, &mut Particle) + Sync,
    {
        if self.particles.len() < 2 {
            return Ok(0);
        }
        self.build_grid();
        self.grid.collect_candidate_pairs(&mut self.pairs);

        let particles = &self.particles[..];
        let pairs = &self.pairs[..];
        let visit = &visit;
        self.pool.dispatch(pairs.len(), |range| {
            let visit_pair = |&(i, j): &(usize, usize)| {
                if let Some((mut first, mut second)) = lock_pair(particles, i, j) {
                    visit(i, j, &mut first, &mut second);
                }
            };
            match order {
                ResolveOrder::Forward => pairs[range].iter().for_each(visit_pair),
                ResolveOrder::Backward => pairs[range].iter().rev().for_each(visit_pair),
            }
        })?;
        Ok(pairs.len())
    }
}
