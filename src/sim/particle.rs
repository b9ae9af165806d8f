//! Verlet point-mass
//!
//! Velocity is never stored: it is the difference between the current and the
//! previous position. Fixed particles never move but still push others away.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Error, Result};

/// Boundary sides a particle was pushed back from during `confine`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallContact {
    /// Left or right wall
    pub horizontal: bool,
    /// Top or bottom wall
    pub vertical: bool,
    /// Bottom wall specifically (y grows downward)
    pub floor: bool,
}

impl WallContact {
    pub fn any(&self) -> bool {
        self.horizontal || self.vertical
    }
}

/// A simulated circle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParticleState")]
pub struct Particle {
    position: Vec2,
    previous_position: Vec2,
    pending_force: Vec2,
    radius: f32,
    fixed: bool,
    /// Only meaningful with thermal simulation on
    temperature: f32,
    color: [u8; 4],
}

impl Particle {
    /// Create a particle at rest.
    ///
    /// Errors if the position is not finite or the radius is not a positive
    /// finite number.
    pub fn new(position: Vec2, radius: f32, fixed: bool) -> Result<Self> {
        let particle = Self {
            position,
            previous_position: position,
            pending_force: Vec2::ZERO,
            radius,
            fixed,
            temperature: 0.0,
            color: if fixed { FIXED_COLOR } else { MOVABLE_COLOR },
        };
        particle.validate()?;
        Ok(particle)
    }

    /// Check the radius is positive and finite and every vector is finite
    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(Error::InvalidParam(format!(
                "radius must be finite and > 0, got {}",
                self.radius
            )));
        }
        if !(self.position.is_finite()
            && self.previous_position.is_finite()
            && self.pending_force.is_finite())
        {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        Ok(())
    }

    /// Builder-style color override
    #[must_use]
    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    /// Advance one Verlet step, consuming the pending force.
    pub fn update(&mut self, dt: f32, thermal: bool) {
        if self.fixed {
            return;
        }
        let velocity = self.position - self.previous_position;
        self.previous_position = self.position;
        self.position += velocity + self.pending_force * dt * dt;
        self.pending_force = Vec2::ZERO;

        if thermal {
            self.decrement_temperature(self.temperature * HEAT_LOSS_RATE);
        }
    }

    /// Accumulate a force for the next `update`. Ignored on fixed particles.
    #[inline]
    pub fn apply_force(&mut self, force: Vec2) {
        if !self.fixed {
            self.pending_force += force;
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Teleport; the particle comes to rest at `position`
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.previous_position = position;
    }

    /// Teleport while keeping the current velocity
    pub fn set_position_keep_velocity(&mut self, position: Vec2) {
        let velocity = self.velocity();
        self.set_position(position);
        self.set_velocity(velocity);
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.position - self.previous_position
    }

    /// Rewrites the previous position so that `velocity()` returns `velocity`
    #[inline]
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.previous_position = self.position - velocity;
    }

    #[inline]
    pub fn pending_force(&self) -> Vec2 {
        self.pending_force
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn make_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
        if fixed {
            self.previous_position = self.position;
            self.pending_force = Vec2::ZERO;
        }
    }

    #[inline]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature.clamp(0.0, MAX_TEMPERATURE);
    }

    pub fn increment_temperature(&mut self, amount: f32) {
        self.temperature = (self.temperature + amount).min(MAX_TEMPERATURE);
    }

    /// Floor-clamped at zero
    pub fn decrement_temperature(&mut self, amount: f32) {
        self.temperature = (self.temperature - amount).max(0.0);
    }

    #[inline]
    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    /// Squared speed per step (unit mass)
    #[inline]
    pub fn kinetic_energy(&self) -> f32 {
        self.velocity().length_squared()
    }

    /// Clamp the circle inside `[0, width] x [0, height]`, reflecting and
    /// damping the velocity component of every corrected axis.
    pub fn confine(&mut self, width: f32, height: f32) -> WallContact {
        let mut contact = WallContact::default();
        if self.fixed {
            return contact;
        }

        let mut position = self.position;
        let r = self.radius;
        if position.x - r < 0.0 {
            position.x = r;
            contact.horizontal = true;
        }
        if position.x + r > width {
            position.x = width - r;
            contact.horizontal = true;
        }
        if position.y - r < 0.0 {
            position.y = r;
            contact.vertical = true;
        }
        if position.y + r > height {
            position.y = height - r;
            contact.vertical = true;
            contact.floor = true;
        }

        if !contact.any() {
            return contact;
        }

        let mut velocity = self.velocity();
        if contact.horizontal {
            velocity.x *= -DAMPENING;
        }
        if contact.vertical {
            velocity.y *= -DAMPENING;
        }
        self.set_position(position);
        self.set_velocity(velocity);
        contact
    }

    /// True when the circles overlap by at least `CONTACT_EPSILON` and at
    /// least one of them can move.
    pub fn check_collision(first: &Particle, second: &Particle) -> bool {
        if first.fixed && second.fixed {
            return false;
        }
        let distance = first.position.distance(second.position);
        (first.radius + second.radius) - distance >= CONTACT_EPSILON
    }

    /// Push two overlapping particles apart along their center line.
    ///
    /// The movable side takes the whole correction when the other is fixed;
    /// otherwise each moves half. Returns false when nothing was done
    /// (coincident centers or overlap below `CONTACT_EPSILON`).
    pub fn resolve_collision(first: &mut Particle, second: &mut Particle, thermal: bool) -> bool {
        let delta = second.position - first.position;
        let distance = delta.length();
        if distance == 0.0 {
            // No defined normal
            return false;
        }

        let overlap = (first.radius + second.radius) - distance;
        if overlap < CONTACT_EPSILON {
            return false;
        }

        let normal = delta / distance;
        let share = if first.fixed || second.fixed {
            overlap
        } else {
            overlap * 0.5
        };
        let correction = normal * share;

        if !first.fixed {
            first.position -= correction;
            let velocity = first.velocity();
            first.set_velocity(velocity * DAMPENING);
        }
        if !second.fixed {
            second.position += correction;
            let velocity = second.velocity();
            second.set_velocity(velocity * DAMPENING);
        }

        if thermal {
            exchange_heat(first, second);
        }
        true
    }
}

/// Unchecked serialized form; turned into a `Particle` through `validate`
#[derive(Deserialize)]
struct ParticleState {
    position: Vec2,
    previous_position: Vec2,
    pending_force: Vec2,
    radius: f32,
    fixed: bool,
    temperature: f32,
    color: [u8; 4],
}

impl TryFrom<ParticleState> for Particle {
    type Error = Error;

    fn try_from(state: ParticleState) -> Result<Self> {
        let mut particle = Self {
            position: state.position,
            previous_position: state.previous_position,
            pending_force: state.pending_force,
            radius: state.radius,
            fixed: state.fixed,
            temperature: 0.0,
            color: state.color,
        };
        particle.validate()?;
        particle.set_temperature(state.temperature);
        Ok(particle)
    }
}

/// Move heat from the hotter particle to the cooler one
fn exchange_heat(first: &mut Particle, second: &mut Particle) {
    let difference = first.temperature - second.temperature;
    if difference.abs() <= CONTACT_EPSILON {
        return;
    }
    let (hot, cold) = if difference > 0.0 {
        (first, second)
    } else {
        (second, first)
    };
    let change = difference.abs() * 0.5 * HEAT_DIFFUSION_RATE;
    hot.decrement_temperature(change);
    cold.increment_temperature(change);
}
