//! Physics engine seam
//!
//! The simulation talks to rigid body physics only through [`PhysicsWorld`].
//! [`World`] implements it on rapier2d: gravity, circles, static rectangles,
//! pinned compounds made of axis-aligned parts.

pub mod world;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use world::World;

/// Stable handle to a body owned by the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// Handle to a fixed-point constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstraintHandle(pub u32);

/// Surface and mass properties of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Mass per unit area
    pub density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Fraction of velocity lost per 1/60 s to drag
    pub air_friction: f32,
    /// Bounciness (0 = none, 1 = elastic)
    pub restitution: f32,
}

impl Material {
    pub fn droplet() -> Self {
        use crate::consts::*;
        Self {
            density: DROPLET_DENSITY,
            friction: DROPLET_FRICTION,
            air_friction: DROPLET_AIR_FRICTION,
            restitution: DROPLET_RESTITUTION,
        }
    }

    pub fn wall() -> Self {
        use crate::consts::*;
        Self {
            density: 1.0,
            friction: WALL_FRICTION,
            air_friction: 0.0,
            restitution: WALL_RESTITUTION,
        }
    }
}

/// Axis-aligned rectangle in a body's local frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectPart {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl RectPart {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self {
            center,
            half_extents: size * 0.5,
        }
    }
}

/// What the simulation needs from a rigid body engine.
///
/// Getters return `None` for bodies that were removed. Setters report
/// [`SimError::StaleReference`](crate::SimError::StaleReference) for removed
/// bodies and [`SimError::InvalidGeometry`](crate::SimError::InvalidGeometry)
/// for non-finite input, leaving the world untouched in both cases.
pub trait PhysicsWorld {
    /// Dynamic circle
    fn add_circle(&mut self, pos: Vec2, radius: f32, material: Material) -> Result<BodyHandle>;

    /// Immovable rectangle centered at `center`
    fn add_static_rect(&mut self, center: Vec2, size: Vec2, material: Material)
    -> Result<BodyHandle>;

    /// One rigid body fused from `parts` (local frame), placed at `pos`
    fn add_compound(
        &mut self,
        parts: Vec<RectPart>,
        pos: Vec2,
        mass: f32,
        material: Material,
    ) -> Result<BodyHandle>;

    /// Pin the body's origin to a world point with no slack
    fn add_pin(&mut self, body: BodyHandle, anchor: Vec2) -> Result<ConstraintHandle>;

    /// Remove a body and any constraint attached to it; false if already gone
    fn remove_body(&mut self, body: BodyHandle) -> bool;

    fn contains(&self, body: BodyHandle) -> bool;

    fn position(&self, body: BodyHandle) -> Option<Vec2>;
    fn velocity(&self, body: BodyHandle) -> Option<Vec2>;
    fn angle(&self, body: BodyHandle) -> Option<f32>;
    fn angular_velocity(&self, body: BodyHandle) -> Option<f32>;

    fn set_position(&mut self, body: BodyHandle, pos: Vec2) -> Result<()>;
    fn set_velocity(&mut self, body: BodyHandle, vel: Vec2) -> Result<()>;
    fn set_angle(&mut self, body: BodyHandle, angle: f32) -> Result<()>;
    fn set_angular_velocity(&mut self, body: BodyHandle, angular_vel: f32) -> Result<()>;

    /// Force applied over the next step
    fn apply_force(&mut self, body: BodyHandle, force: Vec2) -> Result<()>;

    /// Topmost body whose shape contains `point`
    fn query_point(&self, point: Vec2) -> Option<BodyHandle>;

    /// Advance by `dt` seconds
    fn step(&mut self, dt: f32);
}
