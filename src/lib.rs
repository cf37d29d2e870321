//! Water Maze - steer falling droplets through a rotatable maze onto a scale
//!
//! Core modules:
//! - `sim`: Simulation (maze generation, maze body, droplets, rotation sync, scale, stages)
//! - `physics`: Physics engine seam plus a small in-crate rigid body world
//! - `settings`: Data-driven play area and stage configuration
//! - `highscores`: In-memory top-5 ranking

pub mod error;
pub mod highscores;
pub mod physics;
pub mod settings;
pub mod sim;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use error::{Result, SimError};
pub use highscores::HighScores;
pub use settings::{Settings, StageConfig};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one physics step per frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame the runner will try to catch up on
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Maze grid bounds (each axis, after forcing odd)
    pub const MIN_MAZE_SIZE: usize = 3;
    pub const MAX_MAZE_SIZE: usize = 101;

    /// Mass given to the maze compound so droplet impacts cannot move it
    pub const MAZE_MASS: f32 = 1.0e8;

    /// Default droplet material
    pub const DROPLET_DENSITY: f32 = 0.08;
    pub const DROPLET_FRICTION: f32 = 0.2;
    pub const DROPLET_AIR_FRICTION: f32 = 0.01;
    pub const DROPLET_RESTITUTION: f32 = 0.3;

    /// Wall material (maze and scale)
    pub const WALL_FRICTION: f32 = 0.8;
    pub const WALL_RESTITUTION: f32 = 0.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid can round up to TAU itself
    if wrapped >= PI { wrapped - TAU } else { wrapped }
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Angle of `point` as seen from `origin`
#[inline]
pub fn angle_from(origin: Vec2, point: Vec2) -> f32 {
    let d = point - origin;
    d.y.atan2(d.x)
}
