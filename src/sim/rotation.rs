//! Rotation lock/unlock state machine
//!
//! While the player drags the maze, droplets inside its footprint stop being
//! simulated and are replayed kinematically at a fixed offset in the maze's
//! local frame. Releasing the drag hands them back to gravity.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::MazeCompound;
use super::droplets::{DropletId, DropletPool, MazeLock};
use crate::physics::{BodyHandle, PhysicsWorld};
use crate::{angle_from, normalize_angle, rotate};

/// Drag gesture state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum RotationState {
    #[default]
    Idle,
    Rotating {
        /// Maze angle when the drag started
        base_angle: f32,
        /// Pointer angle around the anchor when the drag started
        base_pointer_angle: f32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RotationSync {
    state: RotationState,
}

impl RotationSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn is_rotating(&self) -> bool {
        matches!(self.state, RotationState::Rotating { .. })
    }

    /// Idle -> Rotating. Locks every free droplet inside the maze footprint
    /// and returns how many were locked. Ignored while already rotating.
    pub fn begin<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        maze: &MazeCompound,
        droplets: &mut DropletPool,
        pointer: Vec2,
    ) -> usize {
        if self.is_rotating() {
            return 0;
        }
        if !pointer.is_finite() {
            log::warn!("Rotation start ignored: invalid pointer {pointer:?}");
            return 0;
        }

        let angle = maze.angle(world);
        self.state = RotationState::Rotating {
            base_angle: angle,
            base_pointer_angle: angle_from(maze.anchor, pointer),
        };

        let mut locked = 0;
        for droplet in droplets.iter_mut() {
            if droplet.on_scale || droplet.is_locked() {
                continue;
            }
            let Some(pos) = world.position(droplet.body) else {
                continue;
            };
            if !pos.is_finite() || !maze.footprint_contains(world, pos) {
                continue;
            }
            let local_offset = rotate(pos - maze.anchor, -angle);
            if hold_still(world, droplet.body).is_err() {
                continue;
            }
            droplet.lock = MazeLock::Locked { local_offset };
            locked += 1;
        }

        log::debug!("Rotation started at {angle:.3} rad, {locked} droplets locked");
        locked
    }

    /// Pointer moved while rotating: turn the maze and replay locked
    /// droplets. Returns the new maze angle, or `None` when idle.
    pub fn drag_to<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        maze: &MazeCompound,
        droplets: &mut DropletPool,
        pointer: Vec2,
    ) -> Option<f32> {
        let RotationState::Rotating {
            base_angle,
            base_pointer_angle,
        } = self.state
        else {
            return None;
        };
        if !pointer.is_finite() {
            return None;
        }

        let delta = normalize_angle(angle_from(maze.anchor, pointer) - base_pointer_angle);
        let angle = normalize_angle(base_angle + delta);
        if let Err(e) = world.set_angle(maze.body, angle) {
            log::debug!("Maze rotation skipped: {e}");
            return None;
        }
        replay(world, maze.anchor, droplets, angle);
        Some(angle)
    }

    /// Per-tick resync so gravity never gets a step's worth of drift in
    pub fn sync<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
        maze: &MazeCompound,
        droplets: &mut DropletPool,
    ) {
        if self.is_rotating() {
            let angle = maze.angle(world);
            replay(world, maze.anchor, droplets, angle);
        }
    }

    /// Rotating -> Idle, also the forced flush on stage end.
    ///
    /// Unlocks every locked droplet regardless of how the gesture ended and
    /// returns the ids that were released. Calling it again is a no-op.
    pub fn release<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        droplets: &mut DropletPool,
    ) -> Vec<DropletId> {
        self.state = RotationState::Idle;

        let mut released = Vec::new();
        for droplet in droplets.iter_mut().filter(|d| d.is_locked()) {
            droplet.lock = MazeLock::Free;
            if droplet.on_scale {
                continue;
            }
            if let Err(e) = hold_still(world, droplet.body) {
                log::debug!("Droplet {:?} release skipped: {e}", droplet.id);
                continue;
            }
            released.push(droplet.id);
        }
        if !released.is_empty() {
            log::debug!("Rotation ended, {} droplets released", released.len());
        }
        released
    }
}

fn hold_still<W: PhysicsWorld + ?Sized>(world: &mut W, body: BodyHandle) -> crate::Result<()> {
    world.set_velocity(body, Vec2::ZERO)?;
    world.set_angular_velocity(body, 0.0)
}

/// Place every locked droplet at anchor + offset rotated by `angle`
fn replay<W: PhysicsWorld + ?Sized>(
    world: &mut W,
    anchor: Vec2,
    droplets: &DropletPool,
    angle: f32,
) {
    for droplet in droplets.iter().filter(|d| !d.on_scale) {
        let Some(offset) = droplet.local_offset() else {
            continue;
        };
        let target = anchor + rotate(offset, angle);
        let result = world
            .set_position(droplet.body, target)
            .and_then(|_| hold_still(world, droplet.body));
        if let Err(e) = result {
            log::debug!("Droplet {:?} replay skipped: {e}", droplet.id);
        }
    }
}
