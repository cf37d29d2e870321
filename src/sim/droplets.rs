//! Droplet bookkeeping
//!
//! The physics world owns each droplet's body; this side table owns the
//! gameplay flags (maze lock, scale capture) keyed by a stable id.

use glam::Vec2;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::body::MazeCompound;
use crate::error::{Result, SimError};
use crate::physics::{BodyHandle, Material, PhysicsWorld};

/// Stable droplet id (monotonic, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DropletId(pub u32);

/// Whether a droplet is following the maze's rotation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum MazeLock {
    #[default]
    Free,
    /// Kinematically following the maze at this offset in the maze's local frame
    Locked { local_offset: Vec2 },
}

/// A water droplet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Droplet {
    pub id: DropletId,
    pub body: BodyHandle,
    pub radius: f32,
    pub lock: MazeLock,
    /// Captured by the scale; never follows the maze again
    pub on_scale: bool,
    /// Already added to the scale's weight
    pub counted_on_weight: bool,
}

impl Droplet {
    pub fn is_locked(&self) -> bool {
        matches!(self.lock, MazeLock::Locked { .. })
    }

    pub fn local_offset(&self) -> Option<Vec2> {
        match self.lock {
            MazeLock::Locked { local_offset } => Some(local_offset),
            MazeLock::Free => None,
        }
    }
}

/// Visible play area plus the margin droplets may stray before being pruned
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayBounds {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PlayBounds {
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= -self.margin
            && p.x <= self.width + self.margin
            && p.y >= -self.margin
            && p.y <= self.height + self.margin
    }
}

/// All live droplets, sorted by id
#[derive(Debug, Clone)]
pub struct DropletPool {
    droplets: Vec<Droplet>,
    capacity: usize,
    next_id: u32,
}

impl DropletPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            droplets: Vec::new(),
            capacity,
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.droplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.droplets.is_empty()
    }

    /// Free slots before the cap is reached
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.droplets.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Droplet> {
        self.droplets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Droplet> {
        self.droplets.iter_mut()
    }

    pub fn get(&self, id: DropletId) -> Option<&Droplet> {
        self.droplets
            .binary_search_by_key(&id, |d| d.id)
            .ok()
            .map(|i| &self.droplets[i])
    }

    pub fn get_mut(&mut self, id: DropletId) -> Option<&mut Droplet> {
        match self.droplets.binary_search_by_key(&id, |d| d.id) {
            Ok(i) => Some(&mut self.droplets[i]),
            Err(_) => None,
        }
    }

    /// Add a droplet body at `position`.
    ///
    /// Rejected (never queued) when the cap is reached or the position is
    /// not finite.
    pub fn spawn<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        position: Vec2,
        radius: f32,
        material: Material,
    ) -> Result<DropletId> {
        if self.droplets.len() >= self.capacity {
            log::warn!("Droplet rejected: capacity of {} reached", self.capacity);
            return Err(SimError::CapacityExceeded {
                cap: self.capacity,
            });
        }
        if !position.is_finite() {
            log::warn!("Droplet rejected: invalid position {position:?}");
            return Err(SimError::InvalidGeometry("droplet position"));
        }

        let body = world.add_circle(position, radius, material)?;
        let id = DropletId(self.next_id);
        self.next_id += 1;
        self.droplets.push(Droplet {
            id,
            body,
            radius,
            lock: MazeLock::Free,
            on_scale: false,
            counted_on_weight: false,
        });
        Ok(id)
    }

    /// Spawn one droplet at a point in the maze's local frame, aligned with
    /// the maze's current rotation.
    pub fn spawn_in_maze<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        maze: &MazeCompound,
        local: Vec2,
        radius: f32,
    ) -> Result<DropletId> {
        let position = maze.local_to_world(world, local);
        self.spawn(world, position, radius, Material::droplet())
    }

    /// Spawn up to `count` droplets on shuffled passage slots; returns how
    /// many landed.
    ///
    /// Slots are used once each before any is reused; reused slots get a
    /// random offset so no two droplets start on the same point.
    pub fn spawn_batch<W: PhysicsWorld + ?Sized, R: Rng + ?Sized>(
        &mut self,
        world: &mut W,
        maze: &MazeCompound,
        count: usize,
        radius: f32,
        rng: &mut R,
    ) -> usize {
        let wanted = count.min(self.remaining());
        if wanted < count {
            log::warn!(
                "Only {wanted} of {count} droplets fit under the cap of {}",
                self.capacity
            );
        }
        let mut slots = maze.spawn_slots();
        if slots.is_empty() {
            log::warn!("Maze has no passage cells to spawn into");
            return 0;
        }
        slots.shuffle(rng);

        let spread = radius * 0.5;
        let mut spawned = 0;
        for i in 0..wanted {
            let mut local = slots[i % slots.len()];
            if i >= slots.len() {
                local += Vec2::new(
                    rng.random_range(-spread..=spread),
                    rng.random_range(-spread..=spread),
                );
            }
            match self.spawn_in_maze(world, maze, local, radius) {
                Ok(_) => spawned += 1,
                Err(e) => log::warn!("Droplet spawn skipped: {e}"),
            }
        }
        log::info!("Spawned {spawned} droplets ({} live)", self.len());
        spawned
    }

    /// Housekeeping pass; returns how many droplets were pruned.
    ///
    /// Locked droplets are mid rotation sync and always kept.
    pub fn cleanup<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        bounds: &PlayBounds,
    ) -> usize {
        let before = self.droplets.len();
        self.droplets.retain(|droplet| {
            if droplet.is_locked() {
                return true;
            }
            let Some(pos) = world.position(droplet.body) else {
                return false;
            };
            if !pos.is_finite() || !bounds.contains(pos) {
                world.remove_body(droplet.body);
                return false;
            }
            true
        });
        let removed = before - self.droplets.len();
        if removed > 0 {
            log::debug!("Cleanup pruned {removed} droplets ({} live)", self.len());
        }
        removed
    }

    /// Remove every droplet from the world; returns how many there were
    pub fn clear_all<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) -> usize {
        let count = self.droplets.len();
        for droplet in self.droplets.drain(..) {
            world.remove_body(droplet.body);
        }
        count
    }

    /// World positions of live droplets (skipping stale bodies)
    pub fn positions<W: PhysicsWorld + ?Sized>(&self, world: &W) -> Vec<Vec2> {
        self.droplets
            .iter()
            .filter_map(|d| world.position(d.body))
            .collect()
    }
}
