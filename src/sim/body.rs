//! The maze as one rotatable rigid body
//!
//! Even rows/columns are thin walls, odd ones are wide corridors. Every wall
//! cell becomes one rectangle part of a single compound body centered on the
//! maze's bounding box and pinned to a fixed world anchor. Its mass is large
//! enough that droplet contacts leave it in place; only the rotation
//! controller changes its angle.

use glam::Vec2;

use super::maze::Grid;
use crate::consts::MAZE_MASS;
use crate::error::Result;
use crate::physics::{BodyHandle, ConstraintHandle, Material, PhysicsWorld, RectPart};
use crate::rotate;

/// Physical size of each grid row and column
#[derive(Debug, Clone, PartialEq)]
pub struct MazeLayout {
    /// Left edge of each column, plus the total width as the last entry
    cols: Vec<f32>,
    /// Top edge of each row, plus the total height as the last entry
    rows: Vec<f32>,
    corridor_width: f32,
    wall_thickness: f32,
}

impl MazeLayout {
    pub fn new(
        grid_width: usize,
        grid_height: usize,
        corridor_width: f32,
        wall_thickness: f32,
    ) -> Self {
        let cumulative = |n: usize| {
            let mut acc = Vec::with_capacity(n + 1);
            acc.push(0.0);
            for i in 0..n {
                let dim = if i % 2 == 0 { wall_thickness } else { corridor_width };
                acc.push(acc[i] + dim);
            }
            acc
        };
        Self {
            cols: cumulative(grid_width),
            rows: cumulative(grid_height),
            corridor_width,
            wall_thickness,
        }
    }

    pub fn total_size(&self) -> Vec2 {
        Vec2::new(
            self.cols.last().copied().unwrap_or(0.0),
            self.rows.last().copied().unwrap_or(0.0),
        )
    }

    /// Size of cell (x, y): walls on even indices, corridors on odd
    pub fn cell_size(&self, x: usize, y: usize) -> Vec2 {
        let dim = |i: usize| {
            if i % 2 == 0 {
                self.wall_thickness
            } else {
                self.corridor_width
            }
        };
        Vec2::new(dim(x), dim(y))
    }

    /// Center of cell (x, y) relative to the maze center
    pub fn cell_center(&self, x: usize, y: usize) -> Vec2 {
        let size = self.cell_size(x, y);
        let corner = Vec2::new(self.cols[x], self.rows[y]);
        corner + size * 0.5 - self.total_size() * 0.5
    }

    pub fn cell_rect(&self, x: usize, y: usize) -> RectPart {
        RectPart::new(self.cell_center(x, y), self.cell_size(x, y))
    }
}

/// A built maze body
#[derive(Debug, Clone)]
pub struct MazeCompound {
    pub body: BodyHandle,
    pub pin: ConstraintHandle,
    pub anchor: Vec2,
    pub grid: Grid,
    pub layout: MazeLayout,
    /// Wall rectangles in the local frame
    pub parts: Vec<RectPart>,
}

impl MazeCompound {
    /// Half the local bounding box
    pub fn half_extents(&self) -> Vec2 {
        self.layout.total_size() * 0.5
    }

    /// Current orientation (0 if the body is gone)
    pub fn angle<W: PhysicsWorld + ?Sized>(&self, world: &W) -> f32 {
        world.angle(self.body).unwrap_or(0.0)
    }

    /// Current world position of the compound's origin
    pub fn position<W: PhysicsWorld + ?Sized>(&self, world: &W) -> Vec2 {
        world.position(self.body).unwrap_or(self.anchor)
    }

    /// Map a local-frame point to world space using the current pose
    pub fn local_to_world<W: PhysicsWorld + ?Sized>(&self, world: &W, local: Vec2) -> Vec2 {
        self.position(world) + rotate(local, self.angle(world))
    }

    /// Map a world point into the un-rotated local frame
    pub fn world_to_local<W: PhysicsWorld + ?Sized>(&self, world: &W, point: Vec2) -> Vec2 {
        rotate(point - self.position(world), -self.angle(world))
    }

    /// True if `point` lies within the maze's rotated bounding square
    pub fn footprint_contains<W: PhysicsWorld + ?Sized>(&self, world: &W, point: Vec2) -> bool {
        let local = self.world_to_local(world, point).abs();
        let half = self.half_extents();
        local.x <= half.x && local.y <= half.y
    }

    /// Local centers of every passage seed cell
    pub fn spawn_sites(&self) -> Vec<Vec2> {
        self.grid
            .seed_cells()
            .into_iter()
            .map(|(x, y)| self.layout.cell_center(x, y))
            .collect()
    }

    /// Local spawn points: a 2x2 block per seed cell, half a corridor apart.
    ///
    /// Droplets up to a quarter corridor in radius placed on distinct slots
    /// overlap neither each other nor a wall.
    pub fn spawn_slots(&self) -> Vec<Vec2> {
        let q = self.layout.corridor_width * 0.25;
        let offsets = [
            Vec2::new(-q, -q),
            Vec2::new(q, -q),
            Vec2::new(-q, q),
            Vec2::new(q, q),
        ];
        self.spawn_sites()
            .into_iter()
            .flat_map(|site| offsets.map(|o| site + o))
            .collect()
    }

    /// Whether `point` lies inside one of the wall parts
    #[cfg(test)]
    pub(crate) fn wall_contains<W: PhysicsWorld + ?Sized>(&self, world: &W, point: Vec2) -> bool {
        let local = self.world_to_local(world, point);
        self.parts.iter().any(|part| {
            let d = (local - part.center).abs();
            d.x <= part.half_extents.x && d.y <= part.half_extents.y
        })
    }
}

/// Owner of the single maze compound of a stage
#[derive(Debug, Default)]
pub struct MazeBody {
    compound: Option<MazeCompound>,
}

impl MazeBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compound(&self) -> Option<&MazeCompound> {
        self.compound.as_ref()
    }

    /// Build the compound for `grid`, replacing any previous one
    pub fn build<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        grid: Grid,
        anchor: Vec2,
        corridor_width: f32,
        wall_thickness: f32,
    ) -> Result<&MazeCompound> {
        self.clear(world);

        let layout = MazeLayout::new(grid.width(), grid.height(), corridor_width, wall_thickness);
        let parts: Vec<RectPart> = grid
            .wall_cells()
            .map(|(x, y)| layout.cell_rect(x, y))
            .collect();

        let body = world.add_compound(parts.clone(), anchor, MAZE_MASS, Material::wall())?;
        let pin = match world.add_pin(body, anchor) {
            Ok(pin) => pin,
            Err(e) => {
                world.remove_body(body);
                return Err(e);
            }
        };

        log::info!(
            "Maze body built: {}x{} grid, {} wall parts, {:?} px",
            grid.width(),
            grid.height(),
            parts.len(),
            layout.total_size()
        );

        Ok(&*self.compound.insert(MazeCompound {
            body,
            pin,
            anchor,
            grid,
            layout,
            parts,
        }))
    }

    /// Remove the compound (and its pin) from the world
    pub fn clear<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        if let Some(old) = self.compound.take() {
            world.remove_body(old.body);
        }
    }

    /// Snap the compound back onto its anchor and stop any spin.
    ///
    /// Skipped while a rotation gesture owns the body.
    pub fn enforce_anchor<W: PhysicsWorld + ?Sized>(&self, world: &mut W, rotating: bool) {
        let Some(compound) = &self.compound else {
            return;
        };
        if rotating {
            return;
        }
        let result = world
            .set_position(compound.body, compound.anchor)
            .and_then(|_| world.set_velocity(compound.body, Vec2::ZERO))
            .and_then(|_| world.set_angular_velocity(compound.body, 0.0));
        match result {
            Ok(()) => {}
            Err(e) if e.is_stale() => log::debug!("Maze anchor correction skipped: {e}"),
            Err(e) => log::warn!("Maze anchor correction failed: {e}"),
        }
    }
}
