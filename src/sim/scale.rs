//! Target zone (the scale)
//!
//! A shallow cup of three static bodies near the bottom of the play area.
//! Droplets that come to rest inside the detection rectangle are latched as
//! captured and counted once.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::droplets::{DropletId, DropletPool};
use crate::error::Result;
use crate::physics::{BodyHandle, Material, PhysicsWorld};
use crate::settings::Settings;

/// Fraction of `pan_width * corridor_width` used for the cup width
const PAN_WIDTH_FACTOR: f32 = 0.8;
/// Cup height, half a corridor
const PAN_HEIGHT_FACTOR: f32 = 0.5;
/// Distance of the cup center above the bottom edge (px)
const PAN_BOTTOM_OFFSET: f32 = 80.0;
const SIDE_WALL_THICKNESS: f32 = 5.0;
const BOTTOM_THICKNESS: f32 = 15.0;
/// Detection grows past the cup on every side by this much (px)
const DETECTION_MARGIN: f32 = 10.0;
/// Extra reach upward to catch droplets stacked on captured ones (px)
const STACK_MARGIN: f32 = 100.0;
/// Weight label sits this far below the bottom plate (px)
const LABEL_OFFSET: f32 = 20.0;

/// World rectangle given by center and full size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub center: Vec2,
    pub size: Vec2,
}

/// Scale geometry for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleRegion {
    /// Cup center
    pub center: Vec2,
    pub pan_size: Vec2,
    /// Detection rectangle including the upward stack margin
    pub detect_min: Vec2,
    pub detect_max: Vec2,
    /// Where a host should draw the weight readout
    pub display_anchor: Vec2,
    pub bottom: WorldRect,
    pub left_wall: WorldRect,
    pub right_wall: WorldRect,
}

impl ScaleRegion {
    pub fn for_stage(settings: &Settings, pan_width: f32) -> Self {
        let size = Vec2::new(
            pan_width * settings.corridor_width * PAN_WIDTH_FACTOR,
            settings.corridor_width * PAN_HEIGHT_FACTOR,
        );
        let center = Vec2::new(settings.width / 2.0, settings.height - PAN_BOTTOM_OFFSET);
        let half = size * 0.5;

        let bottom = WorldRect {
            center: center + Vec2::new(0.0, half.y),
            size: Vec2::new(size.x, BOTTOM_THICKNESS),
        };
        let wall_size = Vec2::new(SIDE_WALL_THICKNESS, size.y);
        let wall_inset = half.x - SIDE_WALL_THICKNESS / 2.0;
        let left_wall = WorldRect {
            center: center - Vec2::new(wall_inset, 0.0),
            size: wall_size,
        };
        let right_wall = WorldRect {
            center: center + Vec2::new(wall_inset, 0.0),
            size: wall_size,
        };

        let detect_min =
            center - half - Vec2::splat(DETECTION_MARGIN) - Vec2::new(0.0, STACK_MARGIN);
        let detect_max = center + half + Vec2::splat(DETECTION_MARGIN);

        Self {
            center,
            pan_size: size,
            detect_min,
            detect_max,
            display_anchor: center + Vec2::new(0.0, half.y + BOTTOM_THICKNESS / 2.0 + LABEL_OFFSET),
            bottom,
            left_wall,
            right_wall,
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.detect_min.x
            && p.x <= self.detect_max.x
            && p.y >= self.detect_min.y
            && p.y <= self.detect_max.y
    }

    pub fn parts(&self) -> [WorldRect; 3] {
        [self.bottom, self.left_wall, self.right_wall]
    }
}

/// Scale bodies and accumulated weight for the current stage
#[derive(Debug, Default)]
pub struct Scale {
    region: Option<ScaleRegion>,
    bodies: Vec<BodyHandle>,
    weight: u32,
}

impl Scale {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self) -> Option<&ScaleRegion> {
        self.region.as_ref()
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn body_handles(&self) -> &[BodyHandle] {
        &self.bodies
    }

    /// Replace the cup with one sized for `pan_width` and zero the weight
    pub fn build<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        settings: &Settings,
        pan_width: f32,
    ) -> Result<&ScaleRegion> {
        self.clear(world);

        let region = ScaleRegion::for_stage(settings, pan_width);
        for part in region.parts() {
            let body = world.add_static_rect(part.center, part.size, Material::wall())?;
            self.bodies.push(body);
        }
        log::info!(
            "Scale built at {:?}, pan {:?}",
            region.center,
            region.pan_size
        );
        Ok(&*self.region.insert(region))
    }

    /// Remove the cup bodies and reset the weight
    pub fn clear<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        for body in self.bodies.drain(..) {
            world.remove_body(body);
        }
        self.region = None;
        self.weight = 0;
    }

    /// Latch resting droplets inside the detection rectangle, at most
    /// `limit` of them.
    ///
    /// Returns the ids captured this pass, in id order. Each droplet is
    /// counted at most once.
    pub fn capture<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        droplets: &mut DropletPool,
        rest_speed: f32,
        limit: usize,
    ) -> Vec<DropletId> {
        let Some(region) = self.region.clone() else {
            return Vec::new();
        };

        let mut captured = Vec::new();
        // Droplets following the maze belong to it until released
        for droplet in droplets
            .iter_mut()
            .filter(|d| !d.on_scale && !d.is_locked())
        {
            if captured.len() >= limit {
                break;
            }
            let (Some(pos), Some(vel)) =
                (world.position(droplet.body), world.velocity(droplet.body))
            else {
                continue;
            };
            if !region.contains(pos) || vel.length() >= rest_speed {
                continue;
            }

            droplet.on_scale = true;
            if let Err(e) = world
                .set_velocity(droplet.body, Vec2::ZERO)
                .and_then(|_| world.set_angular_velocity(droplet.body, 0.0))
            {
                log::warn!("Captured droplet {:?} not stopped: {e}", droplet.id);
            }

            if !droplet.counted_on_weight {
                droplet.counted_on_weight = true;
                self.weight += 1;
                captured.push(droplet.id);
            }
        }
        if !captured.is_empty() {
            log::debug!("Scale weight now {}", self.weight);
        }
        captured
    }
}

/// Points per captured unit for a capture `elapsed` seconds into the stage
pub fn points_for_elapsed(elapsed: f32) -> u64 {
    if elapsed <= 10.0 {
        4
    } else if elapsed <= 30.0 {
        3
    } else if elapsed <= 60.0 {
        2
    } else {
        1
    }
}
