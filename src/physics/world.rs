//! Rigid body world backed by rapier2d
//!
//! Droplets are dynamic balls with continuous collision detection so fast
//! droplets cannot tunnel through thin maze walls. Static rectangles become
//! fixed cuboids, compounds one dynamic body carrying a cuboid collider per
//! part. Pins lock a body's translation and hold it exactly on its anchor
//! after every step.

use std::collections::BTreeMap;

use glam::Vec2;
use rapier2d::prelude::*;

use super::{BodyHandle, ConstraintHandle, Material, PhysicsWorld, RectPart};
use crate::error::{Result, SimError};
use crate::normalize_angle;

/// Default gravity in px/s² (screen coordinates, +y is down)
pub const DEFAULT_GRAVITY: Vec2 = Vec2::new(0.0, 1000.0);

/// World units per rapier "meter"; geometry is in pixels
const LENGTH_UNIT: f32 = 10.0;

fn to_vector(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn to_vec2(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

fn finite_or(value: Vec2, what: &'static str) -> Result<Vec2> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimError::InvalidGeometry(what))
    }
}

#[derive(Debug, Clone, Copy)]
struct Pin {
    body: BodyHandle,
    anchor: Vec2,
}

/// rapier2d implementation of [`PhysicsWorld`]
pub struct World {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    /// Our handles in creation order, so iteration never depends on arena slots
    handles: BTreeMap<u32, RigidBodyHandle>,
    pins: BTreeMap<u32, Pin>,
    /// Bodies with a pending force, cleared after the next step
    forced: Vec<RigidBodyHandle>,
    next_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY)
    }
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity: to_vector(gravity),
            params: IntegrationParameters {
                length_unit: LENGTH_UNIT,
                ..IntegrationParameters::default()
            },
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            handles: BTreeMap::new(),
            pins: BTreeMap::new(),
            forced: Vec::new(),
            next_id: 1,
        }
    }

    pub fn body_count(&self) -> usize {
        self.handles.len()
    }

    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, body: RigidBody, colliders: Vec<Collider>) -> BodyHandle {
        let rb = self.bodies.insert(body);
        for collider in colliders {
            self.colliders
                .insert_with_parent(collider, rb, &mut self.bodies);
        }
        let id = self.next_handle();
        self.handles.insert(id, rb);
        BodyHandle(id)
    }

    fn rigid_body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.handles
            .get(&handle.0)
            .and_then(|rb| self.bodies.get(*rb))
    }

    fn rigid_body_mut(&mut self, handle: BodyHandle) -> Result<&mut RigidBody> {
        self.handles
            .get(&handle.0)
            .and_then(|rb| self.bodies.get_mut(*rb))
            .ok_or(SimError::StaleReference(handle))
    }

    /// Whether any collider of `rb` contains `point`, using the body's
    /// current pose rather than the pose of the last step
    fn body_contains_point(&self, rb: &RigidBody, point: &Point<Real>) -> bool {
        rb.colliders().iter().any(|ch| {
            let Some(collider) = self.colliders.get(*ch) else {
                return false;
            };
            let local = collider
                .position_wrt_parent()
                .copied()
                .unwrap_or_else(Isometry::identity);
            let pose = rb.position() * local;
            collider.shape().contains_point(&pose, point)
        })
    }

    fn solve_pins(&mut self) {
        for pin in self.pins.values() {
            let Some(rb) = self
                .handles
                .get(&pin.body.0)
                .and_then(|rb| self.bodies.get_mut(*rb))
            else {
                continue;
            };
            rb.set_translation(to_vector(pin.anchor), false);
            rb.set_linvel(Vector::zeros(), false);
        }
    }
}

fn cuboid(part: &RectPart, material: Material, density: f32) -> Collider {
    ColliderBuilder::cuboid(part.half_extents.x, part.half_extents.y)
        .translation(to_vector(part.center))
        .density(density)
        .friction(material.friction)
        .restitution(material.restitution)
        .build()
}

impl PhysicsWorld for World {
    fn add_circle(&mut self, pos: Vec2, radius: f32, material: Material) -> Result<BodyHandle> {
        let pos = finite_or(pos, "circle position")?;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(SimError::InvalidGeometry("circle radius"));
        }
        // Air friction is a per-frame velocity loss at 60 Hz
        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(pos))
            .linear_damping(material.air_friction * 60.0)
            .ccd_enabled(true)
            .can_sleep(false)
            .build();
        let collider = ColliderBuilder::ball(radius)
            .density(material.density)
            .friction(material.friction)
            .restitution(material.restitution)
            .build();
        Ok(self.insert(body, vec![collider]))
    }

    fn add_static_rect(
        &mut self,
        center: Vec2,
        size: Vec2,
        material: Material,
    ) -> Result<BodyHandle> {
        let center = finite_or(center, "rectangle center")?;
        let size = finite_or(size, "rectangle size")?;
        let body = RigidBodyBuilder::fixed()
            .translation(to_vector(center))
            .build();
        let part = RectPart::new(Vec2::ZERO, size);
        Ok(self.insert(body, vec![cuboid(&part, material, material.density)]))
    }

    fn add_compound(
        &mut self,
        parts: Vec<RectPart>,
        pos: Vec2,
        mass: f32,
        material: Material,
    ) -> Result<BodyHandle> {
        let pos = finite_or(pos, "compound position")?;
        if parts
            .iter()
            .any(|p| !p.center.is_finite() || !p.half_extents.is_finite())
        {
            return Err(SimError::InvalidGeometry("compound part"));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(SimError::InvalidGeometry("compound mass"));
        }
        // Spread the mass evenly over the parts' area
        let area: f32 = parts
            .iter()
            .map(|p| 4.0 * p.half_extents.x * p.half_extents.y)
            .sum();
        let density = if area > 0.0 { mass / area } else { 0.0 };

        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(pos))
            .gravity_scale(0.0)
            .can_sleep(false)
            .build();
        let colliders = parts
            .iter()
            .map(|p| cuboid(p, material, density))
            .collect();
        Ok(self.insert(body, colliders))
    }

    fn add_pin(&mut self, body: BodyHandle, anchor: Vec2) -> Result<ConstraintHandle> {
        let anchor = finite_or(anchor, "pin anchor")?;
        let rb = self.rigid_body_mut(body)?;
        rb.lock_translations(true, true);
        rb.set_translation(to_vector(anchor), true);
        rb.set_linvel(Vector::zeros(), true);
        let id = self.next_handle();
        self.pins.insert(id, Pin { body, anchor });
        Ok(ConstraintHandle(id))
    }

    fn remove_body(&mut self, body: BodyHandle) -> bool {
        self.pins.retain(|_, pin| pin.body != body);
        let Some(rb) = self.handles.remove(&body.0) else {
            return false;
        };
        self.forced.retain(|h| *h != rb);
        self.bodies
            .remove(
                rb,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.rigid_body(body).is_some()
    }

    fn position(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body(body).map(|rb| to_vec2(rb.translation()))
    }

    fn velocity(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body(body).map(|rb| to_vec2(rb.linvel()))
    }

    fn angle(&self, body: BodyHandle) -> Option<f32> {
        self.rigid_body(body).map(|rb| rb.rotation().angle())
    }

    fn angular_velocity(&self, body: BodyHandle) -> Option<f32> {
        self.rigid_body(body).map(|rb| rb.angvel())
    }

    fn set_position(&mut self, body: BodyHandle, pos: Vec2) -> Result<()> {
        let pos = finite_or(pos, "position")?;
        self.rigid_body_mut(body)?
            .set_translation(to_vector(pos), true);
        Ok(())
    }

    fn set_velocity(&mut self, body: BodyHandle, vel: Vec2) -> Result<()> {
        let vel = finite_or(vel, "velocity")?;
        self.rigid_body_mut(body)?.set_linvel(to_vector(vel), true);
        Ok(())
    }

    fn set_angle(&mut self, body: BodyHandle, angle: f32) -> Result<()> {
        if !angle.is_finite() {
            return Err(SimError::InvalidGeometry("angle"));
        }
        self.rigid_body_mut(body)?
            .set_rotation(Rotation::new(normalize_angle(angle)), true);
        Ok(())
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, angular_vel: f32) -> Result<()> {
        if !angular_vel.is_finite() {
            return Err(SimError::InvalidGeometry("angular velocity"));
        }
        self.rigid_body_mut(body)?.set_angvel(angular_vel, true);
        Ok(())
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec2) -> Result<()> {
        let force = finite_or(force, "force")?;
        let rb = *self
            .handles
            .get(&body.0)
            .ok_or(SimError::StaleReference(body))?;
        self.rigid_body_mut(body)?.add_force(to_vector(force), true);
        if !self.forced.contains(&rb) {
            self.forced.push(rb);
        }
        Ok(())
    }

    fn query_point(&self, point: Vec2) -> Option<BodyHandle> {
        if !point.is_finite() {
            return None;
        }
        let point = point![point.x, point.y];
        self.handles
            .iter()
            .rev()
            .find(|(_, rb)| {
                self.bodies
                    .get(**rb)
                    .is_some_and(|rb| self.body_contains_point(rb, &point))
            })
            .map(|(&id, _)| BodyHandle(id))
    }

    fn step(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );

        // Forces act for a single step
        for rb in self.forced.drain(..) {
            if let Some(body) = self.bodies.get_mut(rb) {
                body.reset_forces(false);
            }
        }
        self.solve_pins();
    }
}
