//! Fixed timestep simulation tick
//!
//! One call advances the whole game by `dt`, in a fixed order: input,
//! due deferred tasks, physics, maze anchoring, rotation replay, scale
//! capture, stage clock, housekeeping.

use glam::Vec2;

use super::input::InputEvent;
use super::schedule::Task;
use super::state::Simulation;
use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS, SIM_DT};
use crate::physics::PhysicsWorld;

/// Advance the simulation by one fixed timestep
pub fn tick<W: PhysicsWorld>(sim: &mut Simulation<W>, dt: f32) {
    process_input(sim);
    run_deferred(sim);

    sim.world.step(dt);
    sim.time += f64::from(dt);
    sim.tick_count += 1;

    // Undo any drift from droplet impacts unless the player owns the maze
    let rotating = sim.rotation.is_rotating();
    sim.maze.enforce_anchor(&mut sim.world, rotating);
    if let Some(compound) = sim.maze.compound() {
        sim.rotation.sync(&mut sim.world, compound, &mut sim.droplets);
    }

    capture_resting(sim);
    poll_stage_clock(sim);

    let interval = sim.settings.cleanup_interval_ticks;
    if interval > 0 && sim.tick_count % interval == 0 {
        let bounds = sim.play_bounds();
        sim.droplets.cleanup(&mut sim.world, &bounds);
    }
}

fn process_input<W: PhysicsWorld>(sim: &mut Simulation<W>) {
    let events: Vec<InputEvent> = sim.input.drain().collect();
    for event in events {
        match event {
            InputEvent::PointerDown(pointer) => {
                if !sim.stage.is_running() {
                    continue;
                }
                let Some(compound) = sim.maze.compound() else {
                    continue;
                };
                // Only a press on the maze itself starts a drag
                if sim.world.query_point(pointer) != Some(compound.body) {
                    continue;
                }
                sim.rotation
                    .begin(&mut sim.world, compound, &mut sim.droplets, pointer);
            }
            InputEvent::PointerMove(pointer) => {
                if let Some(compound) = sim.maze.compound() {
                    sim.rotation
                        .drag_to(&mut sim.world, compound, &mut sim.droplets, pointer);
                }
            }
            InputEvent::PointerUp(_) | InputEvent::PointerCancel => sim.force_end_drag(),
        }
    }
}

fn run_deferred<W: PhysicsWorld>(sim: &mut Simulation<W>) {
    for deferred in sim.scheduler.take_due(sim.time) {
        if !sim.stage.accepts(deferred.epoch) {
            log::debug!("Skipping stale task {:?}", deferred.task);
            continue;
        }
        match deferred.task {
            Task::SpawnDroplets => {
                let count = sim
                    .current_config()
                    .map(|c| c.initial_droplet_count)
                    .unwrap_or(0);
                let radius = sim.settings.droplet_radius();
                if let Some(compound) = sim.maze.compound() {
                    sim.droplets
                        .spawn_batch(&mut sim.world, compound, count, radius, &mut sim.rng);
                }
            }
            Task::StartMonitoring => sim.stage.start_monitoring(),
            Task::Nudge(ids) => {
                let force = Vec2::new(0.0, sim.settings.nudge_force);
                for id in ids {
                    let Some(droplet) = sim.droplets.get(id) else {
                        continue;
                    };
                    if droplet.is_locked() || droplet.on_scale {
                        continue;
                    }
                    if let Err(e) = sim.world.apply_force(droplet.body, force) {
                        log::debug!("Nudge skipped for {id:?}: {e}");
                    }
                }
            }
        }
    }
}

fn capture_resting<W: PhysicsWorld>(sim: &mut Simulation<W>) {
    if !sim.stage.is_monitoring() {
        return;
    }
    let Some(target) = sim.current_config().map(|c| c.target_weight) else {
        return;
    };
    let remaining = target.saturating_sub(sim.scale.weight()) as usize;
    let captured = sim.scale.capture(
        &mut sim.world,
        &mut sim.droplets,
        sim.settings.rest_speed,
        remaining,
    );
    if captured.is_empty() {
        return;
    }

    let events = sim
        .stage
        .record_capture(captured.len() as u32, sim.scale.weight(), target, sim.time);
    sim.events.extend(events);
    if !sim.stage.is_running() {
        sim.force_end_drag();
    }
}

fn poll_stage_clock<W: PhysicsWorld>(sim: &mut Simulation<W>) {
    if !sim.stage.is_running() || sim.time < sim.next_timer_poll {
        return;
    }
    sim.next_timer_poll = sim.time + f64::from(sim.settings.timer_poll_interval);
    if let Some(event) =
        sim.stage
            .poll_timeout(sim.scale.weight(), sim.settings.stage_time_limit, sim.time)
    {
        sim.events.push(event);
        sim.force_end_drag();
    }
}

/// Frame-time accumulator driving [`tick`] at a fixed rate
#[derive(Debug, Clone, Default)]
pub struct Runner {
    accumulator: f32,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame's wall time; returns how many ticks ran
    pub fn advance<W: PhysicsWorld>(&mut self, sim: &mut Simulation<W>, frame_dt: f32) -> u32 {
        let dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(sim, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        substeps
    }

    /// Fraction of a tick left over, for render interpolation
    pub fn alpha(&self) -> f32 {
        self.accumulator / SIM_DT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Material;
    use crate::settings::{Settings, StageConfig};
    use crate::sim::stage::{SimEvent, StagePhase};

    fn settings_with(stage: StageConfig) -> Settings {
        Settings {
            stages: vec![stage, StageConfig::new(11, 10, 5, 25.0)],
            ..Settings::default()
        }
    }

    fn run_for(sim: &mut Simulation, seconds: f32) {
        let ticks = (seconds / SIM_DT).ceil() as u32;
        for _ in 0..ticks {
            tick(sim, SIM_DT);
        }
    }

    /// A point on the maze's left border wall, in world space
    fn border_point(sim: &Simulation) -> Vec2 {
        let compound = sim.maze().compound().unwrap();
        let local = Vec2::new(
            -compound.half_extents().x + sim.settings().wall_thickness / 2.0,
            0.0,
        );
        compound.local_to_world(sim.world(), local)
    }

    #[test]
    fn test_droplets_spawn_after_delay() {
        let settings = settings_with(StageConfig::new(11, 100, 20, 25.0));
        let mut sim = Simulation::new(settings, 3).unwrap();
        sim.start_stage().unwrap();
        run_for(&mut sim, 0.3);
        assert!(sim.droplets().is_empty());
        run_for(&mut sim, 0.2);
        assert_eq!(sim.droplets().len(), 100);
        assert!(!sim.stage().is_monitoring());
        run_for(&mut sim, 0.6);
        assert!(sim.stage().is_monitoring());
    }

    #[test]
    fn test_stage_complete_fires_once_at_target() {
        let settings = settings_with(StageConfig::new(11, 100, 20, 25.0));
        let mut sim = Simulation::new(settings, 5).unwrap();
        sim.start_stage().unwrap();
        run_for(&mut sim, 1.1);
        assert!(sim.stage().is_monitoring());

        // Drop 25 droplets just above the pan floor
        for i in 0..25 {
            sim.droplets
                .spawn(
                    &mut sim.world,
                    Vec2::new(100.0 + i as f32 * 12.0, 710.0),
                    5.0,
                    Material::droplet(),
                )
                .unwrap();
        }
        run_for(&mut sim, 1.0);

        let events = sim.drain_events();
        let completes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SimEvent::StageComplete { .. }))
            .collect();
        assert_eq!(completes.len(), 1);
        assert!(matches!(completes[0], SimEvent::StageComplete { weight: 20, .. }));
        assert_eq!(sim.scale().weight(), 20);
        assert_eq!(sim.phase(), StagePhase::Complete);
        // Captured within the first ten seconds
        assert_eq!(sim.stage().score(), 80);
    }

    #[test]
    fn test_drag_rotates_maze_and_locks_droplets() {
        let settings = settings_with(StageConfig::new(11, 30, 20, 25.0));
        let mut sim = Simulation::new(settings, 8).unwrap();
        sim.start_stage().unwrap();
        run_for(&mut sim, 0.45);
        assert_eq!(sim.droplets().len(), 30);

        let anchor = sim.settings().maze_anchor();
        let start = border_point(&sim);
        assert!(sim.push_input(InputEvent::PointerDown(start)));
        tick(&mut sim, SIM_DT);
        assert!(sim.rotation().is_rotating());
        let locked = sim.droplets().iter().filter(|d| d.is_locked()).count();
        assert!(locked > 0);

        // Swing the pointer a quarter turn around the anchor
        let swung = anchor + crate::rotate(start - anchor, std::f32::consts::FRAC_PI_2);
        sim.push_input(InputEvent::PointerMove(swung));
        tick(&mut sim, SIM_DT);
        let compound = sim.maze().compound().unwrap();
        let angle = compound.angle(sim.world());
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        assert_eq!(compound.position(sim.world()), anchor);

        // Locked droplets sit exactly where the replay puts them
        for droplet in sim.droplets().iter() {
            if let Some(offset) = droplet.local_offset() {
                let expected = anchor + crate::rotate(offset, angle);
                let pos = sim.world().position(droplet.body).unwrap();
                assert!(pos.distance(expected) < 1e-3);
            }
        }

        sim.push_input(InputEvent::PointerCancel);
        tick(&mut sim, SIM_DT);
        assert!(!sim.rotation().is_rotating());
        assert!(sim.droplets().iter().all(|d| !d.is_locked()));
        // Angle stays where the player left it
        let compound = sim.maze().compound().unwrap();
        assert!((compound.angle(sim.world()) - angle).abs() < 1e-4);
    }

    #[test]
    fn test_press_off_the_maze_does_not_rotate() {
        let settings = settings_with(StageConfig::new(11, 0, 20, 25.0));
        let mut sim = Simulation::new(settings, 8).unwrap();
        sim.start_stage().unwrap();
        sim.push_input(InputEvent::PointerDown(Vec2::new(5.0, 5.0)));
        tick(&mut sim, SIM_DT);
        assert!(!sim.rotation().is_rotating());
    }

    #[test]
    fn test_timeout_flushes_rotation() {
        let mut settings = settings_with(StageConfig::new(11, 20, 20, 25.0));
        settings.stage_time_limit = 1.0;
        let mut sim = Simulation::new(settings, 2).unwrap();
        sim.start_stage().unwrap();
        run_for(&mut sim, 0.5);
        let start = border_point(&sim);
        sim.push_input(InputEvent::PointerDown(start));
        run_for(&mut sim, 0.7);

        let events = sim.drain_events();
        assert_eq!(events, vec![SimEvent::StageTimeout { weight: 0 }]);
        assert_eq!(sim.phase(), StagePhase::TimedOut);
        assert!(!sim.rotation().is_rotating());
        assert!(sim.droplets().iter().all(|d| !d.is_locked()));

        // No second timeout while waiting for the next stage
        run_for(&mut sim, 0.5);
        assert!(sim.drain_events().is_empty());

        sim.next_stage().unwrap();
        assert_eq!(sim.stage().index(), 1);
        assert!(sim.droplets().is_empty());
    }

    #[test]
    fn test_stale_spawn_after_rebuild_is_ignored() {
        let settings = settings_with(StageConfig::new(11, 40, 20, 25.0));
        let mut sim = Simulation::new(settings, 4).unwrap();
        sim.start_stage().unwrap();
        run_for(&mut sim, 0.2);
        // Rebuilding the stage starts a new epoch
        sim.start_stage().unwrap();

        // The first build's spawn would have come due here
        run_for(&mut sim, 0.25);
        assert!(sim.droplets().is_empty());
        run_for(&mut sim, 0.2);
        assert_eq!(sim.droplets().len(), 40);
    }

    #[test]
    fn test_cleanup_prunes_escaped_droplets() {
        let settings = settings_with(StageConfig::new(11, 0, 20, 25.0));
        let mut sim = Simulation::new(settings, 4).unwrap();
        sim.start_stage().unwrap();
        let id = sim
            .droplets
            .spawn(&mut sim.world, Vec2::new(-800.0, 100.0), 5.0, Material::droplet())
            .unwrap();
        run_for(&mut sim, 1.05);
        assert!(sim.droplets().get(id).is_none());
    }

    #[test]
    fn test_maze_stays_on_anchor() {
        let settings = settings_with(StageConfig::new(11, 100, 20, 25.0));
        let mut sim = Simulation::new(settings, 6).unwrap();
        sim.start_stage().unwrap();
        run_for(&mut sim, 2.0);
        let compound = sim.maze().compound().unwrap();
        assert_eq!(compound.position(sim.world()), sim.settings().maze_anchor());
        assert_eq!(sim.world().angular_velocity(compound.body), Some(0.0));
    }

    #[test]
    fn test_closed_maze_holds_water_without_input() {
        let defaults = Settings::default();
        // Small, medium and large mazes
        for (index, seed) in [(0, 21), (3, 22), (6, 23)] {
            let config = defaults.stages[index];
            let settings = Settings {
                stages: vec![config],
                ..Settings::default()
            };
            let mut sim = Simulation::new(settings, seed).unwrap();
            sim.start_stage().unwrap();
            let mut runner = Runner::new();
            for _ in 0..(4.0 / SIM_DT) as u32 {
                runner.advance(&mut sim, SIM_DT);
            }

            let stage = index + 1;
            assert_eq!(sim.droplets().len(), config.initial_droplet_count);
            let compound = sim.maze().compound().unwrap();
            for pos in sim.droplets().positions(sim.world()) {
                assert!(
                    compound.footprint_contains(sim.world(), pos),
                    "stage {stage}: droplet left the maze at {pos:?}"
                );
                assert!(
                    !compound.wall_contains(sim.world(), pos),
                    "stage {stage}: droplet inside a wall at {pos:?}"
                );
            }
            assert_eq!(sim.scale().weight(), 0, "stage {stage} scored without input");
            assert!(sim.drain_events().is_empty());
        }
    }

    #[test]
    fn test_runner_clamps_frame_time() {
        let settings = settings_with(StageConfig::new(11, 0, 20, 25.0));
        let mut sim = Simulation::new(settings, 1).unwrap();
        sim.start_stage().unwrap();
        let mut runner = Runner::new();
        assert_eq!(runner.advance(&mut sim, SIM_DT + 0.001), 1);
        let ticks = runner.advance(&mut sim, 5.0);
        assert!((5..=MAX_SUBSTEPS).contains(&ticks));
        assert_eq!(runner.advance(&mut sim, f32::NAN), 0);
        assert!(runner.alpha() < 1.0);
    }
}
