//! Simulation context
//!
//! Everything a running game owns lives in one [`Simulation`]: settings,
//! the physics world, the maze, the droplet table, rotation and scale state,
//! the stage controller, deferred tasks and the session ranking.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::body::MazeBody;
use super::droplets::{DropletId, DropletPool, PlayBounds};
use super::input::{InputEvent, InputQueue};
use super::maze::generate;
use super::rotation::RotationSync;
use super::scale::Scale;
use super::schedule::{Scheduler, Task};
use super::stage::{SimEvent, StageController, StagePhase};
use crate::error::{Result, SimError};
use crate::highscores::HighScores;
use crate::physics::{PhysicsWorld, World};
use crate::settings::{Settings, StageConfig};

pub struct Simulation<W: PhysicsWorld = World> {
    pub(crate) settings: Settings,
    pub(crate) world: W,
    pub(crate) maze: MazeBody,
    pub(crate) droplets: DropletPool,
    pub(crate) rotation: RotationSync,
    pub(crate) scale: Scale,
    pub(crate) stage: StageController,
    pub(crate) scheduler: Scheduler,
    pub(crate) input: InputQueue,
    pub(crate) rng: Pcg32,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) high_scores: HighScores,
    /// Simulation clock (s)
    pub(crate) time: f64,
    pub(crate) tick_count: u64,
    /// Next time the stage clock is polled (s)
    pub(crate) next_timer_poll: f64,
}

impl Simulation<World> {
    /// New simulation with the in-crate physics world
    pub fn new(settings: Settings, seed: u64) -> Result<Self> {
        let world = World::new(settings.gravity_vec());
        Self::with_world(settings, world, seed)
    }
}

impl<W: PhysicsWorld> Simulation<W> {
    pub fn with_world(settings: Settings, world: W, seed: u64) -> Result<Self> {
        settings.validate()?;
        log::info!(
            "Simulation created: {} stages, seed {seed}",
            settings.stages.len()
        );
        Ok(Self {
            droplets: DropletPool::new(settings.max_droplets),
            settings,
            world,
            maze: MazeBody::new(),
            rotation: RotationSync::new(),
            scale: Scale::new(),
            stage: StageController::new(),
            scheduler: Scheduler::new(),
            input: InputQueue::new(),
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
            high_scores: HighScores::new(),
            time: 0.0,
            tick_count: 0,
            next_timer_poll: 0.0,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn maze(&self) -> &MazeBody {
        &self.maze
    }

    pub fn droplets(&self) -> &DropletPool {
        &self.droplets
    }

    pub fn rotation(&self) -> &RotationSync {
        &self.rotation
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    pub fn stage(&self) -> &StageController {
        &self.stage
    }

    pub fn high_scores(&self) -> &HighScores {
        &self.high_scores
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn phase(&self) -> StagePhase {
        self.stage.phase()
    }

    pub fn current_config(&self) -> Option<&StageConfig> {
        self.settings.stage(self.stage.index())
    }

    pub fn play_bounds(&self) -> PlayBounds {
        PlayBounds {
            width: self.settings.width,
            height: self.settings.height,
            margin: self.settings.cleanup_margin,
        }
    }

    /// Queue a pointer event for the next tick
    pub fn push_input(&mut self, event: InputEvent) -> bool {
        self.input.push(event)
    }

    /// Take all notifications raised since the last call
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Build the current stage: flush rotation, clear droplets, rebuild the
    /// scale and maze, then schedule spawning and monitoring.
    ///
    /// On failure the stage stays in Setup and may be retried.
    pub fn start_stage(&mut self) -> Result<()> {
        let config = *self
            .current_config()
            .ok_or_else(|| SimError::InvalidConfig(format!("no stage {}", self.stage.number())))?;

        self.force_end_drag();
        let cleared = self.droplets.clear_all(&mut self.world);
        log::debug!("Cleared {cleared} droplets for stage {}", self.stage.number());

        self.scale
            .build(&mut self.world, &self.settings, config.scale_pan_width)?;

        let mut grid = generate(config.maze_size, config.maze_size, &mut self.rng)?;
        let opening = grid.open_top(config.opening_width());
        log::debug!("Maze opening at columns {opening:?}");
        self.maze.build(
            &mut self.world,
            grid,
            self.settings.maze_anchor(),
            self.settings.corridor_width,
            self.settings.wall_thickness,
        )?;

        let epoch = self.stage.begin(self.time);
        self.next_timer_poll = self.time;
        self.scheduler
            .schedule(self.time, self.settings.spawn_delay, epoch, Task::SpawnDroplets);
        self.scheduler
            .schedule(self.time, self.settings.monitor_delay, epoch, Task::StartMonitoring);
        Ok(())
    }

    /// Move on after a finished stage; after the last one the score is
    /// ranked and `GameComplete` is raised.
    pub fn next_stage(&mut self) -> Result<()> {
        match self.stage.advance(self.settings.stages.len()) {
            Some(_) => self.start_stage(),
            None if self.stage.phase() == StagePhase::GameOver => {
                self.finish_game();
                Ok(())
            }
            None => {
                log::warn!("Next stage ignored in phase {:?}", self.stage.phase());
                Ok(())
            }
        }
    }

    /// Start over from stage one; the ranking survives
    pub fn restart(&mut self) -> Result<()> {
        self.force_end_drag();
        self.scheduler.clear();
        self.input.clear();
        self.stage.restart();
        log::info!("Game restarted");
        self.start_stage()
    }

    /// Unconditionally drop any drag and unlock every droplet
    pub fn force_end_drag(&mut self) {
        let released = self.rotation.release(&mut self.world, &mut self.droplets);
        self.schedule_nudge(released);
    }

    pub(crate) fn schedule_nudge(&mut self, released: Vec<DropletId>) {
        if released.is_empty() || !self.stage.is_running() {
            return;
        }
        self.scheduler.schedule(
            self.time,
            self.settings.nudge_delay,
            self.stage.epoch(),
            Task::Nudge(released),
        );
    }

    fn finish_game(&mut self) {
        let total_score = self.stage.score();
        let rank = self
            .high_scores
            .add_score(total_score, self.stage.stages_cleared());
        self.events.push(SimEvent::GameComplete { total_score, rank });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> Settings {
        Settings {
            stages: vec![
                StageConfig::new(5, 4, 2, 10.0),
                StageConfig::new(7, 6, 3, 10.0),
            ],
            ..Settings::default()
        }
    }

    #[test]
    fn test_start_stage_builds_world() {
        let mut sim = Simulation::new(small_settings(), 1).unwrap();
        sim.start_stage().unwrap();
        assert_eq!(sim.phase(), StagePhase::Running);
        // Maze compound plus three scale parts; droplets come later
        assert_eq!(sim.world().body_count(), 4);
        assert!(sim.droplets().is_empty());
        assert_eq!(sim.scheduler.len(), 2);
        let compound = sim.maze().compound().unwrap();
        assert!(compound.grid.is_passage(2, 0));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let settings = Settings {
            stages: Vec::new(),
            ..Settings::default()
        };
        assert!(Simulation::new(settings, 1).is_err());
    }

    #[test]
    fn test_next_stage_ignored_while_running() {
        let mut sim = Simulation::new(small_settings(), 1).unwrap();
        sim.start_stage().unwrap();
        sim.next_stage().unwrap();
        assert_eq!(sim.stage().index(), 0);
        assert_eq!(sim.phase(), StagePhase::Running);
    }

    #[test]
    fn test_game_complete_ranks_score() {
        let mut sim = Simulation::new(small_settings(), 1).unwrap();
        sim.start_stage().unwrap();
        sim.stage.poll_timeout(0, 0.0, 1.0);
        sim.next_stage().unwrap();
        sim.stage.poll_timeout(2, 0.0, 1.0);
        sim.next_stage().unwrap();

        assert_eq!(sim.phase(), StagePhase::GameOver);
        assert_eq!(
            sim.drain_events(),
            vec![SimEvent::GameComplete {
                total_score: 2,
                rank: Some(1)
            }]
        );
        assert_eq!(sim.high_scores().scores(), vec![2]);

        sim.restart().unwrap();
        assert_eq!(sim.stage().score(), 0);
        assert_eq!(sim.high_scores().scores(), vec![2]);
    }
}
