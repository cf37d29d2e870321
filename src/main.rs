//! Water Maze entry point
//!
//! Natively this runs a headless autopilot session over every stage and logs
//! the events. The browser build is driven through `water_maze::web`.

#[cfg(not(target_arch = "wasm32"))]
mod autopilot {
    use std::f32::consts::PI;

    use glam::Vec2;
    use water_maze::normalize_angle;
    use water_maze::sim::{InputEvent, Simulation};

    /// Maze angles to sweep through; around PI the opening faces the scale
    const SWEEP: [f32; 4] = [PI, PI - 0.6, PI, PI + 0.6];
    /// Time spent turning to each target (s)
    const TURN_TIME: f64 = 0.5;
    /// Pause between turns so released droplets can fall (s)
    const SETTLE_TIME: f64 = 2.0;

    struct Grip {
        pointer_angle: f32,
        radius: f32,
        start_angle: f32,
        delta: f32,
        started: f64,
    }

    /// Scripted player that grabs the maze border and swings it
    #[derive(Default)]
    pub struct Autopilot {
        grip: Option<Grip>,
        next_turn: f64,
        sweep_index: usize,
    }

    impl Autopilot {
        pub fn reset(&mut self, now: f64) {
            self.grip = None;
            self.next_turn = now + 0.5;
        }

        /// Queue this frame's pointer input
        pub fn drive(&mut self, sim: &mut Simulation) {
            if !sim.stage().is_running() {
                self.grip = None;
                return;
            }
            let now = sim.time();
            let anchor = sim.settings().maze_anchor();

            match &self.grip {
                None => {
                    if now < self.next_turn {
                        return;
                    }
                    let Some(compound) = sim.maze().compound() else {
                        return;
                    };
                    // Middle of the left border column, in the maze's frame
                    let local = Vec2::new(
                        -compound.half_extents().x + sim.settings().wall_thickness / 2.0,
                        0.0,
                    );
                    let press = compound.local_to_world(sim.world(), local);
                    let start_angle = compound.angle(sim.world());
                    let target = SWEEP[self.sweep_index % SWEEP.len()];
                    self.grip = Some(Grip {
                        pointer_angle: water_maze::angle_from(anchor, press),
                        radius: press.distance(anchor),
                        start_angle,
                        delta: normalize_angle(target - start_angle),
                        started: now,
                    });
                    sim.push_input(InputEvent::PointerDown(press));
                }
                Some(grip) => {
                    let t = ((now - grip.started) / TURN_TIME).min(1.0) as f32;
                    let angle = grip.pointer_angle + grip.delta * t;
                    let pointer = anchor + Vec2::from_angle(angle) * grip.radius;
                    sim.push_input(InputEvent::PointerMove(pointer));
                    if t >= 1.0 {
                        log::debug!(
                            "Autopilot turned maze to {:.2} rad",
                            grip.start_angle + grip.delta
                        );
                        sim.push_input(InputEvent::PointerUp(pointer));
                        self.grip = None;
                        self.next_turn = now + SETTLE_TIME;
                        self.sweep_index += 1;
                    }
                }
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> water_maze::Result<()> {
    use water_maze::consts::SIM_DT;
    use water_maze::sim::{Runner, SimEvent, Simulation, StagePhase};
    use water_maze::{Settings, SimError};

    let mut args = std::env::args().skip(1);
    let seed = match args.next() {
        Some(s) => s
            .parse::<u64>()
            .map_err(|e| SimError::InvalidConfig(format!("seed {s:?}: {e}")))?,
        None => 42,
    };
    let settings = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| SimError::InvalidConfig(format!("{path}: {e}")))?;
            Settings::from_json(&json)?
        }
        None => Settings::default(),
    };

    // Every stage may run to its time limit, plus slack for transitions
    let frames_per_stage = ((settings.stage_time_limit + 5.0) / SIM_DT) as u64;
    let max_frames = frames_per_stage * settings.stages.len() as u64;

    let mut sim = Simulation::new(settings, seed)?;
    let mut runner = Runner::new();
    let mut pilot = autopilot::Autopilot::default();
    sim.start_stage()?;
    pilot.reset(sim.time());

    for _ in 0..max_frames {
        pilot.drive(&mut sim);
        runner.advance(&mut sim, SIM_DT);

        for event in sim.drain_events() {
            match event {
                SimEvent::WeightChanged { weight } => log::debug!("Weight {weight}"),
                SimEvent::StageComplete { elapsed, weight } => log::info!(
                    "Stage {} cleared in {elapsed:.1}s with weight {weight}",
                    sim.stage().number()
                ),
                SimEvent::StageTimeout { weight } => log::info!(
                    "Stage {} timed out with weight {weight}",
                    sim.stage().number()
                ),
                SimEvent::GameComplete { total_score, rank } => {
                    log::info!("Game complete: score {total_score}, rank {rank:?}")
                }
            }
        }

        match sim.phase() {
            StagePhase::Complete | StagePhase::TimedOut => {
                sim.next_stage()?;
                pilot.reset(sim.time());
            }
            StagePhase::GameOver => break,
            StagePhase::Setup | StagePhase::Running => {}
        }
    }

    log::info!(
        "Session over after {} ticks, score {}, {} of {} stages cleared",
        sim.tick_count(),
        sim.stage().score(),
        sim.stage().stages_cleared(),
        sim.settings().stages.len()
    );
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Water Maze (native autopilot) starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is water_maze::web, this is just to satisfy the compiler
}
