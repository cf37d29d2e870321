//! Play area, physics and stage settings
//!
//! Everything tunable lives here so a host can override it from JSON.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_MAZE_SIZE, MIN_MAZE_SIZE};
use crate::error::{Result, SimError};

/// Per-stage tuning, immutable once a stage starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    /// Grid cells per side (odd, 3..=101)
    pub maze_size: usize,
    /// Droplets spawned when the stage starts
    pub initial_droplet_count: usize,
    /// Weight needed on the scale to clear the stage
    pub target_weight: u32,
    /// Scale pan width in cell units
    pub scale_pan_width: f32,
}

impl StageConfig {
    pub const fn new(
        maze_size: usize,
        initial_droplet_count: usize,
        target_weight: u32,
        scale_pan_width: f32,
    ) -> Self {
        Self {
            maze_size,
            initial_droplet_count,
            target_weight,
            scale_pan_width,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.maze_size % 2 == 0 || !(MIN_MAZE_SIZE..=MAX_MAZE_SIZE).contains(&self.maze_size) {
            return Err(SimError::InvalidConfig(format!(
                "maze size {} must be odd and within {MIN_MAZE_SIZE}..={MAX_MAZE_SIZE}",
                self.maze_size
            )));
        }
        if self.target_weight == 0 {
            return Err(SimError::InvalidConfig("target weight must be positive".into()));
        }
        if !self.scale_pan_width.is_finite() || self.scale_pan_width <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "scale pan width {} must be positive",
                self.scale_pan_width
            )));
        }
        Ok(())
    }

    /// Width of the entry gap punched into the maze's top row
    pub fn opening_width(&self) -> usize {
        if self.maze_size >= 25 {
            5
        } else if self.maze_size >= 17 {
            3
        } else {
            1
        }
    }
}

/// The nine stages of a full game
pub const DEFAULT_STAGES: [StageConfig; 9] = [
    // Stages 1-3: small maze
    StageConfig::new(11, 100, 20, 25.0),
    StageConfig::new(11, 85, 30, 25.0),
    StageConfig::new(11, 70, 40, 25.0),
    // Stages 4-6: medium maze, narrowing pan
    StageConfig::new(17, 200, 40, 25.0),
    StageConfig::new(17, 150, 50, 21.0),
    StageConfig::new(17, 100, 60, 17.0),
    // Stages 7-9: large maze
    StageConfig::new(25, 400, 60, 23.0),
    StageConfig::new(25, 310, 70, 19.0),
    StageConfig::new(25, 250, 80, 15.0),
];

/// Simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Play area ===
    /// Visible play area width (px)
    pub width: f32,
    /// Visible play area height (px)
    pub height: f32,

    // === Maze geometry ===
    /// Corridor (odd row/column) thickness (px)
    pub corridor_width: f32,
    /// Wall (even row/column) thickness (px)
    pub wall_thickness: f32,
    /// Corridor width divided by this gives the droplet radius
    pub droplet_radius_ratio: f32,

    // === Physics ===
    /// Gravity in px/s²
    pub gravity: f32,
    /// Droplets slower than this (px/s) count as resting
    pub rest_speed: f32,
    /// Downward force applied to wake droplets after release
    pub nudge_force: f32,
    /// Delay before the release nudge (s)
    pub nudge_delay: f32,

    // === Droplets ===
    /// Hard cap on live droplets
    pub max_droplets: usize,
    /// Droplets this far outside the play area are pruned (px)
    pub cleanup_margin: f32,
    /// Ticks between housekeeping passes
    pub cleanup_interval_ticks: u64,

    // === Stage timing ===
    /// Stage time limit (s)
    pub stage_time_limit: f32,
    /// How often the stage timer is polled (s)
    pub timer_poll_interval: f32,
    /// Delay from stage setup to spawning droplets (s)
    pub spawn_delay: f32,
    /// Delay from stage setup to scale monitoring (s)
    pub monitor_delay: f32,

    // === Stages ===
    pub stages: Vec<StageConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 800.0,

            corridor_width: 25.0,
            wall_thickness: 7.0,
            droplet_radius_ratio: 5.0,

            gravity: 1000.0,
            rest_speed: 60.0,
            nudge_force: 60.0,
            nudge_delay: 0.01,

            max_droplets: 1000,
            cleanup_margin: 300.0,
            cleanup_interval_ticks: 60,

            stage_time_limit: 90.0,
            timer_poll_interval: 0.1,
            spawn_delay: 0.4,
            monitor_delay: 1.0,

            stages: DEFAULT_STAGES.to_vec(),
        }
    }
}

impl Settings {
    /// World point the maze is pinned to: centered, 2/5 down the play area
    pub fn maze_anchor(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height * 2.0 / 5.0)
    }

    pub fn droplet_radius(&self) -> f32 {
        self.corridor_width / self.droplet_radius_ratio
    }

    pub fn gravity_vec(&self) -> Vec2 {
        Vec2::new(0.0, self.gravity)
    }

    pub fn stage(&self, index: usize) -> Option<&StageConfig> {
        self.stages.get(index)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("corridor_width", self.corridor_width),
            ("wall_thickness", self.wall_thickness),
            ("droplet_radius_ratio", self.droplet_radius_ratio),
            ("stage_time_limit", self.stage_time_limit),
            ("timer_poll_interval", self.timer_poll_interval),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.max_droplets == 0 {
            return Err(SimError::InvalidConfig("max_droplets must be positive".into()));
        }
        if self.stages.is_empty() {
            return Err(SimError::InvalidConfig("at least one stage is required".into()));
        }
        self.stages.iter().try_for_each(StageConfig::validate)
    }

    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        log::info!("Loaded settings ({} stages)", settings.stages.len());
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
