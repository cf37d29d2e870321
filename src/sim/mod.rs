//! Deterministic simulation module
//!
//! All gameplay logic lives here:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by body handle and droplet id)
//! - No rendering or platform dependencies

pub mod body;
pub mod droplets;
pub mod input;
pub mod maze;
pub mod rotation;
pub mod scale;
pub mod schedule;
pub mod stage;
pub mod state;
pub mod tick;

pub use body::{MazeBody, MazeCompound, MazeLayout};
pub use droplets::{Droplet, DropletId, DropletPool, MazeLock, PlayBounds};
pub use input::{InputEvent, InputQueue};
pub use maze::{Cell, Grid, generate};
pub use rotation::{RotationState, RotationSync};
pub use scale::{Scale, ScaleRegion, WorldRect, points_for_elapsed};
pub use schedule::{Deferred, Scheduler, Task};
pub use stage::{SimEvent, StageController, StagePhase};
pub use state::Simulation;
pub use tick::{Runner, tick};
