//! Stage progression and scoring
//!
//! Setup -> Running -> Complete | TimedOut -> Setup (next stage) ... GameOver.
//! Pure bookkeeping: the simulation context does the physics side of each
//! transition and feeds captures and elapsed time in here.

use serde::{Deserialize, Serialize};

use super::scale::points_for_elapsed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StagePhase {
    /// Maze, scale and droplets being (re)built
    Setup,
    /// Timer and monitoring active
    Running,
    /// Target weight reached in time
    Complete,
    /// Time limit hit first
    TimedOut,
    /// Past the final stage
    GameOver,
}

/// Notifications for the host UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimEvent {
    #[serde(rename_all = "camelCase")]
    WeightChanged { weight: u32 },
    #[serde(rename_all = "camelCase")]
    StageComplete { elapsed: f32, weight: u32 },
    #[serde(rename_all = "camelCase")]
    StageTimeout { weight: u32 },
    #[serde(rename_all = "camelCase")]
    GameComplete { total_score: u64, rank: Option<usize> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageController {
    /// Zero-based stage index
    index: usize,
    phase: StagePhase,
    /// Bumped on every stage start; deferred tasks compare against it
    epoch: u32,
    /// Simulation time the current stage started (s)
    started_at: f64,
    monitoring: bool,
    score: u64,
    stages_cleared: u32,
}

impl Default for StageController {
    fn default() -> Self {
        Self::new()
    }
}

impl StageController {
    pub fn new() -> Self {
        Self {
            index: 0,
            phase: StagePhase::Setup,
            epoch: 0,
            started_at: 0.0,
            monitoring: false,
            score: 0,
            stages_cleared: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// One-based stage number for display
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn phase(&self) -> StagePhase {
        self.phase
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn stages_cleared(&self) -> u32 {
        self.stages_cleared
    }

    pub fn is_running(&self) -> bool {
        self.phase == StagePhase::Running
    }

    pub fn is_monitoring(&self) -> bool {
        self.is_running() && self.monitoring
    }

    /// True if a task scheduled in `epoch` may still act
    pub fn accepts(&self, epoch: u32) -> bool {
        self.epoch == epoch && self.is_running()
    }

    pub fn elapsed(&self, now: f64) -> f32 {
        (now - self.started_at).max(0.0) as f32
    }

    /// Setup -> Running; returns the new epoch
    pub fn begin(&mut self, now: f64) -> u32 {
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = StagePhase::Running;
        self.started_at = now;
        self.monitoring = false;
        log::info!("Stage {} started (epoch {})", self.number(), self.epoch);
        self.epoch
    }

    pub fn start_monitoring(&mut self) {
        if self.is_running() {
            self.monitoring = true;
            log::debug!("Stage {} monitoring scale", self.number());
        }
    }

    /// Score newly captured units and check the target.
    ///
    /// `weight` is the scale's total after the capture. Completion fires
    /// once; later calls after the stage ended are ignored.
    pub fn record_capture(
        &mut self,
        units: u32,
        weight: u32,
        target: u32,
        now: f64,
    ) -> Vec<SimEvent> {
        if units == 0 || !self.is_running() {
            return Vec::new();
        }
        let elapsed = self.elapsed(now);
        self.score += points_for_elapsed(elapsed) * u64::from(units);

        let mut events = vec![SimEvent::WeightChanged { weight }];
        if weight >= target {
            self.phase = StagePhase::Complete;
            self.stages_cleared += 1;
            log::info!(
                "Stage {} complete: weight {} in {:.1}s, score {}",
                self.number(),
                weight,
                elapsed,
                self.score
            );
            events.push(SimEvent::StageComplete { elapsed, weight });
        }
        events
    }

    /// Check the stage clock; on timeout adds the consolation points
    pub fn poll_timeout(&mut self, weight: u32, limit: f32, now: f64) -> Option<SimEvent> {
        if !self.is_running() || self.elapsed(now) < limit {
            return None;
        }
        self.phase = StagePhase::TimedOut;
        self.score += u64::from(weight);
        log::info!(
            "Stage {} timed out with weight {}, score {}",
            self.number(),
            weight,
            self.score
        );
        Some(SimEvent::StageTimeout { weight })
    }

    /// Complete/TimedOut -> Setup of the next stage, or GameOver after the
    /// last one. Returns the next stage index, `None` otherwise.
    pub fn advance(&mut self, stage_count: usize) -> Option<usize> {
        if !matches!(self.phase, StagePhase::Complete | StagePhase::TimedOut) {
            return None;
        }
        if self.index + 1 >= stage_count {
            self.phase = StagePhase::GameOver;
            log::info!("Game over, final score {}", self.score);
            return None;
        }
        self.index += 1;
        self.phase = StagePhase::Setup;
        Some(self.index)
    }

    /// Back to stage one with a fresh score
    pub fn restart(&mut self) {
        self.index = 0;
        self.phase = StagePhase::Setup;
        self.monitoring = false;
        self.score = 0;
        self.stages_cleared = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_fires_once() {
        let mut stage = StageController::new();
        stage.begin(0.0);
        stage.start_monitoring();

        let mut completions = 0;
        for weight in 1..=25 {
            for event in stage.record_capture(1, weight, 20, 5.0) {
                if let SimEvent::StageComplete { weight, .. } = event {
                    assert_eq!(weight, 20);
                    completions += 1;
                }
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(stage.phase(), StagePhase::Complete);
        // 20 units inside the first ten seconds
        assert_eq!(stage.score(), 80);
    }

    #[test]
    fn test_points_depend_on_elapsed() {
        let mut stage = StageController::new();
        stage.begin(100.0);
        stage.record_capture(1, 1, 10, 108.0);
        stage.record_capture(1, 2, 10, 145.0);
        stage.record_capture(1, 3, 10, 175.0);
        assert_eq!(stage.score(), 4 + 2 + 1);
    }

    #[test]
    fn test_timeout_adds_weight() {
        let mut stage = StageController::new();
        stage.begin(0.0);
        assert!(stage.poll_timeout(7, 90.0, 89.9).is_none());
        assert_eq!(
            stage.poll_timeout(7, 90.0, 90.0),
            Some(SimEvent::StageTimeout { weight: 7 })
        );
        assert_eq!(stage.score(), 7);
        assert!(stage.poll_timeout(7, 90.0, 95.0).is_none());
        assert_eq!(stage.stages_cleared(), 0);
    }

    #[test]
    fn test_stale_epoch_rejected() {
        let mut stage = StageController::new();
        let first = stage.begin(0.0);
        assert!(stage.accepts(first));
        stage.poll_timeout(0, 1.0, 2.0);
        assert!(!stage.accepts(first));

        stage.advance(9);
        let second = stage.begin(3.0);
        assert!(!stage.accepts(first));
        assert!(stage.accepts(second));
    }

    #[test]
    fn test_advance_to_game_over() {
        let mut stage = StageController::new();
        assert_eq!(stage.advance(2), None);
        stage.begin(0.0);
        stage.record_capture(1, 1, 1, 1.0);
        assert_eq!(stage.advance(2), Some(1));
        stage.begin(2.0);
        stage.poll_timeout(0, 1.0, 5.0);
        assert_eq!(stage.advance(2), None);
        assert_eq!(stage.phase(), StagePhase::GameOver);
    }

    #[test]
    fn test_restart_resets_score_and_stage() {
        let mut stage = StageController::new();
        stage.begin(0.0);
        stage.record_capture(3, 3, 3, 1.0);
        stage.advance(9);
        stage.restart();
        assert_eq!(stage.index(), 0);
        assert_eq!(stage.score(), 0);
        assert_eq!(stage.phase(), StagePhase::Setup);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&SimEvent::GameComplete {
            total_score: 12,
            rank: Some(1),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"gameComplete","totalScore":12,"rank":1}"#);
    }
}
