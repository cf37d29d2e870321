//! Time-deferred tasks
//!
//! Stage sequencing (spawn, monitoring) and release nudges run a little
//! after the moment they are requested. Each task remembers the stage epoch
//! it was scheduled in so a task outliving its stage turns into a no-op.

use super::droplets::DropletId;

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Fill the maze with the stage's initial droplets
    SpawnDroplets,
    /// Start checking the scale for resting droplets
    StartMonitoring,
    /// Push just-released droplets so they fall right away
    Nudge(Vec<DropletId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deferred {
    /// Simulation time the task becomes due (s)
    pub due: f64,
    pub epoch: u32,
    pub task: Task,
}

/// Pending tasks in due order (ties in scheduling order)
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pending: Vec<Deferred>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: f64, delay: f32, epoch: u32, task: Task) {
        let due = now + f64::from(delay.max(0.0));
        let at = self.pending.partition_point(|d| d.due <= due);
        self.pending.insert(at, Deferred { due, epoch, task });
    }

    /// Remove and return every task due at `now`
    pub fn take_due(&mut self, now: f64) -> Vec<Deferred> {
        let split = self.pending.partition_point(|d| d.due <= now);
        self.pending.drain(..split).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_come_due_in_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(0.0, 1.0, 1, Task::StartMonitoring);
        scheduler.schedule(0.0, 0.4, 1, Task::SpawnDroplets);
        scheduler.schedule(0.0, 0.4, 1, Task::Nudge(vec![DropletId(3)]));

        assert!(scheduler.take_due(0.3).is_empty());
        let due = scheduler.take_due(0.5);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].task, Task::SpawnDroplets);
        assert_eq!(due[1].task, Task::Nudge(vec![DropletId(3)]));
        assert_eq!(scheduler.len(), 1);

        let due = scheduler.take_due(1.0);
        assert_eq!(due[0].task, Task::StartMonitoring);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_negative_delay_is_due_now() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(2.0, -1.0, 7, Task::SpawnDroplets);
        let due = scheduler.take_due(2.0);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].epoch, 7);
    }
}
