//! Normalized pointer input
//!
//! Hosts push raw pointer events in world coordinates; the tick drains them
//! in arrival order and turns them into rotation transitions.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Press; starts a rotation only when it lands on the maze
    PointerDown(Vec2),
    PointerMove(Vec2),
    /// Release ending the drag
    PointerUp(Vec2),
    /// Release seen anywhere (window blur, missed drag end)
    PointerCancel,
}

impl InputEvent {
    pub fn position(&self) -> Option<Vec2> {
        match *self {
            InputEvent::PointerDown(p) | InputEvent::PointerMove(p) | InputEvent::PointerUp(p) => {
                Some(p)
            }
            InputEvent::PointerCancel => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event; ones carrying non-finite coordinates are dropped
    pub fn push(&mut self, event: InputEvent) -> bool {
        if event.position().is_some_and(|p| !p.is_finite()) {
            log::warn!("Dropped pointer event with invalid coordinates: {event:?}");
            return false;
        }
        self.events.push_back(event);
        true
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
