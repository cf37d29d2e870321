//! High score ranking
//!
//! In-memory only, keeps the top 5 final scores of the session.

use serde::{Deserialize, Serialize};

/// Maximum number of ranked scores to keep
pub const MAX_HIGH_SCORES: usize = 5;

/// A single ranking entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Final game score
    pub score: u64,
    /// Stages cleared before the timer ran out
    pub stages_cleared: u32,
}

/// Session ranking, sorted descending by score
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Check if a score would enter the ranking
    pub fn qualifies(&self, score: u64) -> bool {
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Add a score; returns the rank achieved (1-indexed) or None
    pub fn add_score(&mut self, score: u64, stages_cleared: u32) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }

        let entry = HighScoreEntry {
            score,
            stages_cleared,
        };

        // Equal scores keep the earlier entry ahead
        let pos = self.entries.iter().position(|e| score > e.score);
        let rank = match pos {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };

        self.entries.truncate(MAX_HIGH_SCORES);
        log::info!("Score {} ranked #{}", score, rank);

        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scores in rank order
    pub fn scores(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_top_five_descending() {
        let mut scores = HighScores::new();
        for s in [40, 10, 70, 20, 90, 30, 50] {
            scores.add_score(s, 9);
        }
        assert_eq!(scores.scores(), vec![90, 70, 50, 40, 30]);
    }

    #[test]
    fn test_rank_and_rejection() {
        let mut scores = HighScores::new();
        assert!(scores.is_empty());
        assert_eq!(scores.add_score(0, 0), Some(1));
        for s in [5, 6, 7, 8] {
            scores.add_score(s, 1);
        }
        // Full; zero no longer qualifies
        assert!(!scores.qualifies(0));
        assert_eq!(scores.add_score(0, 0), None);
        assert_eq!(scores.add_score(7, 1), Some(3));
        assert_eq!(scores.add_score(100, 9), Some(1));
    }

    #[test]
    fn test_ties_keep_earlier_entry_first() {
        let mut scores = HighScores::new();
        scores.add_score(10, 1);
        assert_eq!(scores.add_score(10, 2), Some(2));
        assert_eq!(scores.entries[0].stages_cleared, 1);
    }
}
