//! Strategy memory: per-goal and per-track statistics biasing future runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::close_loop::ReplanStrategy;
use super::orchestration::OrchestrationStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRecord {
    pub attempts: u32,
    pub successes: u32,
    pub replan_strategy: ReplanStrategy,
    pub replan_attempts: u32,
    pub dod_test_command: Option<String>,
    pub last_status: OrchestrationStatus,
    /// Completion-rate percentage of each past run, oldest first, feeding the
    /// `kpi-baseline-drop-threshold` DoD gate. Bounded so the file never grows unbounded.
    #[serde(default)]
    pub success_rate_history: Vec<f64>,
}

/// Bound on `GoalRecord::success_rate_history`; far beyond any configured baseline window.
const MAX_HISTORY_LEN: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackRecord {
    pub attempts: u32,
    pub successes: u32,
}

/// Single JSON document persisted under the workspace, rewritten atomically per run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrategyMemory {
    pub goals: HashMap<String, GoalRecord>,
    pub tracks: HashMap<String, TrackRecord>,
}

impl StrategyMemory {
    /// Normalizes a goal string to the signature used as a `goals` key:
    /// lowercased, whitespace-collapsed, non-word characters stripped.
    pub fn signature(goal: &str) -> String {
        let lowered = goal.to_lowercase();
        let mut out = String::with_capacity(lowered.len());
        let mut last_was_space = false;
        for ch in lowered.chars() {
            if ch.is_alphanumeric() {
                out.push(ch);
                last_was_space = false;
            } else if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        }
        out.trim().to_string()
    }

    pub fn record_for(&self, goal: &str) -> Option<&GoalRecord> {
        self.goals.get(&Self::signature(goal))
    }

    pub fn record_attempt(
        &mut self,
        goal: &str,
        status: OrchestrationStatus,
        strategy: ReplanStrategy,
        replan_attempts: u32,
        dod_test_command: Option<String>,
        completion_rate: f64,
    ) {
        let signature = Self::signature(goal);
        let entry = self.goals.entry(signature).or_insert_with(|| GoalRecord {
            attempts: 0,
            successes: 0,
            replan_strategy: strategy,
            replan_attempts,
            dod_test_command: dod_test_command.clone(),
            last_status: status,
            success_rate_history: Vec::new(),
        });
        entry.attempts += 1;
        if status == OrchestrationStatus::Completed {
            entry.successes += 1;
        }
        entry.replan_strategy = strategy;
        entry.replan_attempts = replan_attempts;
        entry.dod_test_command = dod_test_command;
        entry.last_status = status;
        entry.success_rate_history.push(completion_rate);
        if entry.success_rate_history.len() > MAX_HISTORY_LEN {
            let overflow = entry.success_rate_history.len() - MAX_HISTORY_LEN;
            entry.success_rate_history.drain(0..overflow);
        }
    }

    pub fn record_track(&mut self, track: &str, succeeded: bool) {
        let entry = self.tracks.entry(track.to_string()).or_default();
        entry.attempts += 1;
        if succeeded {
            entry.successes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_normalizes_whitespace_and_case() {
        assert_eq!(
            StrategyMemory::signature("  Build   Closed-Loop Orchestration! "),
            "build closed loop orchestration"
        );
    }

    #[test]
    fn record_attempt_increments_counts() {
        let mut memory = StrategyMemory::default();
        memory.record_attempt(
            "Build closed-loop orchestration",
            OrchestrationStatus::Completed,
            ReplanStrategy::Fixed,
            1,
            None,
            100.0,
        );
        let record = memory.record_for("build closed-loop orchestration").unwrap();
        assert_eq!(record.attempts, 1);
        assert_eq!(record.successes, 1);
        assert_eq!(record.success_rate_history, vec![100.0]);
    }

    #[test]
    fn success_rate_history_is_capped() {
        let mut memory = StrategyMemory::default();
        for _ in 0..60 {
            memory.record_attempt("goal", OrchestrationStatus::Completed, ReplanStrategy::Fixed, 0, None, 100.0);
        }
        let record = memory.record_for("goal").unwrap();
        assert_eq!(record.success_rate_history.len(), MAX_HISTORY_LEN);
    }

    #[test]
    fn record_track_tracks_success_rate() {
        let mut memory = StrategyMemory::default();
        memory.record_track("orchestration-runtime", true);
        memory.record_track("orchestration-runtime", false);
        let record = &memory.tracks["orchestration-runtime"];
        assert_eq!(record.attempts, 2);
        assert_eq!(record.successes, 1);
    }
}
