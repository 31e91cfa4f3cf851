//! Cyclic navigation over the project visit history
//!
//! History is kept most-recent-first. "Prev" walks toward older visits (higher
//! index), "next" toward newer ones, both wrapping around. This module only
//! plans the walk; `ProjectRegistry` validates candidates and commits.

use serde::Serialize;

use super::validate::PathCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleDirection {
    Prev,
    Next,
}

impl CycleDirection {
    fn step(self) -> isize {
        match self {
            CycleDirection::Prev => 1,
            CycleDirection::Next => -1,
        }
    }
}

/// Why a candidate was passed over while cycling. Logged, never shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleSkip {
    InvalidPath(PathCheck),
    /// Removed from the active set while its path was being checked
    NoLongerActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    /// History restricted to active ids, original order kept
    pub valid_history: Vec<String>,
    /// Position of the current project in `valid_history` (0 when absent)
    pub current_position: usize,
    /// `(position, id)` pairs in the order they should be tried
    pub candidates: Vec<(usize, String)>,
}

/// Drop ids that are no longer active (and repeats), keeping order
pub fn filter_history(history: &[String], is_active: impl Fn(&str) -> bool) -> Vec<String> {
    let mut valid: Vec<String> = Vec::with_capacity(history.len());
    for id in history {
        if is_active(id) && !valid.contains(id) {
            valid.push(id.clone());
        }
    }
    valid
}

/// Plan a cycle step. `None` when fewer than two active entries remain.
pub fn plan_cycle(
    history: &[String],
    is_active: impl Fn(&str) -> bool,
    current_id: Option<&str>,
    direction: CycleDirection,
) -> Option<CyclePlan> {
    let valid_history = filter_history(history, is_active);
    let len = valid_history.len();
    if len <= 1 {
        return None;
    }

    let current_position = current_id
        .and_then(|id| valid_history.iter().position(|h| h == id))
        .unwrap_or(0);

    let candidates = (1..=len)
        .map(|offset| wrap_index(current_position, direction.step() * offset as isize, len))
        .filter(|&idx| Some(valid_history[idx].as_str()) != current_id)
        .map(|idx| (idx, valid_history[idx].clone()))
        .collect();

    Some(CyclePlan {
        valid_history,
        current_position,
        candidates,
    })
}

/// `(position + delta) mod len`, correct for negative intermediates
fn wrap_index(position: usize, delta: isize, len: usize) -> usize {
    (position as isize + delta).rem_euclid(len as isize) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn first_candidate(plan: &Option<CyclePlan>) -> Option<&str> {
        plan.as_ref()
            .and_then(|p| p.candidates.first())
            .map(|(_, id)| id.as_str())
    }

    #[test]
    fn test_wrap_index_handles_negatives() {
        assert_eq!(wrap_index(0, -1, 3), 2);
        assert_eq!(wrap_index(2, 1, 3), 0);
        assert_eq!(wrap_index(1, -4, 3), 0);
    }

    #[test]
    fn test_prev_and_next_from_middle() {
        let history = ids(&["A", "B", "C"]);

        let prev = plan_cycle(&history, |_| true, Some("B"), CycleDirection::Prev);
        assert_eq!(first_candidate(&prev), Some("C"));

        let next = plan_cycle(&history, |_| true, Some("B"), CycleDirection::Next);
        assert_eq!(first_candidate(&next), Some("A"));
    }

    #[test]
    fn test_wraps_at_both_ends() {
        let history = ids(&["A", "B", "C"]);

        let prev = plan_cycle(&history, |_| true, Some("C"), CycleDirection::Prev);
        assert_eq!(first_candidate(&prev), Some("A"));

        let next = plan_cycle(&history, |_| true, Some("A"), CycleDirection::Next);
        assert_eq!(first_candidate(&next), Some("C"));
    }

    #[test]
    fn test_candidate_order_excludes_current() {
        let history = ids(&["A", "B", "C"]);
        let plan = plan_cycle(&history, |_| true, Some("B"), CycleDirection::Prev).unwrap();
        let order: Vec<&str> = plan.candidates.iter().map(|(_, id)| id.as_str()).collect();
        assert_eq!(order, vec!["C", "A"]);
        assert_eq!(plan.candidates[0].0, 2);
    }

    #[test]
    fn test_inactive_ids_are_filtered_lazily() {
        let history = ids(&["A", "gone", "B", "C"]);
        let plan = plan_cycle(&history, |id| id != "gone", Some("B"), CycleDirection::Prev).unwrap();
        assert_eq!(plan.valid_history, ids(&["A", "B", "C"]));
        assert_eq!(plan.current_position, 1);
        assert_eq!(plan.candidates[0], (2, "C".to_string()));
    }

    #[test]
    fn test_current_missing_treated_as_position_zero() {
        let history = ids(&["A", "B", "C"]);
        let plan = plan_cycle(&history, |_| true, None, CycleDirection::Prev).unwrap();
        assert_eq!(plan.current_position, 0);
        let order: Vec<&str> = plan.candidates.iter().map(|(_, id)| id.as_str()).collect();
        // Without a current project every entry is a candidate, A last
        assert_eq!(order, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_fewer_than_two_is_noop() {
        assert!(plan_cycle(&ids(&["A"]), |_| true, Some("A"), CycleDirection::Next).is_none());
        assert!(plan_cycle(&ids(&["A", "B"]), |id| id == "A", Some("A"), CycleDirection::Next).is_none());
        assert!(plan_cycle(&[], |_| true, None, CycleDirection::Prev).is_none());
    }

    #[test]
    fn test_duplicates_collapse_to_first_visit() {
        assert_eq!(filter_history(&ids(&["A", "B", "A"]), |_| true), ids(&["A", "B"]));
    }
}
