use super::{SelectionError, SelectionEvent, SelectionResult, SelectionState};

/// Transitions kept for debugging; older entries are dropped.
const HISTORY_LIMIT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTransition {
    pub from: SelectionState,
    pub event: SelectionEvent,
    pub to: SelectionState,
}

#[derive(Debug, Default)]
pub struct SelectionMachine {
    state: SelectionState,
    transition_history: Vec<SelectionTransition>,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn can_transition(&self, event: SelectionEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: SelectionEvent) -> Option<SelectionState> {
        use SelectionEvent::*;
        match (self.state, event) {
            (SelectionState::Idle, Start) => Some(SelectionState::Selecting),
            (SelectionState::Selecting, Commit) => Some(SelectionState::Committed),
            (SelectionState::Selecting, Cancel) => Some(SelectionState::Cancelled),
            (SelectionState::Committed, Reset) => Some(SelectionState::Idle),
            (SelectionState::Cancelled, Reset) => Some(SelectionState::Idle),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: SelectionEvent) -> SelectionResult<SelectionState> {
        tracing::debug!(from = ?self.state, event = ?event, "request selection transition");
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid selection transition requested");
            SelectionError::InvalidTransition { from, event }
        })?;

        if self.transition_history.len() == HISTORY_LIMIT {
            self.transition_history.remove(0);
        }
        self.transition_history.push(SelectionTransition {
            from: self.state,
            event,
            to: next,
        });
        self.state = next;

        Ok(self.state)
    }
}

#[cfg(test)]
impl SelectionMachine {
    fn history(&self) -> &[SelectionTransition] {
        &self.transition_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_selecting_accepts_commit_and_cancel() {
        let mut machine = SelectionMachine::new();
        assert!(machine.can_transition(SelectionEvent::Start));
        assert!(!machine.can_transition(SelectionEvent::Commit));
        assert!(!machine.can_transition(SelectionEvent::Cancel));

        machine
            .transition(SelectionEvent::Start)
            .expect("idle -> selecting should transition");

        assert!(!machine.can_transition(SelectionEvent::Start));
        assert!(machine.can_transition(SelectionEvent::Commit));
        assert!(machine.can_transition(SelectionEvent::Cancel));
    }

    #[test]
    fn full_cycle_is_recorded_in_order() {
        let mut machine = SelectionMachine::new();
        for event in [
            SelectionEvent::Start,
            SelectionEvent::Cancel,
            SelectionEvent::Reset,
            SelectionEvent::Start,
            SelectionEvent::Commit,
            SelectionEvent::Reset,
        ] {
            machine.transition(event).expect("cycle should be valid");
        }

        assert_eq!(machine.state(), SelectionState::Idle);
        let visited: Vec<_> = machine.history().iter().map(|entry| entry.to).collect();
        assert_eq!(
            visited,
            vec![
                SelectionState::Selecting,
                SelectionState::Cancelled,
                SelectionState::Idle,
                SelectionState::Selecting,
                SelectionState::Committed,
                SelectionState::Idle,
            ]
        );
    }

    #[test]
    fn history_keeps_only_recent_transitions() {
        let mut machine = SelectionMachine::new();
        for _ in 0..10 {
            for event in [
                SelectionEvent::Start,
                SelectionEvent::Commit,
                SelectionEvent::Reset,
            ] {
                machine.transition(event).expect("cycle should be valid");
            }
        }

        assert_eq!(machine.history().len(), HISTORY_LIMIT);
        let last = machine.history().last().copied();
        assert_eq!(
            last,
            Some(SelectionTransition {
                from: SelectionState::Committed,
                event: SelectionEvent::Reset,
                to: SelectionState::Idle,
            })
        );
    }

    #[test]
    fn invalid_transition_leaves_state_and_history_alone() {
        let mut machine = SelectionMachine::new();

        let err = machine
            .transition(SelectionEvent::Commit)
            .expect_err("idle -> commit should fail");

        assert!(matches!(
            err,
            SelectionError::InvalidTransition {
                from: SelectionState::Idle,
                event: SelectionEvent::Commit
            }
        ));
        assert_eq!(machine.state(), SelectionState::Idle);
        assert!(machine.history().is_empty());
    }
}
