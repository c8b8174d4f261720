use serde::Serialize;

/// Session supervisor state machine.
///
/// State transitions:
/// ```text
/// idle → probing → active
///   ↑       │        │
///   └───────┘        ├→ probing   (selection changed, route closed first)
///                    ↓
///               torn_down         (client went stale; terminal)
/// ```
/// `idle` and `probing` sessions that go stale are torn down as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Idle,
    Probing,
    Active,
    TornDown,
}

impl SupervisorState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TornDown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Active => "active",
            Self::TornDown => "torn_down",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_torn_down_is_terminal() {
        assert!(SupervisorState::TornDown.is_terminal());
        assert!(!SupervisorState::Active.is_terminal());
        assert!(!SupervisorState::Idle.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&SupervisorState::TornDown).unwrap();
        assert_eq!(json, "\"torn_down\"");
    }
}
