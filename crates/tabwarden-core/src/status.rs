//! Status projection.
//!
//! Pure mapping from tracked state to a displayable indicator. UI layers
//! pick assets; the core only names the state.

use serde::{Deserialize, Serialize};

use crate::session::{DisplayState, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusIcon {
    /// Nothing tracked.
    Neutral,
    Pending,
    Productive,
    NonProductive,
    Blocked,
}

pub fn project(session: Option<&SessionState>) -> StatusIcon {
    match session {
        None => StatusIcon::Neutral,
        Some(s) => match s.display {
            DisplayState::Pending => StatusIcon::Pending,
            DisplayState::Productive => StatusIcon::Productive,
            DisplayState::NonProductive => StatusIcon::NonProductive,
            DisplayState::Blocked => StatusIcon::Blocked,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_session_projects_neutral() {
        assert_eq!(project(None), StatusIcon::Neutral);
    }

    #[test]
    fn display_states_map_one_to_one() {
        let mut s = SessionState {
            tab_id: 1,
            url: "https://example.com/".to_string(),
            domain: "example.com".to_string(),
            title: String::new(),
            started_at_ms: 0,
            last_tick_at_ms: None,
            is_analyzing: true,
            is_productive: false,
            score: 0,
            categories: vec![],
            explanation: String::new(),
            display: DisplayState::Pending,
        };
        assert_eq!(project(Some(&s)), StatusIcon::Pending);
        s.display = DisplayState::Blocked;
        assert_eq!(project(Some(&s)), StatusIcon::Blocked);
    }
}
