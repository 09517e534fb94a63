//! Inbound operator messages
//!
//! The viewer channel carries JSON both ways. Inbound messages declare an
//! `action`; the keyword is matched as text so that an unknown action is a
//! logged no-op rather than a parse failure of the session.

use serde::Deserialize;

/// One inbound operator message
#[derive(Debug, Deserialize)]
pub struct ClientRequest {
    /// Action keyword: `eliminate`, `revive`, `arm`, `disarm`
    pub action: String,
    /// Player numbers the action applies to; only eliminate/revive use it
    #[serde(default)]
    pub numbers: Vec<u32>,
}

/// Recognized operator actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Eliminate,
    Revive,
    Arm,
    Disarm,
}

impl Action {
    /// Parse an action keyword; `None` for anything unrecognized
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "eliminate" => Some(Action::Eliminate),
            "revive" => Some(Action::Revive),
            "arm" => Some(Action::Arm),
            "disarm" => Some(Action::Disarm),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eliminate_with_numbers() {
        let request: ClientRequest =
            serde_json::from_str(r#"{"action":"eliminate","numbers":[2,4]}"#).unwrap();
        assert_eq!(request.action, "eliminate");
        assert_eq!(request.numbers, vec![2, 4]);
        assert_eq!(Action::parse(&request.action), Some(Action::Eliminate));
    }

    #[test]
    fn test_parse_arm_without_numbers() {
        let request: ClientRequest = serde_json::from_str(r#"{"action":"arm"}"#).unwrap();
        assert!(request.numbers.is_empty());
        assert_eq!(Action::parse(&request.action), Some(Action::Arm));
    }

    #[test]
    fn test_unknown_action_keyword() {
        let request: ClientRequest =
            serde_json::from_str(r#"{"action":"self_destruct"}"#).unwrap();
        assert_eq!(Action::parse(&request.action), None);
    }

    #[test]
    fn test_missing_action_is_a_parse_error() {
        assert!(serde_json::from_str::<ClientRequest>(r#"{"numbers":[1]}"#).is_err());
    }
}
