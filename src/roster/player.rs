//! Player records and default roster generation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One numbered participant
///
/// `display_ref` is an opaque reference for the viewer frontend (an image
/// URL in practice); nothing in this crate interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// 1-based participant number, fixed at roster creation
    pub number: u32,
    /// Liveness flag; the only field core logic mutates
    pub is_alive: bool,
    /// Opaque display reference, carried through untouched
    #[serde(default)]
    pub display_ref: String,
}

impl Player {
    /// Create an alive player with the given number
    pub fn alive(number: u32) -> Self {
        Self {
            number,
            is_alive: true,
            display_ref: String::new(),
        }
    }
}

/// Generate the default all-alive roster, numbered `1..=count` with no gaps
pub fn default_roster(count: u32) -> BTreeMap<u32, Player> {
    (1..=count).map(|n| (n, Player::alive(n))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_shape() {
        for count in [0, 1, 5, 456, 457] {
            let roster = default_roster(count);
            assert_eq!(roster.len(), count as usize);
            for (expected, (number, player)) in (1..=count).zip(roster.iter()) {
                assert_eq!(*number, expected);
                assert_eq!(player.number, expected);
                assert!(player.is_alive);
            }
        }
    }

    #[test]
    fn test_player_serialized_shape() {
        let player = Player::alive(3);
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "number": 3, "is_alive": true, "display_ref": "" })
        );
    }

    #[test]
    fn test_player_display_ref_defaults_when_absent() {
        let player: Player = serde_json::from_str(r#"{"number":9,"is_alive":false}"#).unwrap();
        assert_eq!(player.number, 9);
        assert!(!player.is_alive);
        assert!(player.display_ref.is_empty());
    }
}
