use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{GameError, GameResult};

/// Opaque ID types for type safety
pub type RoundId = String;
pub type CommentId = String;

/// Reserved comment id sent when the timer ran out with nothing picked.
/// Never a valid comment id in a round.
pub const NO_ANSWER: &str = "__no_answer__";

/// Minimum number of options a round must offer
pub const MIN_OPTIONS: usize = 2;

/// A candidate comment as shown before the guess (no popularity info)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommentOption {
    pub comment_id: CommentId,
    pub text: String,
}

/// One round of the game: a video and the comments to choose from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub round_id: RoundId,
    #[serde(rename = "videoLink")]
    pub media_reference: String,
    /// Seconds the player has to pick
    #[serde(rename = "duration")]
    pub time_budget: i64,
    pub options: Vec<CommentOption>,
}

impl Round {
    /// Reject rounds the timer or capture could not handle
    pub fn validate(&self) -> GameResult<()> {
        if self.time_budget <= 0 {
            return Err(GameError::InvalidBudget {
                budget: self.time_budget,
            });
        }

        if self.options.len() < MIN_OPTIONS {
            return Err(self.invalid(format!(
                "needs at least {} options, got {}",
                MIN_OPTIONS,
                self.options.len()
            )));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if option.comment_id.is_empty() {
                return Err(self.invalid("empty comment id".to_string()));
            }
            if option.comment_id == NO_ANSWER {
                return Err(self.invalid(format!("comment id {} is reserved", NO_ANSWER)));
            }
            if !seen.insert(option.comment_id.as_str()) {
                return Err(self.invalid(format!("duplicate comment id {}", option.comment_id)));
            }
        }

        Ok(())
    }

    pub fn has_option(&self, comment_id: &str) -> bool {
        self.options.iter().any(|o| o.comment_id == comment_id)
    }

    fn invalid(&self, reason: String) -> GameError {
        GameError::InvalidRound {
            round_id: self.round_id.clone(),
            reason,
        }
    }
}

/// A comment after the reveal, with its true popularity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevealedOption {
    pub comment_id: CommentId,
    pub text: String,
    #[serde(rename = "likes")]
    pub like_count: u64,
    #[serde(rename = "isTop")]
    pub is_top_comment: bool,
}

/// Scoring result for one guess
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_correct: bool,
    pub selected_option_id: String,
    #[serde(rename = "options")]
    pub revealed_options: Vec<RevealedOption>,
}

impl Verdict {
    /// Check the verdict is a complete reveal of `round` for the guess `sent`
    pub fn validate_against(&self, round: &Round, sent: &Choice) -> GameResult<()> {
        let invalid = |reason: String| GameError::InvalidVerdict {
            round_id: round.round_id.clone(),
            reason,
        };

        let tops = self
            .revealed_options
            .iter()
            .filter(|o| o.is_top_comment)
            .count();
        if tops != 1 {
            return Err(invalid(format!("expected exactly one top comment, got {}", tops)));
        }

        let revealed: HashSet<&str> = self
            .revealed_options
            .iter()
            .map(|o| o.comment_id.as_str())
            .collect();
        let offered: HashSet<&str> = round.options.iter().map(|o| o.comment_id.as_str()).collect();
        if revealed.len() != self.revealed_options.len() || revealed != offered {
            return Err(invalid(
                "revealed comments do not match the round's options".to_string(),
            ));
        }

        if self.selected_option_id != sent.wire_id() {
            return Err(invalid(format!(
                "selection {} does not match submitted {}",
                self.selected_option_id,
                sent.wire_id()
            )));
        }

        Ok(())
    }

    pub fn top_comment(&self) -> Option<&RevealedOption> {
        self.revealed_options.iter().find(|o| o.is_top_comment)
    }
}

/// What the player ended up submitting for a round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Comment(CommentId),
    /// Time ran out with nothing picked
    NoAnswer,
}

impl Choice {
    /// Value sent as `commentId` to the scoring endpoint
    pub fn wire_id(&self) -> &str {
        match self {
            Choice::Comment(id) => id,
            Choice::NoAnswer => NO_ANSWER,
        }
    }

    pub fn from_wire(id: &str) -> Self {
        if id == NO_ANSWER {
            Choice::NoAnswer
        } else {
            Choice::Comment(id.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundPhase {
    Active,
    AwaitingVerdict,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    #[default]
    Briefing,
    Playing { round_phase: RoundPhase },
    Won,
    Lost,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Won | SessionPhase::Lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(id: &str, budget: i64, comments: &[&str]) -> Round {
        Round {
            round_id: id.to_string(),
            media_reference: format!("https://www.youtube.com/watch?v={}", id),
            time_budget: budget,
            options: comments
                .iter()
                .map(|c| CommentOption {
                    comment_id: c.to_string(),
                    text: format!("text of {}", c),
                })
                .collect(),
        }
    }

    fn verdict(selected: &str, top: &str, ids: &[&str]) -> Verdict {
        Verdict {
            is_correct: selected == top,
            selected_option_id: selected.to_string(),
            revealed_options: ids
                .iter()
                .map(|c| RevealedOption {
                    comment_id: c.to_string(),
                    text: format!("text of {}", c),
                    like_count: if *c == top { 100 } else { 1 },
                    is_top_comment: *c == top,
                })
                .collect(),
        }
    }

    #[test]
    fn test_round_wire_format() {
        let json = r#"{
            "roundId": "r1",
            "videoLink": "https://www.youtube.com/watch?v=abc",
            "duration": 15,
            "options": [
                {"commentId": "c1", "text": "first"},
                {"commentId": "c2", "text": "second"}
            ]
        }"#;
        let round: Round = serde_json::from_str(json).unwrap();
        assert_eq!(round.time_budget, 15);
        assert_eq!(round.media_reference, "https://www.youtube.com/watch?v=abc");
        assert_eq!(round.options[1].comment_id, "c2");
        assert!(round.validate().is_ok());
    }

    #[test]
    fn test_verdict_wire_format() {
        let json = r#"{
            "isCorrect": false,
            "selectedOptionId": "c2",
            "options": [
                {"commentId": "c1", "text": "first", "likes": 4200, "isTop": true},
                {"commentId": "c2", "text": "second", "likes": 12, "isTop": false}
            ]
        }"#;
        let verdict: Verdict = serde_json::from_str(json).unwrap();
        assert!(!verdict.is_correct);
        assert_eq!(verdict.top_comment().unwrap().like_count, 4200);
    }

    #[test]
    fn test_round_rejects_non_positive_budget() {
        assert!(matches!(
            round("r", 0, &["a", "b"]).validate(),
            Err(GameError::InvalidBudget { budget: 0 })
        ));
        assert!(matches!(
            round("r", -3, &["a", "b"]).validate(),
            Err(GameError::InvalidBudget { budget: -3 })
        ));
    }

    #[test]
    fn test_round_rejects_bad_options() {
        let too_few = round("r", 10, &["a"]).validate().unwrap_err();
        assert!(too_few.to_string().contains("at least 2 options"));

        let dup = round("r", 10, &["a", "b", "a"]).validate().unwrap_err();
        assert!(dup.to_string().contains("duplicate comment id a"));

        let reserved = round("r", 10, &["a", NO_ANSWER]).validate().unwrap_err();
        assert!(reserved.to_string().contains("reserved"));
    }

    #[test]
    fn test_verdict_requires_single_top() {
        let r = round("r", 10, &["a", "b", "c"]);
        let sent = Choice::Comment("a".into());

        assert!(verdict("a", "a", &["a", "b", "c"])
            .validate_against(&r, &sent)
            .is_ok());

        let mut none_top = verdict("a", "a", &["a", "b", "c"]);
        none_top.revealed_options[0].is_top_comment = false;
        assert!(none_top.validate_against(&r, &sent).is_err());

        let mut two_tops = verdict("a", "a", &["a", "b", "c"]);
        two_tops.revealed_options[1].is_top_comment = true;
        let err = two_tops.validate_against(&r, &sent).unwrap_err();
        assert!(err.to_string().contains("exactly one top comment, got 2"));
    }

    #[test]
    fn test_verdict_must_reveal_the_same_comments() {
        let r = round("r", 10, &["a", "b", "c"]);
        let sent = Choice::Comment("a".into());

        let missing = verdict("a", "a", &["a", "b"]);
        assert!(missing.validate_against(&r, &sent).is_err());

        let foreign = verdict("a", "a", &["a", "b", "z"]);
        assert!(foreign.validate_against(&r, &sent).is_err());

        let duplicated = verdict("a", "a", &["a", "b", "c", "c"]);
        assert!(duplicated.validate_against(&r, &sent).is_err());
    }

    #[test]
    fn test_verdict_echoes_no_answer_sentinel() {
        let r = round("r", 10, &["a", "b"]);
        let v = verdict(NO_ANSWER, "a", &["a", "b"]);
        assert!(v.validate_against(&r, &Choice::NoAnswer).is_ok());
        assert!(v
            .validate_against(&r, &Choice::Comment("b".into()))
            .is_err());
    }

    #[test]
    fn test_choice_wire_ids() {
        assert_eq!(Choice::NoAnswer.wire_id(), NO_ANSWER);
        assert_eq!(Choice::Comment("c9".into()).wire_id(), "c9");
        assert_eq!(Choice::from_wire(NO_ANSWER), Choice::NoAnswer);
        assert_eq!(Choice::from_wire("c9"), Choice::Comment("c9".into()));
    }

    #[test]
    fn test_session_phase_serialization() {
        let json = serde_json::to_string(&SessionPhase::Playing {
            round_phase: RoundPhase::AwaitingVerdict,
        })
        .unwrap();
        assert_eq!(json, r#"{"PLAYING":{"round_phase":"AWAITING_VERDICT"}}"#);
        assert_eq!(serde_json::to_string(&SessionPhase::Won).unwrap(), r#""WON""#);
    }
}
