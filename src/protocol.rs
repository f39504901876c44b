use crate::types::*;
use serde::{Deserialize, Serialize};

/// Body of `POST /submit-guess`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuessRequest {
    pub round_id: RoundId,
    /// A real comment id or [`NO_ANSWER`]
    pub comment_id: String,
}

impl GuessRequest {
    pub fn new(round_id: &str, choice: &Choice) -> Self {
        Self {
            round_id: round_id.to_string(),
            comment_id: choice.wire_id().to_string(),
        }
    }

    pub fn choice(&self) -> Choice {
        Choice::from_wire(&self.comment_id)
    }
}

/// Error body returned by the scoring service on non-success statuses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    pub detail: String,
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_and_timeout_requests_share_shape() {
        let manual = serde_json::to_value(GuessRequest::new("r1", &Choice::Comment("c3".into())))
            .unwrap();
        let timeout = serde_json::to_value(GuessRequest::new("r1", &Choice::NoAnswer)).unwrap();

        let manual_keys: Vec<_> = manual.as_object().unwrap().keys().collect();
        let timeout_keys: Vec<_> = timeout.as_object().unwrap().keys().collect();
        assert_eq!(manual_keys, timeout_keys);

        assert_eq!(manual["commentId"], "c3");
        assert_eq!(timeout["commentId"], NO_ANSWER);
        assert_eq!(timeout["roundId"], "r1");
    }

    #[test]
    fn test_request_choice_recovers_sentinel() {
        let req: GuessRequest =
            serde_json::from_str(r#"{"roundId":"r1","commentId":"__no_answer__"}"#).unwrap();
        assert_eq!(req.choice(), Choice::NoAnswer);
    }
}
