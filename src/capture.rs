use crate::types::Choice;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No round is accepting input
    #[default]
    Disarmed,
    Armed,
    Resolved(Choice),
}

/// Single-selection gate for one round.
///
/// Both the selection handler and the timer expiry handler go through
/// [`GuessCapture::submit`]; whichever arrives first is kept and every later
/// call is a no-op.
#[derive(Debug, Clone, Default)]
pub struct GuessCapture {
    state: CaptureState,
}

impl GuessCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept input for a new round
    pub fn arm(&mut self) {
        self.state = CaptureState::Armed;
    }

    /// Stop accepting input without resolving (session torn down)
    pub fn disarm(&mut self) {
        self.state = CaptureState::Disarmed;
    }

    /// Record `choice` if this is the first submission since [`arm`](Self::arm).
    /// Returns the accepted choice, or `None` if the call was ignored.
    pub fn submit(&mut self, choice: Choice) -> Option<Choice> {
        match self.state {
            CaptureState::Armed => {
                self.state = CaptureState::Resolved(choice.clone());
                Some(choice)
            }
            CaptureState::Disarmed | CaptureState::Resolved(_) => {
                tracing::debug!("Ignoring submission {:?}: capture not armed", choice);
                None
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state == CaptureState::Armed
    }

    pub fn resolved(&self) -> Option<&Choice> {
        match &self.state {
            CaptureState::Resolved(choice) => Some(choice),
            _ => None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_submission_wins() {
        let mut capture = GuessCapture::new();
        capture.arm();

        let first = capture.submit(Choice::Comment("c1".into()));
        assert_eq!(first, Some(Choice::Comment("c1".into())));

        // Duplicate click and a late expiry are both ignored
        assert_eq!(capture.submit(Choice::Comment("c2".into())), None);
        assert_eq!(capture.submit(Choice::NoAnswer), None);
        assert_eq!(capture.resolved(), Some(&Choice::Comment("c1".into())));
    }

    #[test]
    fn test_expiry_first_blocks_late_click() {
        let mut capture = GuessCapture::new();
        capture.arm();

        assert_eq!(capture.submit(Choice::NoAnswer), Some(Choice::NoAnswer));
        assert_eq!(capture.submit(Choice::Comment("c1".into())), None);
        assert_eq!(capture.resolved(), Some(&Choice::NoAnswer));
    }

    #[test]
    fn test_disarmed_capture_ignores_input() {
        let mut capture = GuessCapture::new();
        assert_eq!(capture.submit(Choice::Comment("c1".into())), None);

        capture.arm();
        capture.disarm();
        assert_eq!(capture.submit(Choice::Comment("c1".into())), None);
        assert_eq!(capture.state(), &CaptureState::Disarmed);
    }

    #[test]
    fn test_rearm_opens_next_round() {
        let mut capture = GuessCapture::new();
        capture.arm();
        capture.submit(Choice::Comment("c1".into()));

        capture.arm();
        assert!(capture.is_armed());
        assert_eq!(capture.resolved(), None);
        assert_eq!(
            capture.submit(Choice::Comment("c7".into())),
            Some(Choice::Comment("c7".into()))
        );
    }
}
