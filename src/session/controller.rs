use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::*;
use crate::capture::GuessCapture;
use crate::client::GameBackend;
use crate::protocol::GuessRequest;
use crate::timer::{RoundTimer, TimerKind};

/// Owns the session and applies every event to it
pub struct SessionController {
    session: Session,
    /// Bumped on every start and restart; completions from older epochs are stale
    epoch: u64,
    attempts: u32,
    in_flight: Option<GuessTicket>,
    timer: RoundTimer,
    timer_rx: mpsc::UnboundedReceiver<TimerSignal>,
    capture: GuessCapture,
    backend: Arc<dyn GameBackend>,
    config: SessionConfig,
    /// Weak so the event channel closes once every handle is dropped
    events_tx: mpsc::WeakUnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    fetch_task: Option<JoinHandle<()>>,
    submit_task: Option<JoinHandle<()>>,
    view: watch::Sender<Session>,
    notices: broadcast::Sender<SessionNotice>,
    stopped: bool,
}

impl SessionController {
    pub fn new(backend: Arc<dyn GameBackend>, config: SessionConfig) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (timer, timer_rx) = RoundTimer::new(config.tick_interval);
        let (view, view_rx) = watch::channel(Session::default());
        let (notices, _rx) = broadcast::channel(100);

        let events_weak = events_tx.downgrade();
        let handle = SessionHandle {
            events: events_tx,
            view: view_rx,
            notices: notices.clone(),
        };

        let controller = Self {
            session: Session::default(),
            epoch: 0,
            attempts: 0,
            in_flight: None,
            timer,
            timer_rx,
            capture: GuessCapture::new(),
            backend,
            config,
            events_tx: events_weak,
            events_rx,
            fetch_task: None,
            submit_task: None,
            view,
            notices,
            stopped: false,
        };

        (controller, handle)
    }

    /// Create a controller and run it on a background task
    pub fn spawn(backend: Arc<dyn GameBackend>, config: SessionConfig) -> SessionHandle {
        let (controller, handle) = Self::new(backend, config);
        tokio::spawn(controller.run());
        handle
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn in_flight(&self) -> Option<&GuessTicket> {
        self.in_flight.as_ref()
    }

    pub fn timer_is_live(&self) -> bool {
        self.timer.is_live()
    }

    /// Process events until shut down or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Session controller running (backend: {})", self.backend.name());

        while let Some(event) = self.next_event().await {
            if let Err(e) = self.dispatch(event) {
                match e {
                    GameError::StaleResponse { .. } => tracing::warn!("{}", e),
                    _ if e.is_transient() => tracing::warn!("Network call failed: {}", e),
                    _ => tracing::debug!("Event rejected: {}", e),
                }
            }
            if self.stopped {
                break;
            }
        }

        if !self.stopped {
            tracing::info!("All session handles dropped");
        }
        self.teardown();
        tracing::info!("Session controller stopped");
    }

    /// Wait for the next command, completion or timer signal.
    /// `None` once every handle and pending completion is gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            biased;
            event = self.events_rx.recv() => event,
            Some(signal) = self.timer_rx.recv() => Some(SessionEvent::Timer(signal)),
        }
    }

    /// Apply one event. This is the only place session state changes.
    pub fn dispatch(&mut self, event: SessionEvent) -> GameResult<()> {
        match event {
            SessionEvent::Start => self.start(),
            SessionEvent::Select { comment_id } => self.select(comment_id),
            SessionEvent::Restart => {
                self.restart();
                Ok(())
            }
            SessionEvent::RetrySubmission => self.retry_submission(),
            SessionEvent::Timer(signal) => self.on_timer(signal),
            SessionEvent::RoundsLoaded { epoch, result } => self.on_rounds_loaded(epoch, result),
            SessionEvent::VerdictArrived { ticket, result } => self.on_verdict(ticket, result),
            SessionEvent::Shutdown => {
                self.teardown();
                self.stopped = true;
                Ok(())
            }
        }
    }

    fn start(&mut self) -> GameResult<()> {
        if self.session.phase != SessionPhase::Briefing {
            return Err(self.invalid_transition("start a session"));
        }
        if self.session.loading {
            return Err(GameError::InvalidTransition {
                action: "start a session",
                state: "rounds are loading".to_string(),
            });
        }

        self.epoch += 1;
        self.session.loading = true;
        self.session.last_error = None;
        self.publish();

        let epoch = self.epoch;
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        self.fetch_task = Some(tokio::spawn(async move {
            let result = backend.fetch_rounds().await;
            // Nobody left to tell
            if let Some(events) = events.upgrade() {
                let _ = events.send(SessionEvent::RoundsLoaded { epoch, result });
            }
        }));

        tracing::info!("Session {} starting, fetching rounds", epoch);
        Ok(())
    }

    fn on_rounds_loaded(&mut self, epoch: u64, result: GameResult<Vec<Round>>) -> GameResult<()> {
        if epoch != self.epoch
            || self.session.phase != SessionPhase::Briefing
            || !self.session.loading
        {
            return Err(GameError::StaleResponse { what: "round list" });
        }

        self.session.loading = false;

        match result.and_then(validate_rounds) {
            Ok(rounds) => {
                tracing::info!("Session {} loaded {} rounds", epoch, rounds.len());
                self.session.rounds = rounds;
                self.enter_round(0)
            }
            Err(e) => {
                tracing::error!("Session {} could not start: {}", epoch, e);
                self.session.last_error = Some(e.user_message());
                self.publish();
                self.notify_error(&e);
                Err(e)
            }
        }
    }

    fn enter_round(&mut self, index: usize) -> GameResult<()> {
        let round = self
            .session
            .rounds
            .get(index)
            .cloned()
            .ok_or_else(|| self.invalid_transition("enter a round past the end"))?;

        self.timer.cancel();
        self.in_flight = None;

        self.session.current_index = index;
        self.session.phase = SessionPhase::Playing {
            round_phase: RoundPhase::Active,
        };
        self.session.last_verdict = None;
        self.session.locked_choice = None;
        self.session.time_left = Some(round.time_budget);

        self.capture.arm();
        self.timer.start(round.time_budget)?;

        tracing::info!(
            "Round {}/{} ({}) started with {}s",
            index + 1,
            self.session.rounds.len(),
            round.round_id,
            round.time_budget
        );

        self.publish();
        self.notify(SessionNotice::RoundStarted {
            round_index: index,
            total_rounds: self.session.rounds.len(),
            round,
        });
        self.notify_phase();
        Ok(())
    }

    fn select(&mut self, comment_id: CommentId) -> GameResult<()> {
        if !matches!(self.session.phase, SessionPhase::Playing { .. }) {
            return Err(self.invalid_transition("select a comment"));
        }

        let known = self
            .session
            .current_round()
            .map(|round| round.has_option(&comment_id))
            .unwrap_or(false);
        if !known {
            return Err(GameError::UnknownOption(comment_id));
        }

        match self.capture.submit(Choice::Comment(comment_id)) {
            Some(choice) => {
                // No late expiry once a guess is locked
                self.timer.cancel();
                self.lock_in(choice)
            }
            None => Ok(()),
        }
    }

    fn on_timer(&mut self, signal: TimerSignal) -> GameResult<()> {
        if !self.timer.accepts(&signal) {
            return Err(GameError::StaleResponse {
                what: "timer signal",
            });
        }

        let round_index = self.session.current_index;
        match signal.kind {
            TimerKind::Tick { remaining } => {
                tracing::debug!(
                    "Round {} tick: {}s left (timer run {})",
                    round_index + 1,
                    remaining,
                    self.timer.generation()
                );
                self.session.time_left = Some(remaining);
                self.publish();
                self.notify(SessionNotice::Tick {
                    round_index,
                    remaining,
                });
                Ok(())
            }
            TimerKind::Expired => {
                self.session.time_left = Some(0);
                let locked = match self.capture.submit(Choice::NoAnswer) {
                    Some(choice) => {
                        tracing::info!("Round {} timed out with no answer", round_index + 1);
                        self.lock_in(choice)
                    }
                    None => {
                        self.publish();
                        Ok(())
                    }
                };
                self.notify(SessionNotice::Tick {
                    round_index,
                    remaining: 0,
                });
                locked
            }
        }
    }

    fn lock_in(&mut self, choice: Choice) -> GameResult<()> {
        let round_index = self.session.current_index;
        self.session.phase = SessionPhase::Playing {
            round_phase: RoundPhase::AwaitingVerdict,
        };
        self.session.locked_choice = Some(choice.clone());
        self.send_guess(choice.clone())?;

        self.notify(SessionNotice::GuessLocked {
            round_index,
            choice,
        });
        self.notify_phase();
        Ok(())
    }

    fn send_guess(&mut self, choice: Choice) -> GameResult<()> {
        let round_id = self
            .session
            .current_round()
            .map(|r| r.round_id.clone())
            .ok_or_else(|| self.invalid_transition("submit a guess"))?;

        self.attempts += 1;
        let ticket = GuessTicket {
            epoch: self.epoch,
            round_index: self.session.current_index,
            round_id,
            attempt: self.attempts,
        };
        self.in_flight = Some(ticket.clone());
        self.session.last_error = None;
        self.publish();

        let request = GuessRequest::new(&ticket.round_id, &choice);
        let backend = self.backend.clone();
        let events = self.events_tx.clone();
        self.submit_task = Some(tokio::spawn(async move {
            let result = backend.submit_guess(&request).await;
            if let Some(events) = events.upgrade() {
                let _ = events.send(SessionEvent::VerdictArrived { ticket, result });
            }
        }));

        Ok(())
    }

    fn on_verdict(&mut self, ticket: GuessTicket, result: GameResult<Verdict>) -> GameResult<()> {
        let awaiting = self.session.phase
            == SessionPhase::Playing {
                round_phase: RoundPhase::AwaitingVerdict,
            };
        if ticket.epoch != self.epoch
            || !awaiting
            || ticket.round_index != self.session.current_index
            || self.in_flight.as_ref() != Some(&ticket)
        {
            return Err(GameError::StaleResponse { what: "verdict" });
        }
        self.in_flight = None;

        let verdict = match result {
            Ok(verdict) => verdict,
            Err(e) => return self.on_submission_failed(e),
        };

        let index = ticket.round_index;
        let sent = self.capture.resolved().cloned().unwrap_or(Choice::NoAnswer);
        if let Some(round) = self.session.rounds.get(index) {
            if let Err(e) = verdict.validate_against(round, &sent) {
                tracing::error!("Rejecting verdict: {}", e);
                self.session.last_error = Some(e.user_message());
                self.finish(SessionPhase::Lost);
                self.notify_error(&e);
                return Err(e);
            }
        }

        tracing::info!(
            "Round {} verdict: {}",
            index + 1,
            if verdict.is_correct { "correct" } else { "wrong" }
        );
        self.notify(SessionNotice::VerdictRevealed {
            round_index: index,
            verdict: verdict.clone(),
        });

        if !verdict.is_correct {
            self.session.last_verdict = Some(verdict);
            self.finish(SessionPhase::Lost);
            return Ok(());
        }
        self.session.streak += 1;

        if index + 1 == self.session.rounds.len() {
            self.session.last_verdict = Some(verdict);
            self.finish(SessionPhase::Won);
            Ok(())
        } else {
            self.enter_round(index + 1)
        }
    }

    fn on_submission_failed(&mut self, e: GameError) -> GameResult<()> {
        tracing::error!(
            "Scoring failed for round {}: {}",
            self.session.current_index + 1,
            e
        );
        self.session.last_error = Some(e.user_message());

        match self.config.failure_policy {
            SubmissionFailurePolicy::HoldForRetry => {
                tracing::warn!(
                    "Holding round {} until the guess is resent",
                    self.session.current_index + 1
                );
                self.publish();
            }
            SubmissionFailurePolicy::Forfeit => self.finish(SessionPhase::Lost),
        }
        self.notify_error(&e);

        Err(e)
    }

    fn retry_submission(&mut self) -> GameResult<()> {
        let awaiting = self.session.phase
            == SessionPhase::Playing {
                round_phase: RoundPhase::AwaitingVerdict,
            };
        if !awaiting || self.in_flight.is_some() {
            return Err(self.invalid_transition("retry the submission"));
        }

        let choice = self
            .capture
            .resolved()
            .cloned()
            .ok_or_else(|| self.invalid_transition("retry without a locked guess"))?;

        tracing::info!(
            "Resending {} for round {}",
            choice.wire_id(),
            self.session.current_index + 1
        );
        self.send_guess(choice)
    }

    fn restart(&mut self) {
        self.epoch += 1;
        self.timer.cancel();
        self.capture.disarm();
        self.in_flight = None;
        // The streak carries over into the next session
        self.session = Session {
            streak: self.session.streak,
            ..Session::default()
        };

        tracing::info!("Session reset to briefing (epoch {})", self.epoch);
        self.publish();
        self.notify_phase();
    }

    fn finish(&mut self, phase: SessionPhase) {
        self.timer.cancel();
        self.capture.disarm();
        self.in_flight = None;
        self.session.phase = phase;
        self.session.time_left = None;
        if phase == SessionPhase::Lost {
            self.session.streak = 0;
        }

        tracing::info!(
            "Session {} ended {:?} after {}/{} rounds",
            self.epoch,
            phase,
            self.session.rounds_cleared(),
            self.session.rounds.len()
        );
        self.publish();
        self.notify_phase();
    }

    /// Stop the timer and any outstanding network calls
    fn teardown(&mut self) {
        self.timer.cancel();
        self.capture.disarm();
        for task in [self.fetch_task.take(), self.submit_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }

    fn invalid_transition(&self, action: &'static str) -> GameError {
        GameError::InvalidTransition {
            action,
            state: format!("{:?}", self.session.phase),
        }
    }

    /// Always called before the matching notices go out
    fn publish(&self) {
        self.view.send_replace(self.session.clone());
    }

    fn notify(&self, notice: SessionNotice) {
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }

    fn notify_phase(&self) {
        self.notify(SessionNotice::Phase {
            phase: self.session.phase,
            round_index: self.session.current_index,
        });
    }

    fn notify_error(&self, e: &GameError) {
        self.notify(SessionNotice::Error {
            code: e.code().to_string(),
            msg: e.user_message(),
            retryable: e.is_transient(),
        });
    }
}

/// Reject the whole list if any round is unusable
fn validate_rounds(rounds: Vec<Round>) -> GameResult<Vec<Round>> {
    if rounds.is_empty() {
        return Err(GameError::FetchFailed(
            "The server returned no rounds".to_string(),
        ));
    }
    for round in &rounds {
        round.validate()?;
    }
    Ok(rounds)
}
