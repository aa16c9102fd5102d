//! Screen-state control loop

use crate::config::{AgentConfig, TapPoint, TapPoints, Timings};
use crate::device::Device;
use crate::persistence::DatasetStore;
use crate::predict::{Model, Prediction, Trainer};
use arena_core::{AccuracyTally, FeatureVector, OutcomeRecord, ScreenState, SlotSnapshot};
use arena_cv::traits::Perception;
use arena_cv::{CvError, Frame};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum AgentError {
    /// A critical match failed; the loop has no known screen to act on.
    #[error("critical match failure: {0}")]
    HardMatchFailure(#[from] CvError),

    #[error("no win/lose screen after {0:?}")]
    PollTimeout(Duration),
}

/// Slots and prediction of a round waiting for its result screen
struct Round {
    snapshot: SlotSnapshot,
    prediction: Prediction,
}

/// Drives the device from one classified frame to the next.
///
/// Owns the accuracy tally and the current model; the model is only ever
/// replaced whole, between rounds.
pub struct Driver<D, P, T> {
    device: D,
    perception: P,
    trainer: T,
    model: Arc<dyn Model>,
    store: DatasetStore,
    taps: TapPoints,
    timings: Timings,
    retrain_every: u64,
    tally: AccuracyTally,
}

impl<D, P, T> Driver<D, P, T>
where
    D: Device,
    P: Perception,
    T: Trainer,
{
    pub fn new(
        device: D,
        perception: P,
        trainer: T,
        model: Arc<dyn Model>,
        store: DatasetStore,
        config: &AgentConfig,
    ) -> Self {
        Self {
            device,
            perception,
            trainer,
            model,
            store,
            taps: config.taps.clone(),
            timings: config.timings.clone(),
            retrain_every: config.retrain_every,
            tally: AccuracyTally::default(),
        }
    }

    pub fn tally(&self) -> AccuracyTally {
        self.tally
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Run until the outside screen shows up or a critical match fails.
    pub fn run(&mut self) -> Result<(), AgentError> {
        info!("Starting automation loop");

        loop {
            let Some(state) = self.observe() else {
                thread::sleep(self.timings.wait());
                continue;
            };

            match state {
                ScreenState::Home => self.tap(self.taps.home),
                ScreenState::Main => {
                    info!("State: main");
                    self.repeat_while(ScreenState::Main, self.taps.main);
                }
                ScreenState::Outside => {
                    error!("Detected 'outside' screen, stopping");
                    return Ok(());
                }
                ScreenState::Select => {
                    info!("State: select");
                    self.tap(self.taps.select_mode);
                    thread::sleep(self.timings.select_gap());
                    self.tap(self.taps.select_confirm);
                    thread::sleep(self.timings.select_gap());
                }
                ScreenState::InGame => {
                    info!("State: ingame");
                    match self.play_round() {
                        Err(AgentError::PollTimeout(limit)) => {
                            error!("No result screen within {:?}, round abandoned", limit);
                        }
                        other => other?,
                    }
                }
                ScreenState::Clearing => {
                    info!("State: clearing");
                    self.repeat_while(ScreenState::Clearing, self.taps.clearing);
                    info!("Cycle completed");
                }
                ScreenState::Win | ScreenState::Lose => {
                    debug!("Result screen without a pending round");
                    thread::sleep(self.timings.wait());
                }
                ScreenState::Loading
                | ScreenState::Intermediate
                | ScreenState::Prepare
                | ScreenState::Unknown => {
                    debug!("Idle on {}", state);
                    thread::sleep(self.timings.wait());
                }
            }
        }
    }

    /// Capture and classify one frame. `None` when capture failed.
    fn observe(&mut self) -> Option<ScreenState> {
        self.capture().map(|frame| self.perception.classify(&frame))
    }

    fn capture(&mut self) -> Option<Frame> {
        match self.device.capture() {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!("Failed to capture screenshot: {}", e);
                None
            }
        }
    }

    fn tap(&mut self, point: TapPoint) {
        if let Err(e) = self.device.double_tap(point, self.timings.double_tap_gap()) {
            warn!("Double tap at {} failed: {}", point, e);
        }
    }

    /// Tap, wait, reclassify until the screen leaves `state`.
    fn repeat_while(&mut self, state: ScreenState, point: TapPoint) {
        loop {
            self.tap(point);
            thread::sleep(self.timings.wait());
            match self.observe() {
                Some(next) if next != state => break,
                _ => {}
            }
        }
    }

    /// Read slots, predict, confirm, then settle the round on its result screen.
    fn play_round(&mut self) -> Result<(), AgentError> {
        thread::sleep(self.timings.ingame_settle());
        let Some(frame) = self.capture() else {
            return Ok(());
        };
        let snapshot = self.perception.read_slots(&frame)?;

        let features = FeatureVector::from_snapshot(&snapshot, self.store.vocabulary().len());
        let model = Arc::clone(&self.model);
        let prediction = model.predict(&features);
        warn!(
            "Predicted {}, probability {:.2}%",
            if prediction.left_wins { "WIN" } else { "LOSE" },
            prediction.probability * 100.0
        );

        self.tap(self.taps.ingame_confirm);

        let left_won = self.await_result()?;
        self.settle(Round { snapshot, prediction }, left_won);
        Ok(())
    }

    /// Poll until a win or lose screen; `true` on win.
    fn await_result(&mut self) -> Result<bool, AgentError> {
        let started = Instant::now();
        let deadline = self.timings.result_poll_timeout();

        loop {
            match self.observe() {
                Some(ScreenState::Win) => {
                    warn!("Detected WIN");
                    return Ok(true);
                }
                Some(ScreenState::Lose) => {
                    warn!("Detected LOSE");
                    return Ok(false);
                }
                _ => {}
            }

            if let Some(limit) = deadline {
                if started.elapsed() >= limit {
                    return Err(AgentError::PollTimeout(limit));
                }
            }
            thread::sleep(self.timings.poll_interval());
        }
    }

    fn settle(&mut self, round: Round, left_won: bool) {
        let len = self.store.vocabulary().len();
        let outcome = match OutcomeRecord::build(&round.snapshot, len, left_won) {
            Ok(outcome) => outcome,
            Err(violation) => {
                error!("Outcome discarded: {}", violation);
                return;
            }
        };

        self.tally.record(round.prediction.left_wins, left_won);
        warn!(
            "Accuracy: {:.2}%, {}/{}",
            self.tally.accuracy() * 100.0,
            self.tally.correct,
            self.tally.total
        );
        if round.prediction.left_wins != left_won {
            warn!("Wrong prediction, record: {:?}", outcome.values.as_slice());
        } else {
            info!("Correct prediction, record: {:?}", outcome.values.as_slice());
        }

        if let Err(e) = self.store.append(&outcome) {
            error!("Failed to persist outcome: {:#}", e);
        }

        if self.tally.is_retrain_due(self.retrain_every) {
            self.retrain();
        }
    }

    fn retrain(&mut self) {
        match self.trainer.train(&self.store) {
            Ok(training) => {
                self.model = training.model;
                match training.holdout_accuracy {
                    Some(acc) => warn!("New model trained, holdout accuracy {:.2}%", acc * 100.0),
                    None => warn!("New model trained"),
                }
            }
            Err(e) => error!("Retraining failed, keeping the previous model: {:#}", e),
        }
    }
}
