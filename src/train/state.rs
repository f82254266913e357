//! Training-loop state machine and early-stopping bookkeeping.
//!
//! [`TrainingState`] owns the current [`TrainingPhase`] together with the
//! best validation loss and the no-improvement counter.  The trainer drives
//! it; nothing else mutates it.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TrainingPhase
// ---------------------------------------------------------------------------

/// Phases of a training run.
///
/// ```text
/// Initializing ──▶ TrainEpoch(0) ──▶ ValidateEpoch(0)
///                  ──improved / not yet patient──▶ TrainEpoch(1) ──▶ …
/// ValidateEpoch(e) ──no-improvement counter == patience──▶ Converged
/// ValidateEpoch(e) ──e + 1 == epoch budget──────────────▶ ExhaustedEpochs
/// ```
///
/// `Converged` and `ExhaustedEpochs` are both normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    /// Datasets, model, loss and optimiser are being built.
    Initializing,

    /// Optimising over sampled minibatches of epoch `n` (0-based).
    TrainEpoch(usize),

    /// Evaluating epoch `n` on the validation set.
    ValidateEpoch(usize),

    /// Stopped early: validation loss stalled for `patience` epochs.
    Converged,

    /// Stopped after the configured number of epochs.
    ExhaustedEpochs,
}

impl TrainingPhase {
    /// Returns `true` once the run has stopped.
    ///
    /// ```
    /// use voice_spoof_trainer::train::TrainingPhase;
    ///
    /// assert!(!TrainingPhase::Initializing.is_terminal());
    /// assert!(!TrainingPhase::TrainEpoch(3).is_terminal());
    /// assert!(TrainingPhase::Converged.is_terminal());
    /// assert!(TrainingPhase::ExhaustedEpochs.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingPhase::Converged | TrainingPhase::ExhaustedEpochs
        )
    }

    /// A short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            TrainingPhase::Initializing => "Initializing",
            TrainingPhase::TrainEpoch(_) => "Training",
            TrainingPhase::ValidateEpoch(_) => "Validating",
            TrainingPhase::Converged => "Converged",
            TrainingPhase::ExhaustedEpochs => "Exhausted",
        }
    }
}

impl Default for TrainingPhase {
    fn default() -> Self {
        TrainingPhase::Initializing
    }
}

// ---------------------------------------------------------------------------
// Termination / EpochVerdict
// ---------------------------------------------------------------------------

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Converged,
    ExhaustedEpochs,
}

impl From<Termination> for TrainingPhase {
    fn from(t: Termination) -> Self {
        match t {
            Termination::Converged => TrainingPhase::Converged,
            Termination::ExhaustedEpochs => TrainingPhase::ExhaustedEpochs,
        }
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochVerdict {
    /// New best validation loss: the checkpoint must be written.
    pub improved: bool,
    /// Set when this was the last epoch of the run.
    pub stop: Option<Termination>,
}

// ---------------------------------------------------------------------------
// TrainingState
// ---------------------------------------------------------------------------

/// Early-stopping tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    phase: TrainingPhase,
    max_epochs: usize,
    patience: usize,
    best_loss: Option<f32>,
    best_epoch: Option<usize>,
    bad_epochs: usize,
}

impl TrainingState {
    pub fn new(max_epochs: usize, patience: usize) -> Self {
        Self {
            phase: TrainingPhase::Initializing,
            max_epochs,
            patience,
            best_loss: None,
            best_epoch: None,
            bad_epochs: 0,
        }
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn best_loss(&self) -> Option<f32> {
        self.best_loss
    }

    /// 0-based epoch of the last improvement.
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Consecutive epochs without improvement.
    pub fn bad_epochs(&self) -> usize {
        self.bad_epochs
    }

    /// Enter the next training epoch and return its 0-based index, or
    /// `None` once the run has terminated.
    pub fn begin_epoch(&mut self) -> Option<usize> {
        let next = match self.phase {
            TrainingPhase::Initializing => 0,
            TrainingPhase::ValidateEpoch(e) => e + 1,
            TrainingPhase::TrainEpoch(e) => e,
            TrainingPhase::Converged | TrainingPhase::ExhaustedEpochs => return None,
        };
        self.phase = TrainingPhase::TrainEpoch(next);
        Some(next)
    }

    /// Enter validation of the current epoch.
    pub fn begin_validation(&mut self) {
        if let TrainingPhase::TrainEpoch(e) = self.phase {
            self.phase = TrainingPhase::ValidateEpoch(e);
        }
    }

    /// Record the validation loss of the epoch being validated.
    ///
    /// A strictly lower loss than the best so far is an improvement and
    /// resets the counter.  A NaN loss never improves.
    pub fn observe(&mut self, val_loss: f32) -> EpochVerdict {
        let epoch = match self.phase {
            TrainingPhase::ValidateEpoch(e) | TrainingPhase::TrainEpoch(e) => e,
            TrainingPhase::Initializing => 0,
            TrainingPhase::Converged | TrainingPhase::ExhaustedEpochs => {
                return EpochVerdict {
                    improved: false,
                    stop: self.termination(),
                }
            }
        };

        let improved = self.best_loss.map_or(!val_loss.is_nan(), |best| val_loss < best);
        if improved {
            self.best_loss = Some(val_loss);
            self.best_epoch = Some(epoch);
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        let stop = if self.bad_epochs >= self.patience {
            Some(Termination::Converged)
        } else if epoch + 1 >= self.max_epochs {
            Some(Termination::ExhaustedEpochs)
        } else {
            None
        };

        self.phase = match stop {
            Some(t) => t.into(),
            None => TrainingPhase::ValidateEpoch(epoch),
        };
        EpochVerdict { improved, stop }
    }

    pub fn termination(&self) -> Option<Termination> {
        match self.phase {
            TrainingPhase::Converged => Some(Termination::Converged),
            TrainingPhase::ExhaustedEpochs => Some(Termination::ExhaustedEpochs),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `losses` through a full run and return the state at the end plus
    /// the epochs whose checkpoint would have been written.
    fn drive(losses: &[f32], max_epochs: usize, patience: usize) -> (TrainingState, Vec<usize>) {
        let mut state = TrainingState::new(max_epochs, patience);
        let mut saved = Vec::new();
        while let Some(epoch) = state.begin_epoch() {
            state.begin_validation();
            let verdict = state.observe(losses[epoch]);
            if verdict.improved {
                saved.push(epoch);
            }
            if verdict.stop.is_some() {
                break;
            }
        }
        (state, saved)
    }

    // ---- TrainingPhase ---

    #[test]
    fn default_phase_is_initializing() {
        assert_eq!(TrainingPhase::default(), TrainingPhase::Initializing);
    }

    #[test]
    fn labels() {
        assert_eq!(TrainingPhase::Initializing.label(), "Initializing");
        assert_eq!(TrainingPhase::TrainEpoch(2).label(), "Training");
        assert_eq!(TrainingPhase::ValidateEpoch(2).label(), "Validating");
        assert_eq!(TrainingPhase::Converged.label(), "Converged");
        assert_eq!(TrainingPhase::ExhaustedEpochs.label(), "Exhausted");
    }

    #[test]
    fn phases_advance_in_order() {
        let mut state = TrainingState::new(5, 2);
        assert_eq!(state.begin_epoch(), Some(0));
        assert_eq!(state.phase(), TrainingPhase::TrainEpoch(0));
        state.begin_validation();
        assert_eq!(state.phase(), TrainingPhase::ValidateEpoch(0));
        state.observe(1.0);
        assert_eq!(state.begin_epoch(), Some(1));
    }

    // ---- Early stopping ---

    #[test]
    fn stops_when_counter_reaches_patience() {
        // best at epoch 1, then patience + 1 worsening epochs available
        let losses = [1.0, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        let (state, saved) = drive(&losses, 25, 3);

        assert_eq!(state.phase(), TrainingPhase::Converged);
        assert_eq!(state.termination(), Some(Termination::Converged));
        // epochs 2, 3, 4 are the three bad ones
        assert_eq!(state.bad_epochs(), 3);
        assert_eq!(state.best_epoch(), Some(1));
        assert_eq!(state.best_loss(), Some(0.5));
        // checkpoint belongs to the last improvement, not the final epoch
        assert_eq!(saved.last(), Some(&1));
        assert_eq!(saved, vec![0, 1]);
    }

    #[test]
    fn equal_loss_is_not_an_improvement() {
        let (state, saved) = drive(&[0.5, 0.5, 0.5], 10, 2);
        assert_eq!(state.termination(), Some(Termination::Converged));
        assert_eq!(saved, vec![0]);
    }

    #[test]
    fn budget_ends_run_before_patience() {
        let (state, saved) = drive(&[1.0, 0.9, 0.8], 3, 12);
        assert_eq!(state.termination(), Some(Termination::ExhaustedEpochs));
        assert_eq!(saved, vec![0, 1, 2]);
        assert_eq!(state.best_epoch(), Some(2));
    }

    #[test]
    fn improvement_resets_counter() {
        let mut state = TrainingState::new(20, 3);
        for loss in [1.0, 1.1, 1.2, 0.9] {
            state.begin_epoch();
            state.begin_validation();
            state.observe(loss);
        }
        assert_eq!(state.bad_epochs(), 0);
        assert_eq!(state.best_epoch(), Some(3));
    }

    #[test]
    fn nan_never_improves() {
        let (state, saved) = drive(&[f32::NAN, f32::NAN], 5, 2);
        assert_eq!(state.termination(), Some(Termination::Converged));
        assert!(saved.is_empty());
        assert!(state.best_loss().is_none());
    }

    #[test]
    fn terminal_state_does_not_restart() {
        let (mut state, _) = drive(&[1.0], 1, 5);
        assert_eq!(state.termination(), Some(Termination::ExhaustedEpochs));
        assert_eq!(state.begin_epoch(), None);
    }
}
