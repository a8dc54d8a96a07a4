//! Viterbi decoding of the most likely mode sequence.
//!
//! The IMM posteriors μₖ are used as emission distributions and M(Δtₖ) as
//! the transition matrix of step k. Scores are kept in log-space with
//! `safelog(x) = ln(max(x, 1e-9))` and shifted so that the best score is 0
//! after every step, which leaves every argmax unchanged.

use crate::{
    error::PipelineError,
    types::{Mode, ModeMatrix, ModeVec, N_MODES},
};
use serde::{Deserialize, Serialize};

const LOG_FLOOR: f64 = 1e-9;

/// Decoder configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Use M(reference_dt) at every step instead of the per-step M(Δtₖ).
    pub reference_dt: Option<f64>,
}

fn safelog(x: f64) -> f64 {
    x.max(LOG_FLOOR).ln()
}

/// Streaming max-sum decoder: push one emission per step, then trace back.
#[derive(Clone, Debug)]
pub struct ViterbiDecoder {
    log_probs: ModeVec,
    back_pointers: Vec<[usize; N_MODES]>,
}

impl Default for ViterbiDecoder {
    fn default() -> Self {
        Self::new(&ModeVec::repeat(1.0 / N_MODES as f64))
    }
}

impl ViterbiDecoder {
    pub fn new(initial: &ModeVec) -> Self {
        Self {
            log_probs: initial.map(safelog),
            back_pointers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.back_pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.back_pointers.is_empty()
    }

    /// Current best path score per end state (max is 0).
    pub fn path_scores(&self) -> &ModeVec {
        &self.log_probs
    }

    /// Advance one step.
    pub fn push(&mut self, emission: &ModeVec, transition: &ModeMatrix) {
        let sum = emission.sum();
        let emission = if sum.is_finite() && sum >= LOG_FLOOR {
            emission / sum
        } else {
            ModeVec::repeat(1.0 / N_MODES as f64)
        };

        let mut new_log_probs = ModeVec::zeros();
        let mut pointers = [0usize; N_MODES];
        for j in 0..N_MODES {
            let (best_i, best_score) = (0..N_MODES)
                .map(|i| (i, self.log_probs[i] + safelog(transition[(i, j)])))
                .fold((0, f64::NEG_INFINITY), |best, cand| {
                    if cand.1 > best.1 {
                        cand
                    } else {
                        best
                    }
                });
            pointers[j] = best_i;
            new_log_probs[j] = safelog(emission[j]) + best_score;
        }

        let top = new_log_probs.max();
        self.log_probs = new_log_probs.add_scalar(-top);
        self.back_pointers.push(pointers);
    }

    /// Trace back from the best final state.
    pub fn finish(self) -> Vec<Mode> {
        if self.back_pointers.is_empty() {
            return Vec::new();
        }
        let mut state = self.log_probs.imax();
        let mut path = Vec::with_capacity(self.back_pointers.len());
        path.push(state);
        for pointers in self.back_pointers[1..].iter().rev() {
            state = pointers[state];
            path.push(state);
        }
        path.reverse();
        path.into_iter()
            .map(|i| Mode::from_index(i).unwrap_or(Mode::Still))
            .collect()
    }
}

/// Decode a whole sequence. `transitions[k]` is the matrix entering step k.
pub fn decode(emissions: &[ModeVec], transitions: &[ModeMatrix]) -> Result<Vec<Mode>, PipelineError> {
    if emissions.len() != transitions.len() {
        return Err(PipelineError::DimensionMismatch {
            what: "transitions",
            got: transitions.len(),
            expected: emissions.len(),
        });
    }
    let mut decoder = ViterbiDecoder::default();
    for (e, m) in emissions.iter().zip(transitions) {
        decoder.push(e, m);
    }
    Ok(decoder.finish())
}
