//! Reusable rendezvous point for the workers of one trial
//!
//! Each worker calls [`TrialBarrier::wait`] twice per trial: before taking
//! its start timestamp and after finishing its slice. No caller passes a
//! phase until every participant has arrived, so the timing windows of all
//! workers line up.

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error("barrier needs at least one participant, got {0}")]
    InvalidParticipants(usize),

    #[error("barrier was cancelled before all participants arrived")]
    Cancelled,
}

/// Outcome of one [`TrialBarrier::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    leader: bool,
    generation: u64,
}

impl BarrierWaitResult {
    /// Exactly one participant per phase, the last to arrive, is the leader.
    #[inline]
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Phase that was released, starting at 0.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    cancelled: bool,
}

#[derive(Debug)]
pub struct TrialBarrier {
    participants: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl TrialBarrier {
    pub fn new(participants: usize) -> Result<Self, BarrierError> {
        if participants < 1 {
            return Err(BarrierError::InvalidParticipants(participants));
        }
        Ok(Self {
            participants,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                cancelled: false,
            }),
            released: Condvar::new(),
        })
    }

    /// Blocks until `participants` callers have arrived in the current
    /// phase, then releases all of them and opens the next phase.
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(BarrierError::Cancelled);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.participants {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.released.notify_all();
            return Ok(BarrierWaitResult {
                leader: true,
                generation,
            });
        }

        while state.generation == generation && !state.cancelled {
            self.released.wait(&mut state);
        }
        if state.generation == generation {
            return Err(BarrierError::Cancelled);
        }
        Ok(BarrierWaitResult {
            leader: false,
            generation,
        })
    }

    /// Releases every current waiter with [`BarrierError::Cancelled`] and
    /// makes all later waits fail. Phases that already completed are not
    /// affected.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if !state.cancelled {
            log::debug!(
                "cancelling barrier with {}/{} arrivals",
                state.arrived,
                self.participants
            );
        }
        state.cancelled = true;
        self.released.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}
