use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Phase the pool starts in while worker threads come up.
pub(crate) const STARTING_PHASE: i32 = 0;
/// Phase during which workers loop their body.
pub(crate) const RUNNING_PHASE: i32 = 1;
/// Reported instead of the real phase once the barrier is force-terminated.
pub(crate) const TERMINATED_PHASE: i32 = -1;

/// Returned by [`PhasedBarrier::await_advance_until`] when the deadline
/// passes before the phase moves.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct AdvanceTimedOut;

struct State {
    phase: i32,
    parties: u32,
    unarrived: u32,
    terminated: bool,
}

impl State {
    // Records one arrival, advancing the phase when it was the last one
    // outstanding. Returns the phase the arrival applied to.
    fn arrive(&mut self, deregister: bool, advanced: &Condvar) -> i32 {
        debug_assert!(self.unarrived > 0, "arrival without outstanding parties");
        let arrival_phase = self.phase;
        if deregister {
            self.parties -= 1;
        }
        self.unarrived -= 1;
        if self.unarrived == 0 {
            self.phase += 1;
            self.unarrived = self.parties;
            advanced.notify_all();
        }
        arrival_phase
    }
}

/// Reusable multi-phase barrier in the mold of `java.util.concurrent.Phaser`.
///
/// A fixed set of parties repeatedly arrives at the barrier; when the last
/// outstanding party arrives, the phase number advances and every waiter is
/// released. Parties may deregister as they arrive, shrinking the set for
/// subsequent phases. Force-termination invalidates the barrier: every wait
/// returns immediately and all phase queries report [`TERMINATED_PHASE`].
pub(crate) struct PhasedBarrier {
    state: Mutex<State>,
    advanced: Condvar,
}

impl PhasedBarrier {
    pub(crate) fn new(parties: u32) -> Self {
        assert!(parties > 0, "barrier needs at least one party");
        Self {
            state: Mutex::new(State {
                phase: STARTING_PHASE,
                parties,
                unarrived: parties,
                terminated: false,
            }),
            advanced: Condvar::new(),
        }
    }

    pub(crate) fn phase(&self) -> i32 {
        let state = self.state.lock();
        if state.terminated {
            TERMINATED_PHASE
        } else {
            state.phase
        }
    }

    /// Records one arrival without waiting. Returns the phase the arrival
    /// applied to, or [`TERMINATED_PHASE`] on a dead barrier.
    pub(crate) fn arrive(&self) -> i32 {
        let mut state = self.state.lock();
        if state.terminated {
            return TERMINATED_PHASE;
        }
        state.arrive(false, &self.advanced)
    }

    /// Records one arrival and drops the party from all later phases.
    pub(crate) fn arrive_and_deregister(&self) -> i32 {
        let mut state = self.state.lock();
        if state.terminated {
            return TERMINATED_PHASE;
        }
        state.arrive(true, &self.advanced)
    }

    /// Records one arrival and blocks until the phase it applied to is over.
    /// Returns the new phase, or [`TERMINATED_PHASE`].
    pub(crate) fn arrive_and_await(&self) -> i32 {
        let mut state = self.state.lock();
        if state.terminated {
            return TERMINATED_PHASE;
        }
        let arrival_phase = state.arrive(false, &self.advanced);
        while state.phase == arrival_phase && !state.terminated {
            self.advanced.wait(&mut state);
        }
        if state.terminated {
            TERMINATED_PHASE
        } else {
            state.phase
        }
    }

    /// Blocks until the barrier has moved past `phase`.
    pub(crate) fn await_advance(&self, phase: i32) -> i32 {
        let mut state = self.state.lock();
        while state.phase == phase && !state.terminated {
            self.advanced.wait(&mut state);
        }
        if state.terminated {
            TERMINATED_PHASE
        } else {
            state.phase
        }
    }

    /// Deadline-bounded [`await_advance`](PhasedBarrier::await_advance).
    pub(crate) fn await_advance_until(
        &self,
        phase: i32,
        deadline: Instant,
    ) -> Result<i32, AdvanceTimedOut> {
        let mut state = self.state.lock();
        while state.phase == phase && !state.terminated {
            if self.advanced.wait_until(&mut state, deadline).timed_out() {
                if state.phase != phase || state.terminated {
                    break;
                }
                return Err(AdvanceTimedOut);
            }
        }
        Ok(if state.terminated {
            TERMINATED_PHASE
        } else {
            state.phase
        })
    }

    /// Kills the barrier, releasing every waiter immediately.
    pub(crate) fn force_terminate(&self) {
        let mut state = self.state.lock();
        state.terminated = true;
        self.advanced.notify_all();
    }
}
