//! Worker lifecycle shared by both pipeline threads.
//!
//! Each worker polls a `running` flag once per loop iteration rather than
//! being interrupted asynchronously, which makes pause/resume responsive
//! within roughly one batch's latency. While paused the thread parks on a
//! condvar; it does not poll its input. `Terminated` is terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// Lifecycle state of a pipeline worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Paused,
    Terminated,
}

/// Uniform control surface over both workers.
pub trait Worker {
    /// `Idle -> Running`.
    fn start(&self);
    /// `Running -> Paused`. The loop exits promptly and the thread parks.
    fn pause(&self);
    /// `Paused -> Running`.
    fn resume(&self);
    /// Any state `-> Terminated`. Irreversible; joins the thread before
    /// returning. Idempotent.
    fn terminate(&mut self);

    fn state(&self) -> WorkerState;

    /// Whether the worker is currently dormant (not running, not
    /// terminated). The controller consults this after external events such
    /// as a resize to decide whether a resume is due.
    fn is_stopped(&self) -> bool {
        matches!(self.state(), WorkerState::Idle | WorkerState::Paused)
    }
}

/// Shared flags plus the park/unpark mechanics for one worker thread.
///
/// `running` and `alive` are the flags the loop polls; the mutex/condvar
/// pair only exists so a paused thread can sleep instead of spinning.
pub(crate) struct LifecycleGate {
    running: AtomicBool,
    alive: AtomicBool,
    started: AtomicBool,
    park: Mutex<()>,
    unpark: Condvar,
}

impl LifecycleGate {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            started: AtomicBool::new(false),
            park: Mutex::new(()),
            unpark: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Resume (or first-start) the worker loop. No-op after terminate.
    pub fn set_running(&self, on: bool) {
        if !self.is_alive() {
            return;
        }
        if on {
            self.started.store(true, Ordering::Release);
        }
        self.running.store(on, Ordering::Release);
        let _guard = self.park.lock().expect("gate mutex poisoned");
        self.unpark.notify_all();
    }

    /// Mark the worker dead and wake it if parked. Irreversible.
    pub fn shut_down(&self) {
        self.running.store(false, Ordering::Release);
        self.alive.store(false, Ordering::Release);
        let _guard = self.park.lock().expect("gate mutex poisoned");
        self.unpark.notify_all();
    }

    /// Park the calling worker thread until it is resumed or shut down.
    pub fn wait_while_paused(&self) {
        let mut guard = self.park.lock().expect("gate mutex poisoned");
        while !self.is_running() && self.is_alive() {
            guard = self.unpark.wait(guard).expect("gate mutex poisoned");
        }
    }

    pub fn state(&self) -> WorkerState {
        if !self.is_alive() {
            WorkerState::Terminated
        } else if self.is_running() {
            WorkerState::Running
        } else if self.started.load(Ordering::Acquire) {
            WorkerState::Paused
        } else {
            WorkerState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn state_transitions_follow_lifecycle() {
        let gate = LifecycleGate::new();
        assert_eq!(gate.state(), WorkerState::Idle);

        gate.set_running(true);
        assert_eq!(gate.state(), WorkerState::Running);

        gate.set_running(false);
        assert_eq!(gate.state(), WorkerState::Paused);

        gate.set_running(true);
        assert_eq!(gate.state(), WorkerState::Running);

        gate.shut_down();
        assert_eq!(gate.state(), WorkerState::Terminated);
    }

    #[test]
    fn terminated_gate_ignores_resume() {
        let gate = LifecycleGate::new();
        gate.shut_down();
        gate.set_running(true);
        assert_eq!(gate.state(), WorkerState::Terminated);
        assert!(!gate.is_running());
    }

    #[test]
    fn shut_down_wakes_a_parked_thread() {
        let gate = Arc::new(LifecycleGate::new());
        let parked = Arc::clone(&gate);
        let handle = thread::spawn(move || parked.wait_while_paused());

        thread::sleep(Duration::from_millis(50));
        gate.shut_down();
        handle.join().unwrap();
    }
}
