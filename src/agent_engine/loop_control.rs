use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why the loop controller asked the task to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    MaxSteps,
    TooManyFailures(u32),
    Cancelled,
}

/// Step ceiling, consecutive-failure ceiling and the host's stop flag.
pub struct LoopController {
    max_steps: u32,
    max_consecutive_failures: Option<u32>,
    stop_flag: Option<Arc<AtomicBool>>,
    steps: u32,
    failure_streak: u32,
}

impl LoopController {
    pub fn new(
        max_steps: u32,
        max_consecutive_failures: Option<u32>,
        stop_flag: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            max_steps,
            max_consecutive_failures,
            stop_flag,
            steps: 0,
            failure_streak: 0,
        }
    }

    /// Claim the next step number, 1-based.
    pub fn begin_step(&mut self) -> u32 {
        self.steps += 1;
        self.steps
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn record_failure(&mut self) {
        self.failure_streak += 1;
    }

    pub fn record_success(&mut self) {
        self.failure_streak = 0;
    }

    /// Checked before every step. Cancellation wins over the other limits.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self
            .stop_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
        {
            return Some(StopReason::Cancelled);
        }
        if let Some(max_fail) = self.max_consecutive_failures {
            if max_fail > 0 && self.failure_streak >= max_fail {
                return Some(StopReason::TooManyFailures(self.failure_streak));
            }
        }
        if self.steps >= self.max_steps {
            return Some(StopReason::MaxSteps);
        }
        None
    }
}
