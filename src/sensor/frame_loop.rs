// SPDX-License-Identifier: GPL-3.0-only

//! Thread lifecycle management for snapshot producer loops
//!
//! The watch pipeline runs its snapshot producer on a dedicated thread;
//! this controller standardizes starting and stopping that thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a producer loop running in a separate thread
///
/// The provided closure is called repeatedly until it returns
/// [`LoopAction::Stop`] or [`CaptureLoopController::stop`] is called.
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Start a new producer loop in a separate thread
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting producer loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Producer loop thread started");

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                match loop_fn() {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Producer loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Signal the loop to stop and wait for the thread to finish
    pub fn stop(mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            warn!(name = %self.name, "Producer loop thread panicked");
        }
    }

    /// Whether the loop thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        // Signal without joining; join happens in stop()
        self.stop_signal.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_loop_stops_on_request() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let controller = CaptureLoopController::start("test", move || {
            if count_clone.fetch_add(1, Ordering::SeqCst) >= 4 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        while controller.is_running() {
            thread::yield_now();
        }
        assert_eq!(count.load(Ordering::SeqCst), 5);
        controller.stop();
    }

    #[test]
    fn test_stop_signal_terminates_loop() {
        let controller = CaptureLoopController::start("test-stop", || {
            thread::sleep(std::time::Duration::from_millis(1));
            LoopAction::Continue
        });
        assert!(controller.is_running());
        controller.stop();
    }
}
