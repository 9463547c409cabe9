//! # Delay Controls
//!
//! The audio thread and the control thread (host automation, the DAW's
//! generic editor) run at the same time. The control side needs a way to
//! hand new delay times and gains to the engine without ever making the
//! audio thread wait.
//!
//! [`DelayControls`] is that hand-off point. Every value is its own
//! atomic scalar, and one extra atomic flag says "something changed".
//! The control side stores a value and raises the flag; the audio side
//! checks the flag once at the start of each block and, only if it was
//! raised, re-reads the values and applies them to the engine (see
//! [`FeedbackDelay::apply_controls()`](super::feedback_delay::FeedbackDelay::apply_controls)).
//!
//! ```text
//!  control thread                         audio thread
//!  ──────────────                         ────────────
//!  store(value, Relaxed)
//!  changed.store(true, Release) ──────►  changed.swap(false, Acquire)?
//!                                          └─ load(value, Relaxed) ...
//! ```
//!
//! The release/acquire pair on the flag guarantees that once the audio
//! thread sees the flag, it also sees every value stored before it.

use std::sync::atomic::{AtomicBool, Ordering};

use atomic_float::AtomicF32;

/// Lock-free configuration shared between the control and audio threads.
///
/// `CHANNELS` must match the engine it feeds.
#[derive(Debug)]
pub struct DelayControls<const CHANNELS: usize = 2> {
    delay_times: [AtomicF32; CHANNELS],
    wet_level: AtomicF32,
    feedback_level: AtomicF32,
    changed: AtomicBool,
}

impl<const CHANNELS: usize> Default for DelayControls<CHANNELS> {
    fn default() -> Self {
        Self::new([0.0; CHANNELS], 0.0, 0.0)
    }
}

impl<const CHANNELS: usize> DelayControls<CHANNELS> {
    /// Create controls holding the given initial values.
    ///
    /// The changed flag starts raised, so the first block processed picks
    /// these values up even if nothing is ever set afterwards.
    pub fn new(delay_times: [f32; CHANNELS], wet_level: f32, feedback_level: f32) -> Self {
        Self {
            delay_times: delay_times.map(AtomicF32::new),
            wet_level: AtomicF32::new(wet_level),
            feedback_level: AtomicF32::new(feedback_level),
            changed: AtomicBool::new(true),
        }
    }

    /// Publish a new delay time in seconds for `channel`.
    ///
    /// Out-of-range channels are ignored (and asserted in debug builds).
    pub fn set_delay_time(&self, channel: usize, seconds: f32) {
        debug_assert!(channel < CHANNELS, "channel {channel} >= {CHANNELS}");
        if let Some(time) = self.delay_times.get(channel) {
            time.store(seconds, Ordering::Relaxed);
            self.mark_changed();
        }
    }

    pub fn set_wet_level(&self, gain: f32) {
        self.wet_level.store(gain, Ordering::Relaxed);
        self.mark_changed();
    }

    pub fn set_feedback_level(&self, gain: f32) {
        self.feedback_level.store(gain, Ordering::Relaxed);
        self.mark_changed();
    }

    /// Raise the changed flag without storing a value. Used when
    /// something outside these controls (a link or sync toggle) affects
    /// how they should be applied.
    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }

    pub fn delay_time(&self, channel: usize) -> f32 {
        self.delay_times
            .get(channel)
            .map_or(0.0, |time| time.load(Ordering::Relaxed))
    }

    pub fn wet_level(&self) -> f32 {
        self.wet_level.load(Ordering::Relaxed)
    }

    pub fn feedback_level(&self) -> f32 {
        self.feedback_level.load(Ordering::Relaxed)
    }

    /// Consume the changed flag. Returns `true` if it was raised since
    /// the last call.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_flag_starts_raised_and_is_consumed_once() {
        let controls = DelayControls::<2>::default();

        assert!(controls.take_changed());
        assert!(!controls.take_changed());
    }

    #[test]
    fn test_setters_store_and_raise_flag() {
        let controls = DelayControls::<2>::new([0.1, 0.2], 0.0, 0.0);
        controls.take_changed();

        controls.set_delay_time(1, 0.75);
        assert!(controls.take_changed());
        assert!((controls.delay_time(0) - 0.1).abs() < 1e-6);
        assert!((controls.delay_time(1) - 0.75).abs() < 1e-6);

        controls.set_wet_level(0.8);
        controls.set_feedback_level(1.3);
        assert!(controls.take_changed());
        assert!(!controls.take_changed());
        assert!((controls.wet_level() - 0.8).abs() < 1e-6);
        assert!((controls.feedback_level() - 1.3).abs() < 1e-6);
    }

    /// Values stored on another thread are visible once the flag is seen.
    #[test]
    fn test_values_cross_threads() {
        let controls = Arc::new(DelayControls::<2>::default());
        controls.take_changed();

        let writer = Arc::clone(&controls);
        std::thread::spawn(move || {
            writer.set_delay_time(0, 1.25);
            writer.set_wet_level(0.5);
        })
        .join()
        .unwrap();

        assert!(controls.take_changed());
        assert!((controls.delay_time(0) - 1.25).abs() < 1e-6);
        assert!((controls.wet_level() - 0.5).abs() < 1e-6);
    }
}
