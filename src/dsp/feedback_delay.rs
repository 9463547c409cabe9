//! # Feedback Delay Engine
//!
//! The engine owns one [`CircularBuffer`] and one [`HighPassFilter`] per
//! channel and runs the saturating feedback algorithm over them.
//!
//! ## Signal Flow (one channel)
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                                              │
//! input ──┬─────►(+)──► atan ──► [Circular Buffer] ──► [High-pass] ──► d
//!         │       ▲                                              │
//!         │       └──────────────── × feedback ◄─────────────────┤
//!         │                                                      │
//!         └─────►(+)──► atan ──► output                          │
//!                 ▲                                              │
//!                 └──────────────── × wet ◄──────────────────────┘
//! ```
//!
//! Per sample, in order:
//!
//! 1. `d = highpass(buffer.get(delay_samples))`
//! 2. `buffer.push(atan(input + feedback * d))`
//! 3. `output = atan(input + wet * d)`
//!
//! ## Why arctangent?
//!
//! A linear feedback loop with `feedback >= 1.0` grows without bound. The
//! arctangent is odd, smooth, and can never leave `(-π/2, π/2)`, so
//! whatever goes back into the buffer is bounded no matter how hard the
//! loop is driven. High feedback settings turn into sustained, saturated
//! repeats instead of a blown-up signal.
//!
//! ## Time Bookkeeping
//!
//! Delay times are set in seconds and converted to a whole number of
//! samples: `round(seconds * sample_rate)`, clamped into
//! `[1, capacity - 1]` so every read is a legal look-back. The capacity
//! itself is `ceil(max_delay_time * sample_rate)`.
//!
//! Whenever the sample rate or maximum delay time changes, the buffers are
//! resized *first* and the sample counts recomputed against the new
//! capacity *second*. Doing it the other way round would leave a window
//! where a channel's delay points past the end of a freshly shrunk buffer.

use std::num::NonZeroUsize;

use nih_plug::{nih_log, nih_warn};

use super::block::AudioBlock;
use super::circular_buffer::CircularBuffer;
use super::controls::DelayControls;
use super::filter::{HighPassFilter, FEEDBACK_CUTOFF_HZ};

/// Sample rate assumed until `prepare()` is called.
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Maximum delay time in seconds. Bounds the buffer allocation.
pub const DEFAULT_MAX_DELAY_TIME: f32 = 2.0;

/// Per-channel delay time in seconds at construction.
pub const DEFAULT_DELAY_TIME: f32 = 0.5;

/// Smallest buffer for which a one-sample look-back is legal.
pub const MIN_CAPACITY: usize = 2;

/// Largest buffer the engine will allocate per channel: 2^24 samples,
/// 64 MiB of `f32`, a little over 87 seconds at 192 kHz. Requests beyond
/// it are capped and the longest reachable delay shrinks accordingly.
pub const MAX_CAPACITY: usize = 1 << 24;

/// The loop's saturator.
#[inline]
pub fn saturate(x: f32) -> f32 {
    x.atan()
}

/// Buffer capacity needed to hold `max_delay_time` seconds, kept inside
/// `[MIN_CAPACITY, MAX_CAPACITY]`.
fn capacity_for(max_delay_time: f32, sample_rate: f32) -> NonZeroUsize {
    // `as usize` saturates: negative and NaN products become 0, huge ones
    // become `usize::MAX`.
    let samples =
        ((max_delay_time * sample_rate).ceil() as usize).clamp(MIN_CAPACITY, MAX_CAPACITY);
    NonZeroUsize::new(samples).unwrap_or(NonZeroUsize::MIN)
}

/// Whole-sample delay for `seconds`, kept inside `[1, capacity - 1]`.
fn delay_samples_for(seconds: f32, sample_rate: f32, capacity: usize) -> usize {
    let longest = capacity.saturating_sub(1).max(1);
    ((seconds * sample_rate).round() as usize).clamp(1, longest)
}

fn clamp_delay_time(seconds: f32, max_delay_time: f32) -> f32 {
    if seconds.is_nan() {
        0.0
    } else {
        seconds.clamp(0.0, max_delay_time)
    }
}

/// Everything one channel of the delay needs.
#[derive(Debug, Clone, PartialEq)]
struct DelayChannel {
    line: CircularBuffer,
    filter: HighPassFilter,

    /// Requested delay in seconds, already clamped to the maximum.
    delay_time: f32,

    /// `delay_time` in samples. Always a legal look-back for `line`.
    delay_samples: usize,
}

impl DelayChannel {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            line: CircularBuffer::new(capacity),
            filter: HighPassFilter::new(),
            delay_time: DEFAULT_DELAY_TIME,
            delay_samples: 1,
        }
    }

    /// Run one sample through the loop and return the output sample.
    ///
    /// # Arguments
    /// * `input` - The dry sample arriving from the host.
    /// * `feedback_level` - Gain on the delayed signal going back into
    ///   the buffer.
    /// * `wet_level` - Gain on the delayed signal going to the output.
    ///
    /// # The Loop
    ///
    /// ```text
    /// d      = highpass(line.get(delay_samples))
    /// line  <- atan(input + feedback_level * d)
    /// output = atan(input + wet_level * d)
    /// ```
    ///
    /// The read happens before the push, so `get(delay_samples)` sees the
    /// sample written exactly `delay_samples` ticks ago.
    #[inline]
    fn tick(&mut self, input: f32, feedback_level: f32, wet_level: f32) -> f32 {
        // Step 1: READ the sample written `delay_samples` ticks ago and
        // FILTER it. Every pass round the loop goes through the high-pass
        // again, so DC and rumble bleed away instead of piling up.
        let delayed = self.filter.process(self.line.get(self.delay_samples));

        // Step 2: FEED BACK. The input plus the scaled echo is saturated
        // before it is stored, so the buffer can never hold anything
        // outside (-π/2, π/2) however high the feedback is set.
        self.line.push(saturate(input + feedback_level * delayed));

        // Step 3: MIX. The dry input always passes. The wet echo is added
        // on top and the sum is saturated the same way.
        saturate(input + wet_level * delayed)
    }

    fn update_delay_samples(&mut self, sample_rate: f32) {
        self.delay_samples = delay_samples_for(self.delay_time, sample_rate, self.line.capacity());
    }

    fn reset(&mut self) {
        self.line.clear();
        self.filter.reset();
    }
}

/// A multi-channel saturating feedback delay.
///
/// `CHANNELS` is the most channels the engine can ever process. Storage
/// for all of them lives in fixed arrays, so the channel count never
/// causes an allocation. [`prepare()`](Self::prepare) picks how many of
/// them are active.
///
/// ## Threading
///
/// Everything here takes `&mut self`, so the audio thread owns the
/// engine outright. Other threads talk to it through a shared
/// [`DelayControls`], which the audio thread drains with
/// [`apply_controls()`](Self::apply_controls) once per block.
///
/// [`prepare()`](Self::prepare), [`set_sample_rate()`](Self::set_sample_rate)
/// and [`set_max_delay_time()`](Self::set_max_delay_time) reallocate the
/// buffers. Call them only while audio is stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackDelay<const CHANNELS: usize = 2> {
    channels: [DelayChannel; CHANNELS],
    sample_rate: f32,
    max_delay_time: f32,
    wet_level: f32,
    feedback_level: f32,
    active_channels: usize,
}

impl<const CHANNELS: usize> Default for FeedbackDelay<CHANNELS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CHANNELS: usize> FeedbackDelay<CHANNELS> {
    /// Create an engine with silent mix levels, a 2 second maximum delay
    /// and every channel active at 44.1 kHz.
    pub fn new() -> Self {
        let capacity = capacity_for(DEFAULT_MAX_DELAY_TIME, DEFAULT_SAMPLE_RATE);
        let mut delay = Self {
            channels: std::array::from_fn(|_| DelayChannel::new(capacity)),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_delay_time: DEFAULT_MAX_DELAY_TIME,
            wet_level: 0.0,
            feedback_level: 0.0,
            active_channels: CHANNELS,
        };
        delay.update_delay_samples();
        delay.update_filters();
        delay
    }

    /// Get ready to process `num_channels` channels at `sample_rate`.
    ///
    /// Resizes the buffers, recomputes every derived value and clears all
    /// history. Asking for more channels than `CHANNELS` is a contract
    /// violation: debug builds panic, release builds clamp.
    pub fn prepare(&mut self, sample_rate: f32, num_channels: usize) {
        debug_assert!(
            num_channels <= CHANNELS,
            "{num_channels} channels requested, the delay supports at most {CHANNELS}"
        );
        self.active_channels = num_channels.min(CHANNELS);
        self.store_sample_rate(sample_rate);
        self.resize_lines();
        self.update_delay_samples();
        self.update_filters();
        self.reset();

        nih_log!(
            "Feedback delay prepared: {} channel(s) at {} Hz, {} samples per line",
            self.active_channels,
            self.sample_rate,
            self.capacity()
        );
    }

    /// Silence every buffer and filter. Configuration is kept.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    /// Set `channel`'s delay time in seconds, clamped to
    /// `[0, max_delay_time]`. Takes effect on the next sample processed.
    pub fn set_delay_time(&mut self, channel: usize, seconds: f32) {
        debug_assert!(channel < CHANNELS, "channel {channel} >= {CHANNELS}");
        let Some(state) = self.channels.get_mut(channel) else {
            return;
        };
        state.delay_time = clamp_delay_time(seconds, self.max_delay_time);
        state.update_delay_samples(self.sample_rate);
    }

    /// Change the longest delay the buffers can hold.
    ///
    /// This reallocates and clears every buffer, which is audible. Delay
    /// times above the new maximum are pulled down to it.
    pub fn set_max_delay_time(&mut self, seconds: f32) {
        debug_assert!(seconds.is_finite(), "max delay time must be finite");
        if !seconds.is_finite() {
            return;
        }
        self.max_delay_time = seconds.max(0.0);
        for channel in &mut self.channels {
            channel.delay_time = clamp_delay_time(channel.delay_time, self.max_delay_time);
        }
        self.resize_lines();
        self.update_delay_samples();
    }

    /// Gain applied to the delayed signal on its way to the output.
    /// Not clamped.
    pub fn set_wet_level(&mut self, gain: f32) {
        self.wet_level = gain;
    }

    /// Gain applied to the delayed signal on its way back into the
    /// buffer. Not clamped; values at or above 1.0 are held in check by
    /// the saturator.
    pub fn set_feedback_level(&mut self, gain: f32) {
        self.feedback_level = gain;
    }

    /// Change the sample rate. Like [`set_max_delay_time()`](Self::set_max_delay_time)
    /// this reallocates and clears the buffers.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.store_sample_rate(sample_rate);
        self.resize_lines();
        self.update_delay_samples();
        self.update_filters();
    }

    /// Pull the latest values out of `controls` if any of them changed
    /// since the last call. Returns whether anything was applied.
    ///
    /// Meant to be called once at the top of every block.
    pub fn apply_controls(&mut self, controls: &DelayControls<CHANNELS>) -> bool {
        if !controls.take_changed() {
            return false;
        }
        for channel in 0..CHANNELS {
            self.set_delay_time(channel, controls.delay_time(channel));
        }
        self.wet_level = controls.wet_level();
        self.feedback_level = controls.feedback_level();
        true
    }

    /// Process `block` in place.
    ///
    /// # Arguments
    /// * `block` - A `channels × samples` view of the host's audio. Each
    ///   sample is read as input and overwritten with the output.
    ///
    /// Channels past the prepared channel count are left untouched, so a
    /// block wider than [`active_channels()`](Self::active_channels) is
    /// not an error. The levels are read once up front: nothing inside a
    /// block can change them.
    pub fn process_replacing<B>(&mut self, block: &mut B)
    where
        B: AudioBlock + ?Sized,
    {
        let num_channels = block.num_channels().min(self.active_channels);
        let num_samples = block.num_samples();
        let (feedback_level, wet_level) = (self.feedback_level, self.wet_level);

        // Channel by channel: each channel's buffer and filter are
        // independent of the others.
        for (index, channel) in self.channels.iter_mut().enumerate().take(num_channels) {
            for sample in block.channel_mut(index).iter_mut().take(num_samples) {
                *sample = channel.tick(*sample, feedback_level, wet_level);
            }
        }
    }

    /// Read from `input` and write to `output`. Both blocks must have the
    /// same shape.
    pub fn process<I, O>(&mut self, input: &I, output: &mut O)
    where
        I: AudioBlock + ?Sized,
        O: AudioBlock + ?Sized,
    {
        debug_assert_eq!(input.num_channels(), output.num_channels());
        debug_assert_eq!(input.num_samples(), output.num_samples());

        let num_channels = input
            .num_channels()
            .min(output.num_channels())
            .min(self.active_channels);
        let num_samples = input.num_samples().min(output.num_samples());
        let (feedback_level, wet_level) = (self.feedback_level, self.wet_level);

        for (index, channel) in self.channels.iter_mut().enumerate().take(num_channels) {
            let source = input.channel(index);
            let destination = output.channel_mut(index);
            for (out, &sample) in destination.iter_mut().zip(source).take(num_samples) {
                *out = channel.tick(sample, feedback_level, wet_level);
            }
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_delay_time(&self) -> f32 {
        self.max_delay_time
    }

    pub fn wet_level(&self) -> f32 {
        self.wet_level
    }

    pub fn feedback_level(&self) -> f32 {
        self.feedback_level
    }

    /// Channels processed per block, as set by the last `prepare()`.
    pub fn active_channels(&self) -> usize {
        self.active_channels
    }

    /// Buffer capacity in samples (the same for every channel).
    pub fn capacity(&self) -> usize {
        self.channels
            .first()
            .map_or(0, |channel| channel.line.capacity())
    }

    /// `channel`'s delay time in seconds, after clamping.
    pub fn delay_time(&self, channel: usize) -> f32 {
        self.channels
            .get(channel)
            .map_or(0.0, |channel| channel.delay_time)
    }

    /// `channel`'s delay time in samples.
    pub fn delay_samples(&self, channel: usize) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |channel| channel.delay_samples)
    }

    /// The longest delay, in samples, among the active channels.
    pub fn longest_delay_samples(&self) -> usize {
        self.channels
            .iter()
            .take(self.active_channels)
            .map(|channel| channel.delay_samples)
            .max()
            .unwrap_or(0)
    }

    fn store_sample_rate(&mut self, sample_rate: f32) {
        let valid = sample_rate.is_finite() && sample_rate > 0.0;
        debug_assert!(valid, "invalid sample rate {sample_rate}");
        if valid {
            self.sample_rate = sample_rate;
        }
    }

    fn resize_lines(&mut self) {
        let capacity = capacity_for(self.max_delay_time, self.sample_rate);
        for channel in &mut self.channels {
            channel.line.resize(capacity);
        }

        if capacity.get() == MAX_CAPACITY {
            nih_warn!(
                "Delay lines capped at {} samples, {} s at {} Hz was requested",
                MAX_CAPACITY,
                self.max_delay_time,
                self.sample_rate
            );
        }

        nih_log!(
            "Delay lines resized to {} samples ({} s at {} Hz)",
            capacity,
            self.max_delay_time,
            self.sample_rate
        );
    }

    fn update_delay_samples(&mut self) {
        for channel in &mut self.channels {
            channel.update_delay_samples(self.sample_rate);
        }
    }

    fn update_filters(&mut self) {
        for channel in &mut self.channels {
            channel.filter.set_cutoff(FEEDBACK_CUTOFF_HZ, self.sample_rate);
        }
    }
}
