//! # Circular Sample Buffer
//!
//! A fixed-capacity ring of past samples. Each channel of the delay owns
//! exactly one. The buffer only ever answers one question: "what did I
//! store `N` writes ago?"
//!
//! ## Addressing
//!
//! The buffer keeps a cursor on the slot holding the *most recent* write.
//! A look-back distance counts backwards from that slot:
//!
//! ```text
//!   distance:     3     2     1
//!              ┌─────┬─────┬─────┬─────┬─────┐
//!   slots:     │ x-2 │ x-1 │  x  │ old │ old │
//!              └─────┴─────┴─────┴─────┴─────┘
//!                            ▲
//!                         cursor
//! ```
//!
//! `get(1)` is the previous write, `get(2)` the one before that, and so
//! on. Changing the delay time is just asking for a different distance,
//! so no data ever moves when the user turns the time knob.
//!
//! The valid distances are `1..capacity`. Distance 0 would be the slot
//! about to be overwritten, and `capacity` would wrap onto the cursor
//! itself, so both are contract violations. Debug builds assert on them;
//! release builds clamp into range so a bad caller degrades the sound
//! instead of crashing the host.

use std::num::NonZeroUsize;

/// A fixed-capacity ring buffer of audio samples.
///
/// The backing store is allocated by [`new()`](Self::new) and
/// [`resize()`](Self::resize) only. [`push()`](Self::push),
/// [`get()`](Self::get) and [`set()`](Self::set) never allocate, so they
/// are safe to call from the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularBuffer {
    /// Stored samples. The length is the capacity and never reaches 0.
    samples: Vec<f32>,

    /// Index of the slot holding the most recent write.
    cursor: usize,
}

impl CircularBuffer {
    /// Create a silent buffer holding `capacity` samples.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            samples: vec![0.0; capacity.get()],
            cursor: 0,
        }
    }

    /// Number of samples the buffer holds.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Store `sample` one slot ahead of the last write and move the
    /// cursor onto it.
    #[inline]
    pub fn push(&mut self, sample: f32) {
        self.cursor += 1;
        if self.cursor == self.samples.len() {
            self.cursor = 0;
        }
        self.samples[self.cursor] = sample;
    }

    /// Read the sample written `distance` pushes ago.
    ///
    /// Requires `0 < distance < capacity`.
    #[inline]
    pub fn get(&self, distance: usize) -> f32 {
        self.samples[self.index_of(distance)]
    }

    /// Overwrite the sample that [`get(distance)`](Self::get) would
    /// return, without moving the cursor.
    ///
    /// Requires `0 < distance < capacity`.
    pub fn set(&mut self, distance: usize, value: f32) {
        let index = self.index_of(distance);
        self.samples[index] = value;
    }

    /// Reallocate to `capacity` samples, discarding all history.
    ///
    /// This allocates, so it must never run while a block is being
    /// processed. The delay engine only calls it from `prepare()` and the
    /// sample-rate / maximum-time setters.
    pub fn resize(&mut self, capacity: NonZeroUsize) {
        self.samples.clear();
        self.samples.resize(capacity.get(), 0.0);
        self.cursor = 0;
    }

    /// Silence every stored sample. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Translate a look-back distance into a slot index.
    ///
    /// Adding the capacity before subtracting keeps the arithmetic in
    /// `usize` without underflow: on a ring of 100 with the cursor at 5,
    /// distance 10 lands on `(5 + 100 - 9) % 100 = 96`, which is nine
    /// slots behind the cursor (the cursor itself is distance 1).
    #[inline]
    fn index_of(&self, distance: usize) -> usize {
        let len = self.samples.len();
        debug_assert!(
            distance > 0 && distance < len,
            "look-back distance {distance} outside 1..{len}"
        );
        let distance = distance.min(len.saturating_sub(1)).max(1);
        (self.cursor + len - (distance - 1)) % len
    }
}
