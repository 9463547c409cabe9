//! # First-Order High-Pass Filter
//!
//! A first-order (6 dB/octave) high-pass sits on the delay's feedback
//! path. Its job is housekeeping, not tone: every trip around the loop
//! passes through it, so any DC offset or sub-audio rumble that sneaks
//! into the delay line is bled away instead of piling up repeat after
//! repeat.
//!
//! ## The Filter Equation
//!
//! The analog prototype `H(s) = s / (s + ωc)` is mapped to the digital
//! domain with the bilinear transform, prewarped so the cutoff lands
//! exactly where we ask:
//!
//! ```text
//! n  = tan(π * cutoff / sample_rate)
//! b0 =  1 / (1 + n)
//! b1 = -1 / (1 + n)
//! a1 = (n - 1) / (n + 1)
//!
//! y[n] = b0 * x[n] + b1 * x[n-1] - a1 * y[n-1]
//! ```
//!
//! Because `b0 + b1 = 0`, a constant input produces zero output: DC is
//! blocked completely. At Nyquist the gain is exactly 1.
//!
//! ## Transposed Direct Form II
//!
//! The difference equation above needs two memories (`x[n-1]` and
//! `y[n-1]`). Rearranged into transposed direct form II it needs only
//! one:
//!
//! ```text
//! y     = b0 * x + state
//! state = b1 * x - a1 * y
//! ```

use std::f32::consts::PI;

/// Conditioning frequency for the feedback path, in Hz.
pub const FEEDBACK_CUTOFF_HZ: f32 = 1000.0;

/// A first-order high-pass filter with a single state variable.
#[derive(Debug, Clone, PartialEq)]
pub struct HighPassFilter {
    b0: f32,
    b1: f32,
    a1: f32,

    /// The only memory the filter has. Cleared by [`reset()`](Self::reset).
    state: f32,
}

impl Default for HighPassFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl HighPassFilter {
    /// Create a filter that passes everything through unchanged until
    /// [`set_cutoff()`](Self::set_cutoff) is called.
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            a1: 0.0,
            state: 0.0,
        }
    }

    /// Recompute the coefficients for `cutoff_hz` at `sample_rate`.
    ///
    /// # Arguments
    /// * `cutoff_hz` - Corner frequency in Hertz. Content below it is
    ///   attenuated at 6 dB per octave.
    /// * `sample_rate` - Current audio sample rate, must be positive.
    ///
    /// The cutoff is raised to at least 1 Hz and then capped at 49% of the
    /// sample rate. The tangent prewarp blows up at Nyquist, so we stay
    /// just below it. At absurdly low sample rates (below about 2 Hz) the
    /// cap wins and the filter degenerates to a near-Nyquist corner
    /// instead of failing. The filter memory is left alone.
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        // The upper bound can fall below 1 Hz, which `clamp` rejects with
        // a panic.
        let safe_cutoff = cutoff_hz.max(1.0).min(sample_rate * 0.49);
        let n = (PI * safe_cutoff / sample_rate).tan();

        self.b0 = 1.0 / (1.0 + n);
        self.b1 = -self.b0;
        self.a1 = (n - 1.0) / (n + 1.0);
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.state;
        self.state = self.b1 * input - self.a1 * output;
        output
    }

    /// Forget the filter's history.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_before_cutoff_is_set() {
        let mut filter = HighPassFilter::new();

        for input in [1.0, 0.5, -0.3, 0.0] {
            let output = filter.process(input);
            assert!(
                (output - input).abs() < 1e-6,
                "Filter should pass {input} through unchanged, got {output}"
            );
        }
    }

    /// A constant input must decay to silence. This is the property the
    /// delay relies on to keep DC from accumulating in the loop.
    #[test]
    fn test_dc_is_blocked() {
        let mut filter = HighPassFilter::new();
        filter.set_cutoff(FEEDBACK_CUTOFF_HZ, 44100.0);

        let mut output = 1.0;
        for _ in 0..10_000 {
            output = filter.process(1.0);
        }

        assert!(output.abs() < 1e-4, "DC should be blocked, got {output}");
    }

    /// The alternating +1/-1 signal is the Nyquist frequency, the highest
    /// frequency representable. A high-pass should leave it at full level.
    #[test]
    fn test_nyquist_passes_through() {
        let mut filter = HighPassFilter::new();
        filter.set_cutoff(FEEDBACK_CUTOFF_HZ, 44100.0);

        let mut max_output = 0.0_f32;
        for i in 0..2000 {
            let input = if i % 2 == 0 { 1.0 } else { -1.0 };
            let output = filter.process(input);
            if i > 1000 {
                max_output = max_output.max(output.abs());
            }
        }

        assert!(
            (max_output - 1.0).abs() < 1e-3,
            "Expected unity gain at Nyquist, got {max_output}"
        );
    }

    #[test]
    fn test_coefficients_for_known_cutoff() {
        let mut filter = HighPassFilter::new();
        filter.set_cutoff(1000.0, 44100.0);

        // tan(π * 1000 / 44100) ≈ 0.071358
        assert!((filter.b0 - 0.933395).abs() < 1e-4, "b0 = {}", filter.b0);
        assert!((filter.b0 + filter.b1).abs() < 1e-7);
        assert!((filter.a1 + 0.866790).abs() < 1e-4, "a1 = {}", filter.a1);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = HighPassFilter::new();
        filter.set_cutoff(1000.0, 44100.0);

        filter.process(1.0);
        assert!(filter.state.abs() > 0.0, "state should be non-zero");

        filter.reset();
        assert!(filter.state.abs() < 1e-9, "state should be zero after reset");

        // And a reset filter behaves like a fresh one.
        let mut fresh = HighPassFilter::new();
        fresh.set_cutoff(1000.0, 44100.0);
        assert_eq!(filter, fresh);
    }

    /// Cutoffs at or above Nyquist are clamped instead of producing NaN.
    #[test]
    fn test_cutoff_is_clamped_below_nyquist() {
        let mut filter = HighPassFilter::new();
        filter.set_cutoff(30_000.0, 44100.0);

        let output = filter.process(1.0);
        assert!(output.is_finite(), "Expected a finite output, got {output}");
    }

    /// Below ~2 Hz the Nyquist cap sits under the 1 Hz floor. The filter
    /// must still come out finite and stable.
    #[test]
    fn test_tiny_sample_rate_gives_degenerate_filter() {
        for sample_rate in [2.0, 1.0, 0.5, 0.01] {
            let mut filter = HighPassFilter::new();
            filter.set_cutoff(FEEDBACK_CUTOFF_HZ, sample_rate);

            assert!(filter.b0.is_finite() && filter.a1.is_finite());
            assert!(filter.a1.abs() < 1.0, "unstable pole {} at {sample_rate} Hz", filter.a1);

            for i in 0..1000 {
                let input = if i % 3 == 0 { 1.0 } else { -0.5 };
                let output = filter.process(input);
                assert!(output.is_finite(), "{sample_rate} Hz: output {output}");
            }
        }
    }
}
