//! # Loveless Saturating Delay — An AU/VST3/CLAP Delay Plugin
//!
//! A stereo feedback delay whose loop runs through an arctangent
//! saturator, built with [nih-plug](https://github.com/robbert-vdh/nih-plug).
//! Outputs Audio Unit (AUv2), VST3, and CLAP formats from a single
//! codebase.
//!
//! ## Signal Flow (per channel)
//!
//! ```text
//! Input ──┬──────────────────────────────►(+)──► atan ──────────────► Output
//!         │                                ▲
//!         │                                └────── × wet ◄──────┐
//!         │    ┌────────────────────────────────────────────┐   │
//!         │    │              FEEDBACK LOOP                 │   │
//!         └──►(+)──► atan ──► [Circular Buffer] ──► [High-pass] ┤
//!              ▲               (N samples ago)      (blocks DC) │
//!              └──────────────────── × feedback ◄───────────────┘
//! ```
//!
//! The DSP lives in [`dsp`] and knows nothing about plugins. This file is
//! the glue: it turns host callbacks into engine calls.

pub mod dsp;
pub mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use dsp::{DelayControls, FeedbackDelay};
use nih_plug::prelude::*;
use no_denormals::no_denormals;
use params::DelayParams;

/// Most channels the plugin ever processes.
pub const MAX_CHANNELS: usize = 2;

/// The main plugin struct.
///
/// Three pieces of state, each with a different owner:
///
/// - `params` is shared with the host and read from any thread.
/// - `controls` is shared between the parameter callbacks (any thread)
///   and the audio thread. It is the only path by which configuration
///   reaches the engine.
/// - `delay` is owned by the audio thread alone.
struct SaturatingDelay {
    params: Arc<DelayParams>,
    controls: Arc<DelayControls<MAX_CHANNELS>>,
    delay: FeedbackDelay<MAX_CHANNELS>,
}

impl Default for SaturatingDelay {
    fn default() -> Self {
        let controls = Arc::new(DelayControls::default());
        let params = Arc::new(DelayParams::new(&controls));
        params.publish(&controls);

        Self {
            params,
            controls,
            // Sized for 44.1 kHz stereo. initialize() re-prepares it
            // once the host tells us the real configuration.
            delay: FeedbackDelay::new(),
        }
    }
}

impl Plugin for SaturatingDelay {
    const NAME: &'static str = "Loveless Saturating Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first, mono as a fallback. Input and output always match:
    // the engine processes each channel in place.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Parameters are applied once per block, so splitting blocks at
    // automation points is what gives automation sample accuracy.
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Called when the plugin is loaded or the audio configuration
    /// changes. This is the only place the delay buffers are allocated.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_output_channels
            .map(|c| c.get() as usize)
            .unwrap_or(MAX_CHANNELS);

        if num_channels > MAX_CHANNELS {
            nih_warn!("Rejecting {num_channels}-channel layout, at most {MAX_CHANNELS} supported");
            return false;
        }

        self.delay.prepare(buffer_config.sample_rate, num_channels);

        // A preset may have been loaded while we weren't running.
        self.params.publish(&self.controls);

        nih_log!(
            "Initialized at {} Hz with {} channel(s)",
            buffer_config.sample_rate,
            num_channels
        );
        true
    }

    /// Called when playback stops or the plugin is bypassed. Clears the
    /// echoes so stale audio doesn't come back on the next play.
    fn reset(&mut self) {
        self.delay.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        // The changed flag is consumed here, once per block, never per
        // sample. Synced delays are re-resolved every block regardless
        // because the host tempo can move without any parameter changing.
        let changed = self.delay.apply_controls(&self.controls);
        if changed || self.params.sync.value() {
            let times = self
                .params
                .time_settings()
                .resolve(context.transport().tempo);
            for (channel, seconds) in times.into_iter().enumerate() {
                self.delay.set_delay_time(channel, seconds);
            }
        }

        let delay = &mut self.delay;
        let channels = buffer.as_slice();
        no_denormals(|| delay.process_replacing(channels));

        tail_status(self.delay.feedback_level(), self.delay.longest_delay_samples())
    }
}

/// How long the host should keep calling `process()` after the input
/// goes silent.
///
/// Each repeat is scaled by the feedback gain, so after `N` repeats the
/// level is `feedback^N`. Solving `feedback^N = 0.001` (-60 dB):
///
/// ```text
/// N = log10(0.001) / log10(feedback) = -3 / log10(feedback)
/// ```
///
/// At or above unity the saturator holds the repeats at a steady level
/// and they never die out, so the plugin asks to be kept alive.
fn tail_status(feedback: f32, delay_samples: usize) -> ProcessStatus {
    let feedback = feedback.abs();
    if feedback >= 1.0 {
        ProcessStatus::KeepAlive
    } else if feedback > 0.001 {
        let repeats = -3.0 / feedback.log10();
        ProcessStatus::Tail((repeats * delay_samples as f32) as u32)
    } else {
        // No feedback: a single echo, one delay period later.
        ProcessStatus::Tail(delay_samples as u32)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for SaturatingDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.loveless-saturating-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A feedback delay with a saturating loop and DC-blocking feedback filter");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
        ClapFeature::Distortion,
    ];
}

impl Vst3Plugin for SaturatingDelay {
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssSatDelay001";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Delay,
        Vst3SubCategory::Distortion,
    ];
}

nih_export_clap!(SaturatingDelay);
nih_export_vst3!(SaturatingDelay);

// AUv2 entry point for Logic Pro, generated from the CLAP export.
clap_wrapper::export_auv2!();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_without_feedback_is_one_period() {
        assert!(matches!(tail_status(0.0, 22050), ProcessStatus::Tail(22050)));
    }

    #[test]
    fn test_tail_grows_with_feedback() {
        // 0.1 feedback: -3 / -1 = 3 repeats.
        assert!(matches!(tail_status(0.1, 1000), ProcessStatus::Tail(2999..=3000)));

        let ProcessStatus::Tail(short) = tail_status(0.3, 1000) else {
            panic!("expected a finite tail");
        };
        let ProcessStatus::Tail(long) = tail_status(0.9, 1000) else {
            panic!("expected a finite tail");
        };
        assert!(long > short);
    }

    #[test]
    fn test_unity_feedback_keeps_alive() {
        assert!(matches!(tail_status(1.0, 100), ProcessStatus::KeepAlive));
        assert!(matches!(tail_status(-2.5, 100), ProcessStatus::KeepAlive));
    }

    /// The defaults reach the engine through the controls on the first
    /// block, exactly like a host-driven change would.
    #[test]
    fn test_defaults_flow_through_controls() {
        let mut plugin = SaturatingDelay::default();
        plugin.delay.prepare(44100.0, 2);

        assert!(plugin.delay.apply_controls(&plugin.controls));
        assert!((plugin.delay.wet_level() - 0.8).abs() < 1e-6);
        assert!((plugin.delay.feedback_level() - 0.5).abs() < 1e-6);
        assert_eq!(plugin.delay.delay_samples(0), 22050);
        assert_eq!(plugin.delay.delay_samples(1), 22050);

        assert!(!plugin.delay.apply_controls(&plugin.controls));
    }
}
