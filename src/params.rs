//! # Plugin Parameters
//!
//! Parameters are the knobs and switches the user sees in the DAW. Each
//! has a **unique string ID** (`#[id = "..."]`) the host uses to save and
//! recall presets, so once published these IDs must never change.
//!
//! ## From Knobs to the Engine
//!
//! The delay engine never reads these parameters directly. Instead every
//! parameter carries a callback that fires on whichever thread changed
//! it (automation, the generic editor, a preset load) and writes into the
//! shared [`DelayControls`]:
//!
//! - the two delay times and the two level knobs store their value
//! - everything else (link, sync, rates) only raises the changed flag
//!
//! The audio thread notices the flag at the start of the next block and
//! applies the new configuration in one go.
//!
//! No smoothing is applied: a delay-time change jumps straight to the new
//! read position.

use std::sync::Arc;

use nih_plug::prelude::*;

use crate::dsp::feedback_delay::{DEFAULT_DELAY_TIME, DEFAULT_MAX_DELAY_TIME};
use crate::dsp::DelayControls;

/// Shortest delay the time knobs allow, in seconds.
pub const MIN_DELAY_TIME: f32 = 0.01;

pub const DEFAULT_WET_PERCENT: i32 = 80;
pub const DEFAULT_FEEDBACK_PERCENT: i32 = 50;

/// Turn a 0–100 knob into a gain.
pub fn percent_to_gain(percent: i32) -> f32 {
    percent as f32 * 0.01
}

/// Note value a synced channel's delay is locked to.
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRate {
    #[id = "quarter"]
    #[name = "1/4"]
    Quarter,
    #[id = "eighth"]
    #[name = "1/8"]
    Eighth,
    #[id = "sixteenth"]
    #[name = "1/16"]
    Sixteenth,
}

impl SyncRate {
    /// Length of this note value in beats.
    pub fn beats(self) -> f32 {
        match self {
            SyncRate::Quarter => 1.0,
            SyncRate::Eighth => 0.5,
            SyncRate::Sixteenth => 0.25,
        }
    }

    /// Delay time in seconds for this note value at `bpm`.
    ///
    /// One beat lasts `60 / bpm` seconds: 0.5 s at 120 BPM.
    pub fn seconds_at(self, bpm: f64) -> f32 {
        (60.0 / bpm) as f32 * self.beats()
    }
}

/// A snapshot of every parameter that decides the two delay times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSettings {
    pub manual: [f32; 2],
    pub link: bool,
    pub linked: f32,
    pub sync: bool,
    pub rates: [SyncRate; 2],
}

impl TimeSettings {
    /// Work out the left and right delay times in seconds.
    ///
    /// Sync wins when it is on and the host reports a usable tempo.
    /// Otherwise link, when on, drives both channels from one knob.
    /// Otherwise each channel uses its own knob.
    pub fn resolve(&self, tempo: Option<f64>) -> [f32; 2] {
        if self.sync {
            if let Some(bpm) = tempo.filter(|bpm| bpm.is_finite() && *bpm > 0.0) {
                return self.rates.map(|rate| rate.seconds_at(bpm));
            }
        }
        if self.link {
            return [self.linked; 2];
        }
        self.manual
    }
}

/// All user-facing parameters for the Loveless Saturating Delay.
#[derive(Params)]
pub struct DelayParams {
    /// **Left Delay Time** in seconds, used when neither link nor sync
    /// is on.
    #[id = "ldly"]
    pub left_delay_time: FloatParam,

    /// **Right Delay Time** in seconds.
    #[id = "rdly"]
    pub right_delay_time: FloatParam,

    /// **Wet** — how much of the delayed signal reaches the output.
    /// The dry signal always passes (through the saturator).
    #[id = "wet"]
    pub wet: IntParam,

    /// **Feedback** — how much of the delayed signal goes back into the
    /// loop. Unlike a linear delay this can safely sit at 100%: the
    /// saturator keeps the repeats from growing without bound.
    #[id = "fdbk"]
    pub feedback: IntParam,

    /// **Link** — drive both channels from the single Delay Time knob.
    #[id = "link"]
    pub link: BoolParam,

    /// **Delay Time** used for both channels while linked.
    #[id = "dly"]
    pub linked_delay_time: FloatParam,

    /// **Sync** — lock each channel to a note value at the host tempo.
    #[id = "sync"]
    pub sync: BoolParam,

    #[id = "lrate"]
    pub left_sync_rate: EnumParam<SyncRate>,

    #[id = "rrate"]
    pub right_sync_rate: EnumParam<SyncRate>,
}

/// A callback that only raises the changed flag.
fn mark_changed_on<T: 'static>(controls: &Arc<DelayControls>) -> Arc<dyn Fn(T) + Send + Sync> {
    let controls = Arc::clone(controls);
    Arc::new(move |_: T| controls.mark_changed())
}

/// A seconds knob shared by the three delay-time parameters.
fn delay_time_param(name: &str, callback: Arc<dyn Fn(f32) + Send + Sync>) -> FloatParam {
    FloatParam::new(
        name,
        DEFAULT_DELAY_TIME,
        FloatRange::Skewed {
            min: MIN_DELAY_TIME,
            max: DEFAULT_MAX_DELAY_TIME,
            // More knob travel for short delays, where small changes are
            // easiest to hear.
            factor: FloatRange::skew_factor(-1.0),
        },
    )
    .with_unit(" s")
    .with_step_size(0.001)
    .with_value_to_string(formatters::v2s_f32_rounded(3))
    .with_callback(callback)
}

fn level_param(name: &str, default: i32, callback: Arc<dyn Fn(i32) + Send + Sync>) -> IntParam {
    IntParam::new(name, default, IntRange::Linear { min: 0, max: 100 })
        .with_unit("%")
        .with_callback(callback)
}

impl DelayParams {
    /// Build the parameters with callbacks that publish into `controls`.
    pub fn new(controls: &Arc<DelayControls>) -> Self {
        let left = Arc::clone(controls);
        let right = Arc::clone(controls);
        let wet = Arc::clone(controls);
        let feedback = Arc::clone(controls);

        Self {
            left_delay_time: delay_time_param(
                "Left Delay Time",
                Arc::new(move |seconds: f32| left.set_delay_time(0, seconds)),
            ),
            right_delay_time: delay_time_param(
                "Right Delay Time",
                Arc::new(move |seconds: f32| right.set_delay_time(1, seconds)),
            ),
            wet: level_param(
                "Wet",
                DEFAULT_WET_PERCENT,
                Arc::new(move |percent: i32| wet.set_wet_level(percent_to_gain(percent))),
            ),
            feedback: level_param(
                "Feedback Level",
                DEFAULT_FEEDBACK_PERCENT,
                Arc::new(move |percent: i32| feedback.set_feedback_level(percent_to_gain(percent))),
            ),
            link: BoolParam::new("Link", false).with_callback(mark_changed_on(controls)),
            linked_delay_time: delay_time_param("Delay Time", mark_changed_on(controls)),
            sync: BoolParam::new("Sync", false).with_callback(mark_changed_on(controls)),
            left_sync_rate: EnumParam::new("Left Sync Rate", SyncRate::Quarter)
                .with_callback(mark_changed_on(controls)),
            right_sync_rate: EnumParam::new("Right Sync Rate", SyncRate::Quarter)
                .with_callback(mark_changed_on(controls)),
        }
    }

    /// Write every current value into `controls`.
    ///
    /// Callbacks only fire on changes, so this is how the controls catch
    /// up with the parameters at construction and after the host
    /// re-initializes the plugin.
    pub fn publish(&self, controls: &DelayControls) {
        controls.set_delay_time(0, self.left_delay_time.value());
        controls.set_delay_time(1, self.right_delay_time.value());
        controls.set_wet_level(percent_to_gain(self.wet.value()));
        controls.set_feedback_level(percent_to_gain(self.feedback.value()));
    }

    pub fn time_settings(&self) -> TimeSettings {
        TimeSettings {
            manual: [self.left_delay_time.value(), self.right_delay_time.value()],
            link: self.link.value(),
            linked: self.linked_delay_time.value(),
            sync: self.sync.value(),
            rates: [self.left_sync_rate.value(), self.right_sync_rate.value()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> TimeSettings {
        TimeSettings {
            manual: [0.3, 0.45],
            link: false,
            linked: 1.2,
            sync: false,
            rates: [SyncRate::Quarter, SyncRate::Eighth],
        }
    }

    #[test]
    fn test_percent_to_gain() {
        assert_eq!(percent_to_gain(0), 0.0);
        assert!((percent_to_gain(80) - 0.8).abs() < 1e-6);
        assert!((percent_to_gain(100) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sync_rate_seconds() {
        assert!((SyncRate::Quarter.seconds_at(120.0) - 0.5).abs() < 1e-6);
        assert!((SyncRate::Eighth.seconds_at(120.0) - 0.25).abs() < 1e-6);
        assert!((SyncRate::Sixteenth.seconds_at(90.0) - 1.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_manual_times() {
        assert_eq!(manual().resolve(Some(120.0)), [0.3, 0.45]);
    }

    #[test]
    fn test_link_drives_both_channels() {
        let settings = TimeSettings {
            link: true,
            ..manual()
        };
        assert_eq!(settings.resolve(None), [1.2, 1.2]);
    }

    #[test]
    fn test_sync_follows_tempo() {
        let settings = TimeSettings {
            sync: true,
            link: true,
            ..manual()
        };
        let [left, right] = settings.resolve(Some(120.0));
        assert!((left - 0.5).abs() < 1e-6);
        assert!((right - 0.25).abs() < 1e-6);
    }

    /// Without a tempo from the host, sync falls back to link/manual.
    #[test]
    fn test_sync_without_tempo_falls_back() {
        let settings = TimeSettings {
            sync: true,
            ..manual()
        };
        assert_eq!(settings.resolve(None), [0.3, 0.45]);
        assert_eq!(settings.resolve(Some(0.0)), [0.3, 0.45]);
    }

    #[test]
    fn test_publish_writes_defaults() {
        let controls = Arc::new(DelayControls::default());
        let params = DelayParams::new(&controls);
        controls.take_changed();

        params.publish(&controls);

        assert!(controls.take_changed());
        assert!((controls.delay_time(0) - DEFAULT_DELAY_TIME).abs() < 1e-6);
        assert!((controls.delay_time(1) - DEFAULT_DELAY_TIME).abs() < 1e-6);
        assert!((controls.wet_level() - 0.8).abs() < 1e-6);
        assert!((controls.feedback_level() - 0.5).abs() < 1e-6);

        assert_eq!(
            params.time_settings(),
            TimeSettings {
                manual: [DEFAULT_DELAY_TIME; 2],
                link: false,
                linked: DEFAULT_DELAY_TIME,
                sync: false,
                rates: [SyncRate::Quarter; 2],
            }
        );
    }
}
