//! # DSP (Digital Signal Processing) Core
//!
//! Everything that touches audio samples lives here, with no dependency
//! on the plugin host:
//!
//! - **`circular_buffer`**: A fixed-capacity ring buffer that stores past
//!   samples and hands them back by look-back distance.
//!
//! - **`filter`**: A first-order high-pass on the feedback path that
//!   keeps DC and rumble from building up in the loop.
//!
//! - **`feedback_delay`**: The engine. One buffer and one filter per
//!   channel, an arctangent saturator in the loop, and the bookkeeping
//!   that turns seconds into samples.
//!
//! - **`controls`**: Lock-free configuration shared with other threads.
//!
//! - **`block`**: The `channels × samples` view the engine processes.

pub mod block;
pub mod circular_buffer;
pub mod controls;
pub mod feedback_delay;
pub mod filter;

pub use block::AudioBlock;
pub use controls::DelayControls;
pub use feedback_delay::FeedbackDelay;
