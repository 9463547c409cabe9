//! # Audio Blocks
//!
//! The engine doesn't care where its audio comes from. All it needs is a
//! rectangle of `channels × samples` floats it can read and write, and
//! [`AudioBlock`] is exactly that.
//!
//! Anything that is a list of channel slices already qualifies:
//!
//! - `[&mut [f32]]`, which is what nih-plug's `Buffer::as_slice()` hands
//!   us on the audio thread
//! - `[Vec<f32>]` and `Vec<Vec<f32>>`, handy in tests and offline tools

/// A mutable view over `channels × samples` of `f32` audio.
pub trait AudioBlock {
    fn num_channels(&self) -> usize;

    /// Samples per channel. All channels in a block have the same length.
    fn num_samples(&self) -> usize;

    fn channel(&self, index: usize) -> &[f32];

    fn channel_mut(&mut self, index: usize) -> &mut [f32];
}

impl<C> AudioBlock for [C]
where
    C: AsRef<[f32]> + AsMut<[f32]>,
{
    fn num_channels(&self) -> usize {
        self.len()
    }

    fn num_samples(&self) -> usize {
        self.first().map_or(0, |channel| channel.as_ref().len())
    }

    fn channel(&self, index: usize) -> &[f32] {
        self[index].as_ref()
    }

    fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        self[index].as_mut()
    }
}

impl<C> AudioBlock for Vec<C>
where
    C: AsRef<[f32]> + AsMut<[f32]>,
{
    fn num_channels(&self) -> usize {
        self.as_slice().num_channels()
    }

    fn num_samples(&self) -> usize {
        self.as_slice().num_samples()
    }

    fn channel(&self, index: usize) -> &[f32] {
        self.as_slice().channel(index)
    }

    fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        self.as_mut_slice().channel_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrowed_slices_are_a_block() {
        let mut left = [0.0_f32; 4];
        let mut right = [1.0_f32; 4];
        let mut channels: [&mut [f32]; 2] = [&mut left, &mut right];
        let block: &mut [&mut [f32]] = &mut channels;

        assert_eq!(block.num_channels(), 2);
        assert_eq!(block.num_samples(), 4);

        block.channel_mut(1)[2] = -1.0;
        assert_eq!(block.channel(1), &[1.0_f32, 1.0, -1.0, 1.0][..]);
        assert_eq!(block.channel(0), &[0.0_f32; 4][..]);
    }

    #[test]
    fn test_empty_block_has_no_samples() {
        let block: Vec<Vec<f32>> = Vec::new();

        assert_eq!(block.num_channels(), 0);
        assert_eq!(block.num_samples(), 0);
    }
}
