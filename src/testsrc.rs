//! Synthetic sources feeding the generator binaries: an I420 test picture and a
//! stereo test waveform.

/// Planar YUV 4:2:0 picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub width: usize,
    pub height: usize,
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

impl Picture {
    pub fn new(width: usize, height: usize) -> Self {
        let chroma = (width / 2) * (height / 2);
        Self {
            width,
            height,
            y: vec![0; width * height],
            u: vec![0; chroma],
            v: vec![0; chroma],
        }
    }

    pub fn chroma_width(&self) -> usize {
        self.width / 2
    }

    pub fn chroma_height(&self) -> usize {
        self.height / 2
    }

    /// Horizontal luma bands that scroll by one row per frame over neutral chroma.
    pub fn fill_test_pattern(&mut self, frame: u64) {
        let width = self.width;
        for (row, line) in self.y.chunks_exact_mut(width).enumerate() {
            line.fill(((row as u64 + frame) % 256) as u8);
        }
        self.u.fill(127);
        self.v.fill(127);
    }

    pub fn fill_solid(&mut self, y: u8, u: u8, v: u8) {
        self.y.fill(y);
        self.u.fill(u);
        self.v.fill(v);
    }
}

/// Stereo test tone: a sawtooth on the left channel whose slope follows the
/// block index, noise on the right.
///
/// Each block continues from the last left sample of the previous one.
pub struct Waveform {
    channels: usize,
    block_samples: usize,
    buffer: Vec<i16>,
    rng: fastrand::Rng,
}

impl Waveform {
    pub fn new(channels: usize, block_samples: usize) -> Self {
        Self {
            channels,
            block_samples,
            buffer: vec![0; channels * block_samples],
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_seed(channels: usize, block_samples: usize, seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            ..Self::new(channels, block_samples)
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn block_samples(&self) -> usize {
        self.block_samples
    }

    /// Produces the interleaved samples of block `index`.
    pub fn next_block(&mut self, index: u64) -> &[i16] {
        let step = (index % 1024) as i16;
        let channels = self.channels;
        let start = self.buffer[channels * (self.block_samples - 1)];

        for (i, frame) in self.buffer.chunks_exact_mut(channels).enumerate() {
            frame[0] = start.wrapping_add(((i + 1) as i16).wrapping_mul(step));
            for sample in &mut frame[1..] {
                *sample = self.rng.i16(..);
            }
        }
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_scrolls_with_frame() {
        let mut picture = Picture::new(8, 4);
        picture.fill_test_pattern(0);
        assert_eq!(&picture.y[..8], &[0; 8]);
        assert_eq!(&picture.y[8..16], &[1; 8]);
        assert!(picture.u.iter().all(|&c| c == 127));
        assert_eq!(picture.u.len(), 4 * 2);

        picture.fill_test_pattern(255);
        assert_eq!(picture.y[0], 255);
        assert_eq!(picture.y[8], 0);
    }

    #[test]
    fn test_solid_picture() {
        let mut picture = Picture::new(4, 4);
        picture.fill_solid(128, 64, 196);
        assert!(picture.y.iter().all(|&p| p == 128));
        assert!(picture.u.iter().all(|&p| p == 64));
        assert!(picture.v.iter().all(|&p| p == 196));
    }

    #[test]
    fn test_waveform_left_channel_ramp() {
        let mut waveform = Waveform::with_seed(2, 4, 7);
        let block = waveform.next_block(3).to_vec();
        assert_eq!(block.len(), 8);
        let left: Vec<i16> = block.iter().step_by(2).copied().collect();
        assert_eq!(left, vec![3, 6, 9, 12]);

        // next block continues from the last left sample
        let block = waveform.next_block(1).to_vec();
        let left: Vec<i16> = block.iter().step_by(2).copied().collect();
        assert_eq!(left, vec![13, 14, 15, 16]);
    }

    #[test]
    fn test_waveform_mono_has_no_noise_channel() {
        let mut waveform = Waveform::new(1, 3);
        assert_eq!(waveform.next_block(2), &[2, 4, 6]);
    }
}
