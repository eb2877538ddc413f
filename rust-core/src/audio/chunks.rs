//! Period-sized slicing and channel-count adaptation for sample blocks
//!
//! Blocks are `(channels, samples)` arrays.

use ndarray::{s, Array2, ArrayView2, Axis};

/// Column windows `[start, end)` of at most `block` samples
///
/// The last window is shorter when `samples` is not a multiple of `block`.
#[derive(Debug, Clone)]
pub struct BlockRanges {
    next: usize,
    samples: usize,
    block: usize,
}

impl BlockRanges {
    pub fn new(samples: usize, block: usize) -> Self {
        Self {
            next: 0,
            // A zero-sized block would never advance
            samples: if block == 0 { 0 } else { samples },
            block,
        }
    }
}

impl Iterator for BlockRanges {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.samples {
            return None;
        }
        let start = self.next;
        let end = (start + self.block).min(self.samples);
        self.next = end;
        Some((start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = match self.block {
            0 => 0,
            block => (self.samples - self.next).div_ceil(block),
        };
        (left, Some(left))
    }
}

impl ExactSizeIterator for BlockRanges {}

/// Copy a short block into a zeroed `(channels, block)` array
pub fn pad_block(data: ArrayView2<f32>, block: usize) -> Array2<f32> {
    let mut padded = Array2::zeros((data.nrows(), block));
    let width = data.ncols().min(block);
    padded
        .slice_mut(s![.., ..width])
        .assign(&data.slice(s![.., ..width]));
    padded
}

/// Reshape `data` to `out_channels` rows for playback
///
/// # Arguments
/// * `data` - Block of shape `(channels, samples)`
/// * `out_channels` - Number of rows wanted
/// * `truncate` - Drop surplus rows instead of mixing them in
///
/// # Returns
/// A `(out_channels, samples)` array. With fewer rows than outputs, or with
/// `truncate`, rows repeat cyclically. With more rows than outputs the
/// per-sample mean of the surplus rows is mixed into the last output row.
/// An empty `data` gives silence.
pub fn adapt_channels(data: ArrayView2<f32>, out_channels: usize, truncate: bool) -> Array2<f32> {
    let (rows, samples) = data.dim();

    if rows == out_channels {
        return data.to_owned();
    }

    if rows == 0 {
        return Array2::zeros((out_channels, samples));
    }

    if rows < out_channels || truncate {
        return Array2::from_shape_fn((out_channels, samples), |(r, c)| data[[r % rows, c]]);
    }

    let mut adapted = data.slice(s![..out_channels, ..]).to_owned();
    if out_channels > 0 {
        if let Some(extra) = data.slice(s![out_channels.., ..]).mean_axis(Axis(0)) {
            let mut last = adapted.row_mut(out_channels - 1);
            last += &extra;
        }
    }
    adapted
}
