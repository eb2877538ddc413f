//! Lock-free per-channel ring buffers
//!
//! Each JACK port gets its own SPSC ring so the realtime thread can move a
//! whole period per port with a single `push_slice`/`pop_slice`.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// One ring per channel, not yet split between threads
pub struct ChannelRings {
    producers: Vec<HeapProducer<f32>>,
    consumers: Vec<HeapConsumer<f32>>,
    capacity: usize,
}

impl ChannelRings {
    /// Create `channels` rings holding `capacity` samples each
    pub fn new(channels: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (producers, consumers) = (0..channels)
            .map(|_| HeapRb::<f32>::new(capacity).split())
            .unzip();

        Self {
            producers,
            consumers,
            capacity,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (ChannelProducers, ChannelConsumers) {
        (
            ChannelProducers {
                producers: self.producers,
                capacity: self.capacity,
            },
            ChannelConsumers {
                consumers: self.consumers,
                capacity: self.capacity,
            },
        )
    }

    pub fn channels(&self) -> usize {
        self.producers.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Writing end of a set of channel rings
pub struct ChannelProducers {
    producers: Vec<HeapProducer<f32>>,
    capacity: usize,
}

impl ChannelProducers {
    /// Write samples to one channel
    ///
    /// # Arguments
    /// * `channel` - Ring index, unknown channels are ignored
    /// * `samples` - Samples to append
    ///
    /// # Returns
    /// Number of samples actually written (less if the ring is full)
    #[inline]
    pub fn write(&mut self, channel: usize, samples: &[f32]) -> usize {
        match self.producers.get_mut(channel) {
            Some(producer) => producer.push_slice(samples),
            None => 0,
        }
    }

    /// Smallest free space across all channels
    pub fn free_len(&self) -> usize {
        self.producers
            .iter()
            .map(|p| p.free_len())
            .min()
            .unwrap_or(usize::MAX)
    }

    /// Check if every channel has space for n samples
    pub fn has_space(&self, n: usize) -> bool {
        self.free_len() >= n
    }

    /// Samples still waiting to be consumed on the fullest channel
    pub fn pending(&self) -> usize {
        self.capacity.saturating_sub(self.free_len())
    }

    pub fn channels(&self) -> usize {
        self.producers.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Reading end of a set of channel rings
pub struct ChannelConsumers {
    consumers: Vec<HeapConsumer<f32>>,
    capacity: usize,
}

impl ChannelConsumers {
    /// Read samples from one channel
    ///
    /// Returns the number of samples actually read.
    #[inline]
    pub fn read(&mut self, channel: usize, buffer: &mut [f32]) -> usize {
        match self.consumers.get_mut(channel) {
            Some(consumer) => consumer.pop_slice(buffer),
            None => 0,
        }
    }

    /// Smallest number of queued samples across all channels
    pub fn len(&self) -> usize {
        self.consumers
            .iter()
            .map(|c| c.len())
            .min()
            .unwrap_or(usize::MAX)
    }

    /// Check if every channel has n samples available
    pub fn has_data(&self, n: usize) -> bool {
        self.len() >= n
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.iter().all(|c| c.is_empty())
    }

    /// Drop the oldest n samples from every channel
    pub fn discard(&mut self, n: usize) {
        for consumer in self.consumers.iter_mut() {
            consumer.skip(n);
        }
    }

    pub fn channels(&self) -> usize {
        self.consumers.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_write_read() {
        let (mut producers, mut consumers) = ChannelRings::new(2, 16).split();

        assert_eq!(producers.write(0, &[1.0, 2.0, 3.0]), 3);
        assert_eq!(producers.write(1, &[4.0, 5.0, 6.0]), 3);
        assert!(consumers.has_data(3));

        let mut out = [0.0; 3];
        assert_eq!(consumers.read(1, &mut out), 3);
        assert_eq!(out, [4.0, 5.0, 6.0]);

        // channel 0 is untouched by reading channel 1
        assert_eq!(consumers.read(0, &mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert!(consumers.is_empty());
    }

    #[test]
    fn test_lengths_track_slowest_channel() {
        let (mut producers, consumers) = ChannelRings::new(2, 8).split();

        producers.write(0, &[0.5; 6]);
        producers.write(1, &[0.5; 2]);

        assert_eq!(consumers.len(), 2);
        assert!(!consumers.has_data(3));
        assert_eq!(producers.free_len(), 2);
        assert!(!producers.has_space(4));
    }

    #[test]
    fn test_pending_and_discard() {
        let (mut producers, mut consumers) = ChannelRings::new(2, 8).split();

        producers.write(0, &[1.0, 2.0, 3.0, 4.0]);
        producers.write(1, &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(producers.pending(), 4);

        consumers.discard(3);
        assert_eq!(consumers.len(), 1);

        let mut out = [0.0; 1];
        consumers.read(1, &mut out);
        assert_eq!(out, [8.0]);
    }

    #[test]
    fn test_overflow_is_partial() {
        let (mut producers, _consumers) = ChannelRings::new(1, 4).split();
        assert!(producers.write(0, &[1.0; 10]) <= 4);
    }

    #[test]
    fn test_unknown_channel() {
        let (mut producers, mut consumers) = ChannelRings::new(1, 4).split();
        assert_eq!(producers.write(3, &[1.0]), 0);
        assert_eq!(consumers.read(3, &mut [0.0]), 0);
    }

    #[test]
    fn test_no_channels_never_blocks() {
        let rings = ChannelRings::new(0, 4);
        assert_eq!(rings.channels(), 0);
        let (producers, consumers) = rings.split();
        assert!(producers.has_space(1024));
        assert!(consumers.has_data(1024));
    }
}
