use rb::{Consumer, RbConsumer};

/// Types that can produce audio samples in `f32` format. `Send`able across
/// threads.
pub trait AudioSource: Send + 'static {
    /// Write at most `output.len()` samples into `output` and return how many
    /// were written.  Must never block, the output callback is real-time.
    fn write(&mut self, output: &mut [f32]) -> usize;
}

/// The decoding worker pushes whole frames into the ring-buffer, so reading
/// whatever is available is enough.
impl AudioSource for Consumer<f32> {
    fn write(&mut self, output: &mut [f32]) -> usize {
        self.read(output).unwrap_or(0)
    }
}

/// Silence.
pub struct Empty;

impl AudioSource for Empty {
    fn write(&mut self, _output: &mut [f32]) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use rb::{RbProducer, SpscRb, RB};

    use super::*;

    #[test]
    fn ring_buffer_consumer_never_blocks() {
        let rb = SpscRb::new(16);
        let mut consumer = rb.consumer();
        let mut output = [1.0; 8];
        assert_eq!(consumer.write(&mut output), 0);

        rb.producer().write(&[0.5; 4]).unwrap();
        assert_eq!(consumer.write(&mut output), 4);
        assert_eq!(&output[..4], &[0.5; 4]);
    }
}
