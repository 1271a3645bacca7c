use crate::error::Error;

#[derive(Copy, Clone)]
pub enum ResamplingQuality {
    SincBestQuality = libsamplerate::SRC_SINC_BEST_QUALITY as isize,
    SincMediumQuality = libsamplerate::SRC_SINC_MEDIUM_QUALITY as isize,
    SincFastest = libsamplerate::SRC_SINC_FASTEST as isize,
    ZeroOrderHold = libsamplerate::SRC_ZERO_ORDER_HOLD as isize,
    Linear = libsamplerate::SRC_LINEAR as isize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResamplingSpec {
    pub from_rate: usize,
    pub to_rate: usize,
    pub channels: usize,
}

impl ResamplingSpec {
    pub fn max_output_size(&self, max_input_size: usize) -> usize {
        (self.ratio() * max_input_size as f64 * 1.2) as usize + self.channels
    }

    pub fn ratio(&self) -> f64 {
        self.to_rate as f64 / self.from_rate as f64
    }
}

/// Sample-rate converter.  Holds native state, so it stays on the thread that
/// created it.
pub struct AudioResampler {
    pub spec: ResamplingSpec,
    state: *mut libsamplerate::SRC_STATE,
}

impl AudioResampler {
    pub fn new(quality: ResamplingQuality, spec: ResamplingSpec) -> Result<Self, Error> {
        let mut error_int = 0i32;
        let state = unsafe {
            libsamplerate::src_new(
                quality as i32,
                spec.channels as i32,
                &mut error_int as *mut i32,
            )
        };
        if error_int != 0 || state.is_null() {
            Err(Error::ResamplingError(error_int))
        } else {
            Ok(Self { state, spec })
        }
    }

    /// Resample interleaved `input` into `output`, which must hold at least
    /// `spec.max_output_size(input.len())` samples.  Returns the number of
    /// samples written.
    pub fn resample(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize, Error> {
        if self.spec.from_rate == self.spec.to_rate {
            // Equal rates need no conversion at all.
            let output = &mut output[..input.len()];
            output.copy_from_slice(input);
            return Ok(output.len());
        }
        let mut src = libsamplerate::SRC_DATA {
            data_in: input.as_ptr(),
            data_out: output.as_mut_ptr(),
            input_frames: (input.len() / self.spec.channels) as _,
            output_frames: (output.len() / self.spec.channels) as _,
            src_ratio: self.spec.ratio(),
            end_of_input: 0,
            input_frames_used: 0,
            output_frames_gen: 0,
        };
        let error_int = unsafe { libsamplerate::src_process(self.state, &mut src as *mut _) };
        if error_int != 0 {
            Err(Error::ResamplingError(error_int))
        } else {
            let output_len = src.output_frames_gen as usize * self.spec.channels;
            let processed_len = src.input_frames_used as usize * self.spec.channels;
            if processed_len != input.len() {
                log::warn!("skipping frames while resampling");
            }
            Ok(output_len)
        }
    }
}

impl Drop for AudioResampler {
    fn drop(&mut self) {
        unsafe { libsamplerate::src_delete(self.state) };
    }
}

/// Map interleaved samples from `from` channels to `to` channels.  Mono is
/// spread over all outputs, surplus input channels are dropped and missing
/// ones are silent.
pub fn remix(input: &[f32], from: usize, to: usize, output: &mut Vec<f32>) {
    output.clear();
    if from == to {
        output.extend_from_slice(input);
        return;
    }
    for frame in input.chunks_exact(from) {
        for channel in 0..to {
            let sample = if from == 1 {
                frame[0]
            } else {
                frame.get(channel).copied().unwrap_or(0.0)
            };
            output.push(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_rates_pass_through() {
        let spec = ResamplingSpec {
            from_rate: 44_100,
            to_rate: 44_100,
            channels: 2,
        };
        let mut resampler = AudioResampler::new(ResamplingQuality::Linear, spec).unwrap();
        let input = [0.1, 0.2, 0.3, 0.4];
        let mut output = vec![0.0; spec.max_output_size(input.len())];
        let written = resampler.resample(&input, &mut output).unwrap();
        assert_eq!(&output[..written], &input);
    }

    #[test]
    fn upsampling_produces_more_frames() {
        let spec = ResamplingSpec {
            from_rate: 22_050,
            to_rate: 44_100,
            channels: 1,
        };
        let mut resampler = AudioResampler::new(ResamplingQuality::Linear, spec).unwrap();
        let input = vec![0.25; 1024];
        let mut output = vec![0.0; spec.max_output_size(input.len())];
        let written = resampler.resample(&input, &mut output).unwrap();
        assert!(written > input.len());
        assert!(written <= output.len());
    }

    #[test]
    fn remixing_channels() {
        let mut output = Vec::new();
        remix(&[1.0, 2.0], 1, 2, &mut output);
        assert_eq!(output, vec![1.0, 1.0, 2.0, 2.0]);

        remix(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2, &mut output);
        assert_eq!(output, vec![1.0, 2.0, 4.0, 5.0]);

        remix(&[1.0, 2.0], 2, 2, &mut output);
        assert_eq!(output, vec![1.0, 2.0]);
    }
}
