use crate::audio::source::AudioSource;

#[cfg(feature = "cpal")]
pub mod cpal;

#[cfg(feature = "cpal")]
pub type DefaultAudioOutput = cpal::CpalOutput;

#[cfg(feature = "cpal")]
pub type DefaultAudioSink = <DefaultAudioOutput as AudioOutput>::Sink;

pub trait AudioOutput {
    type Sink: AudioSink;

    fn sink(&self) -> Self::Sink;
}

/// Handle to an open output device.  Cheap to clone, every clone controls the
/// same device.
pub trait AudioSink: Clone + Send + 'static {
    fn channel_count(&self) -> usize;
    fn sample_rate(&self) -> u32;
    fn set_volume(&self, volume: f32);
    /// Replace the current source and start pulling samples from it.
    fn play(&self, source: impl AudioSource);
    fn stop(&self);
    fn close(&self);
}
