use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::{
    actor::{Act, Actor, ActorHandle},
    audio::{
        output::{AudioOutput, AudioSink},
        source::{AudioSource, Empty},
    },
    error::Error,
};

pub struct CpalOutput {
    _handle: ActorHandle<StreamMsg>,
    sink: CpalSink,
}

impl CpalOutput {
    pub fn open() -> Result<Self, Error> {
        // Open the default output device.
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(cpal::DefaultStreamConfigError::DeviceNotAvailable)?;

        if let Ok(name) = device.name() {
            log::info!("using audio device: {:?}", name);
        }

        let supported = Self::preferred_output_config(&device)?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            log::warn!(
                "device prefers {:?} samples, requesting f32 anyway",
                supported.sample_format()
            );
        }

        // The callback drains this only while the stream runs, and the stream
        // is paused between stations, so senders must never wait on it.
        let (callback_send, callback_recv) = unbounded();
        let (init_send, init_recv) = bounded(1);

        // Streams are not `Send` on every platform, so the stream is built on
        // the thread that owns it.
        let handle = Stream::spawn_default("audio_output", {
            let config = supported.config();
            move |_| match Stream::open(device, config, callback_recv) {
                Ok(stream) => {
                    let _ = init_send.send(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = init_send.send(Err(err));
                    Stream { stream: None }
                }
            }
        });
        init_recv
            .recv()
            .map_err(|_| Error::InvalidStateError("audio output thread died".into()))??;

        let sink = CpalSink {
            channel_count: supported.channels(),
            sample_rate: supported.sample_rate(),
            stream_send: handle.sender(),
            callback_send,
        };

        Ok(Self {
            _handle: handle,
            sink,
        })
    }

    fn preferred_output_config(
        device: &cpal::Device,
    ) -> Result<cpal::SupportedStreamConfig, Error> {
        const PREFERRED_SAMPLE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::F32;
        const PREFERRED_SAMPLE_RATE: cpal::SampleRate = cpal::SampleRate(44_100);
        const PREFERRED_CHANNELS: cpal::ChannelCount = 2;

        for s in device.supported_output_configs()? {
            let rates = s.min_sample_rate()..=s.max_sample_rate();
            if s.channels() == PREFERRED_CHANNELS
                && s.sample_format() == PREFERRED_SAMPLE_FORMAT
                && rates.contains(&PREFERRED_SAMPLE_RATE)
            {
                return Ok(s.with_sample_rate(PREFERRED_SAMPLE_RATE));
            }
        }

        Ok(device.default_output_config()?)
    }
}

impl AudioOutput for CpalOutput {
    type Sink = CpalSink;

    fn sink(&self) -> Self::Sink {
        self.sink.clone()
    }
}

#[derive(Clone)]
pub struct CpalSink {
    channel_count: cpal::ChannelCount,
    sample_rate: cpal::SampleRate,
    callback_send: Sender<CallbackMsg>,
    stream_send: Sender<StreamMsg>,
}

impl CpalSink {
    fn send_to_callback(&self, msg: CallbackMsg) {
        if self.callback_send.send(msg).is_err() {
            log::error!("output stream actor is dead");
        }
    }

    fn send_to_stream(&self, msg: StreamMsg) {
        if self.stream_send.send(msg).is_err() {
            log::error!("output stream actor is dead");
        }
    }
}

impl AudioSink for CpalSink {
    fn channel_count(&self) -> usize {
        self.channel_count as usize
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.0
    }

    fn set_volume(&self, volume: f32) {
        self.send_to_callback(CallbackMsg::SetVolume(volume));
    }

    fn play(&self, source: impl AudioSource) {
        self.send_to_callback(CallbackMsg::Play(Box::new(source)));
        self.send_to_stream(StreamMsg::Resume);
    }

    fn stop(&self) {
        self.send_to_stream(StreamMsg::Pause);
        self.send_to_callback(CallbackMsg::Stop);
    }

    fn close(&self) {
        self.send_to_stream(StreamMsg::Close);
    }
}

struct Stream {
    stream: Option<cpal::Stream>,
}

impl Stream {
    fn open(
        device: cpal::Device,
        config: cpal::StreamConfig,
        callback_recv: Receiver<CallbackMsg>,
    ) -> Result<Self, Error> {
        let mut callback = StreamCallback {
            callback_recv,
            source: Box::new(Empty),
            volume: 1.0,
            playing: false,
        };

        log::info!("opening output stream: {:?}", config);
        let stream = device.build_output_stream(
            &config,
            move |output, _| {
                callback.write_samples(output);
            },
            |err| {
                log::error!("audio output error: {}", err);
            },
            None,
        )?;

        Ok(Self {
            stream: Some(stream),
        })
    }
}

impl Actor for Stream {
    type Message = StreamMsg;
    type Error = Error;

    fn handle(&mut self, msg: Self::Message) -> Result<Act<Self>, Self::Error> {
        let Some(stream) = &self.stream else {
            return Ok(Act::Shutdown);
        };
        match msg {
            StreamMsg::Pause => {
                log::debug!("pausing audio output stream");
                if let Err(err) = stream.pause() {
                    log::error!("failed to stop stream: {}", err);
                }
                Ok(Act::Continue)
            }
            StreamMsg::Resume => {
                log::debug!("resuming audio output stream");
                if let Err(err) = stream.play() {
                    log::error!("failed to start stream: {}", err);
                }
                Ok(Act::Continue)
            }
            StreamMsg::Close => {
                log::debug!("closing audio output stream");
                let _ = stream.pause();
                Ok(Act::Shutdown)
            }
        }
    }
}

enum StreamMsg {
    Pause,
    Resume,
    Close,
}

enum CallbackMsg {
    Play(Box<dyn AudioSource>),
    Stop,
    SetVolume(f32),
}

struct StreamCallback {
    callback_recv: Receiver<CallbackMsg>,
    source: Box<dyn AudioSource>,
    volume: f32,
    playing: bool,
}

impl StreamCallback {
    fn write_samples(&mut self, output: &mut [f32]) {
        while let Ok(msg) = self.callback_recv.try_recv() {
            match msg {
                CallbackMsg::Play(src) => {
                    self.source = src;
                    self.playing = true;
                }
                CallbackMsg::Stop => {
                    self.source = Box::new(Empty);
                    self.playing = false;
                }
                CallbackMsg::SetVolume(volume) => {
                    self.volume = volume;
                }
            }
        }

        let written = if self.playing {
            let written = self.source.write(output);

            // Apply scaled global volume level.
            let scaled_volume = self.volume.powi(4);
            output[..written]
                .iter_mut()
                .for_each(|s| *s *= scaled_volume);

            written
        } else {
            0
        };

        // Underruns and pauses are silent.
        output[written..].iter_mut().for_each(|s| *s = 0.0);
    }
}

impl From<cpal::DefaultStreamConfigError> for Error {
    fn from(err: cpal::DefaultStreamConfigError) -> Error {
        Error::AudioOutputError(Box::new(err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for Error {
    fn from(err: cpal::SupportedStreamConfigsError) -> Error {
        Error::AudioOutputError(Box::new(err))
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(err: cpal::BuildStreamError) -> Error {
        Error::AudioOutputError(Box::new(err))
    }
}
