use std::{io::Read, ops::Range, sync::Arc, time::Duration};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rb::{Consumer, Producer, RbInspector, RbProducer, SpscRb, RB};
use ureq::http::HeaderMap;

use crate::{
    actor::{Act, Actor, ActorHandle},
    audio::{
        decode::{AudioDecoder, PacketSource, StreamSource},
        icy::IcyReader,
        output::AudioSink,
        resample::{remix, AudioResampler, ResamplingQuality, ResamplingSpec},
    },
    error::Error,
    metadata::Metadata,
    util::{streaming_ureq_agent, USER_AGENT},
};

use super::{Backend, BackendMessage, Reporter, Session};

/// Seconds of audio the ring-buffer holds.
const BUFFER_SECONDS: usize = 4;

/// Playback starts once this share of the buffer is filled.
const PREBUFFER_PERCENT: usize = 50;

/// Poll interval while the ring-buffer is full.
const FULL_BUFFER_WAIT: Duration = Duration::from_millis(100);

/// Plays HTTP audio streams: the response is decoded on a worker thread and
/// pushed through a ring-buffer into the audio sink.
pub struct StreamBackend<S: AudioSink> {
    sink: S,
    agent: ureq::Agent,
    /// Session that is allowed to touch the sink.  Guards against a worker of
    /// a stopped session starting the output after a newer one took over.
    active: Arc<Mutex<Option<Session>>>,
    worker: Option<ActorHandle<WorkerMsg>>,
}

impl<S: AudioSink> StreamBackend<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            agent: streaming_ureq_agent(),
            active: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }
}

impl<S: AudioSink> Backend for StreamBackend<S> {
    fn play(&mut self, uri: &str, reporter: Reporter) {
        self.stop();
        *self.active.lock() = Some(reporter.session());

        let worker = Worker::spawn_default("stream_worker", {
            let uri = uri.to_owned();
            let agent = self.agent.clone();
            let sink = self.sink.clone();
            let active = Arc::clone(&self.active);
            move |this| Worker {
                this,
                uri,
                agent,
                sink,
                active,
                reporter,
                decoding: None,
            }
        });
        if worker.send(WorkerMsg::Open).is_err() {
            log::error!("stream worker is dead");
        }
        self.worker = Some(worker);
    }

    fn stop(&mut self) {
        let mut active = self.active.lock();
        *active = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.send(WorkerMsg::Stop);
        }
        self.sink.stop();
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }
}

impl<S: AudioSink> Drop for StreamBackend<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

enum WorkerMsg {
    Open,
    Read,
    Stop,
}

struct Worker<S> {
    /// Sending part of our own actor channel.
    this: Sender<WorkerMsg>,
    uri: String,
    agent: ureq::Agent,
    sink: S,
    active: Arc<Mutex<Option<Session>>>,
    reporter: Reporter,
    decoding: Option<Decoding>,
}

impl<S: AudioSink> Actor for Worker<S> {
    type Message = WorkerMsg;
    type Error = Error;

    fn handle(&mut self, msg: WorkerMsg) -> Result<Act<Self>, Self::Error> {
        match msg {
            WorkerMsg::Open => self.on_open(),
            WorkerMsg::Read => self.on_read(),
            WorkerMsg::Stop => Ok(Act::Shutdown),
        }
    }
}

impl<S: AudioSink> Worker<S> {
    fn on_open(&mut self) -> Result<Act<Self>, Error> {
        log::info!("connecting to {}", self.uri);
        let response = self
            .agent
            .get(&self.uri)
            .header("User-Agent", USER_AGENT)
            .header("Icy-MetaData", "1")
            .call();
        let response = match response {
            Ok(response) => response,
            Err(err) => return Ok(self.fail(Error::from_request(&self.uri, err))),
        };

        let headers = response.headers();
        let metaint = header(headers, "icy-metaint")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|&metaint| metaint > 0);
        let mime_type = header(headers, "content-type")
            .map(|value| value.split(';').next().unwrap_or_default().trim().to_owned());
        let mut station_tags = Metadata {
            genre: header(headers, "icy-genre").map(str::to_owned),
            ..Metadata::default()
        };
        // Some servers send a list, like `128,128`.
        station_tags.bitrate = header(headers, "icy-br")
            .and_then(|value| value.split(',').next())
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|&kbps| kbps > 0);
        log::debug!(
            "stream headers: content-type={:?} icy-metaint={:?} icy-name={:?}",
            mime_type,
            metaint,
            header(headers, "icy-name"),
        );

        let body = response.into_body().into_reader();
        let reader: Box<dyn Read + Send> = match metaint {
            Some(metaint) => Box::new(IcyReader::new(body, metaint, {
                let reporter = self.reporter.clone();
                let station_tags = station_tags.clone();
                move |title| {
                    let mut tags = Metadata::from_stream_title(&title);
                    tags.merge(&station_tags);
                    reporter.report(BackendMessage::Tags(tags));
                }
            })),
            None => Box::new(body),
        };

        if !self.reporter.report(BackendMessage::Buffering(0)) {
            return Ok(Act::Shutdown);
        }
        let decoder = match AudioDecoder::probe(StreamSource::new(reader), mime_type.as_deref()) {
            Ok(decoder) => decoder,
            Err(err) => return Ok(self.fail(err)),
        };
        if station_tags.bitrate.is_none() {
            if let Some(bps) = decoder.bitrate() {
                station_tags.set_bitrate_bps(bps);
            }
        }
        if !station_tags.is_empty() {
            self.reporter.report(BackendMessage::Tags(station_tags));
        }

        let channels = self.sink.channel_count();
        let capacity = self.sink.sample_rate() as usize * channels * BUFFER_SECONDS;
        self.decoding = Some(Decoding::new(Box::new(decoder), capacity, channels));
        self.this.send(WorkerMsg::Read)?;
        Ok(Act::Continue)
    }

    fn on_read(&mut self) -> Result<Act<Self>, Error> {
        let output_rate = self.sink.sample_rate();
        let Some(decoding) = self.decoding.as_mut() else {
            return Ok(Act::Continue);
        };
        let step = match decoding.step(output_rate) {
            Ok(step) => step,
            Err(err) => return Ok(self.fail(err)),
        };
        match step {
            Step::Progress => {
                if !self.report_buffering() {
                    return Ok(Act::Shutdown);
                }
                self.this.send(WorkerMsg::Read)?;
                Ok(Act::Continue)
            }
            Step::Full => {
                if !self.start_output() {
                    return Ok(Act::Shutdown);
                }
                Ok(Act::WaitOr {
                    timeout: FULL_BUFFER_WAIT,
                    timeout_msg: WorkerMsg::Read,
                })
            }
            Step::Drained => {
                // Let the output play out what is left before reporting.
                if !self.start_output() {
                    return Ok(Act::Shutdown);
                }
                if decoding_is_empty(&self.decoding) {
                    log::info!("stream ended: {}", self.uri);
                    self.reporter.report(BackendMessage::EndOfStream);
                    Ok(Act::Shutdown)
                } else {
                    Ok(Act::WaitOr {
                        timeout: FULL_BUFFER_WAIT,
                        timeout_msg: WorkerMsg::Read,
                    })
                }
            }
        }
    }

    /// Report fill progress while pre-buffering or after an underrun.  Returns
    /// false if this worker should go away.
    fn report_buffering(&mut self) -> bool {
        let Some(decoding) = self.decoding.as_mut() else {
            return true;
        };
        let percent = decoding.fill_percent();
        if decoding.consumer.is_some() || decoding.underrun {
            if percent >= 100 {
                return self.start_output();
            }
            if decoding.reported.is_none_or(|reported| percent >= reported + 10) {
                decoding.reported = Some(percent);
                return self.reporter.report(BackendMessage::Buffering(percent));
            }
        } else if decoding.is_empty() {
            log::warn!("buffer underrun");
            decoding.underrun = true;
            decoding.reported = Some(0);
            return self.reporter.report(BackendMessage::Buffering(0));
        }
        true
    }

    /// Hand the buffered audio over to the sink, if not done yet.  Returns
    /// false if this worker should go away.
    fn start_output(&mut self) -> bool {
        let Some(decoding) = self.decoding.as_mut() else {
            return true;
        };
        if decoding.underrun {
            decoding.underrun = false;
            decoding.reported = None;
            return self.reporter.report(BackendMessage::Buffering(100));
        }
        let Some(consumer) = decoding.consumer.take() else {
            return true;
        };
        {
            let active = self.active.lock();
            if *active != Some(self.reporter.session()) {
                return false;
            }
            self.sink.play(consumer);
        }
        decoding.reported = None;
        self.reporter.report(BackendMessage::Buffering(100))
            && self.reporter.report(BackendMessage::Started)
    }

    fn fail(&mut self, err: Error) -> Act<Self> {
        log::error!("stream {} failed: {}", self.uri, err);
        self.reporter.report(BackendMessage::Error(err));
        Act::Shutdown
    }
}

fn decoding_is_empty(decoding: &Option<Decoding>) -> bool {
    decoding.as_ref().is_none_or(Decoding::is_empty)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

enum Step {
    /// A packet was decoded or some samples were written.
    Progress,
    /// The ring-buffer has no room left.
    Full,
    /// The stream is over and all samples are in the ring-buffer.
    Drained,
}

struct Decoding {
    /// Decoder we are reading packets from.
    decoder: Box<dyn PacketSource>,
    /// Created on the first packet, and again whenever the input rate changes.
    resampler: Option<AudioResampler>,
    /// Number of channels of the output.
    channels: usize,
    /// Last packet, mapped to the output channel layout.
    remixed: Vec<f32>,
    /// Last packet, resampled to the output rate.
    resampled: Vec<f32>,
    /// Range of samples in `resampled` that are awaiting flush into `output`.
    pending: Range<usize>,
    output: SpscRb<f32>,
    producer: Producer<f32>,
    /// Reading end of `output`, until it's handed over to the sink.
    consumer: Option<Consumer<f32>>,
    /// Samples in `output` needed to start playing.
    prebuffer: usize,
    /// Last reported fill percentage.
    reported: Option<u8>,
    underrun: bool,
    end_of_stream: bool,
}

impl Decoding {
    fn new(decoder: Box<dyn PacketSource>, capacity: usize, channels: usize) -> Self {
        let output = SpscRb::new(capacity);
        Self {
            decoder,
            resampler: None,
            channels,
            remixed: Vec::new(),
            resampled: Vec::new(),
            pending: 0..0,
            producer: output.producer(),
            consumer: Some(output.consumer()),
            output,
            prebuffer: (capacity * PREBUFFER_PERCENT / 100).max(1),
            reported: None,
            underrun: false,
            end_of_stream: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    fn fill_percent(&self) -> u8 {
        (self.output.count() * 100 / self.prebuffer).min(100) as u8
    }

    fn step(&mut self, output_rate: u32) -> Result<Step, Error> {
        if !self.pending.is_empty() {
            return match self.producer.write(&self.resampled[self.pending.clone()]) {
                Ok(written) => {
                    self.pending.start += written;
                    Ok(Step::Progress)
                }
                Err(_) => Ok(Step::Full),
            };
        }
        if self.end_of_stream {
            return Ok(Step::Drained);
        }
        let Some(packet) = self.decoder.read_packet()? else {
            self.end_of_stream = true;
            return Ok(Step::Drained);
        };

        let input_channels = packet.spec.channels.count();
        remix(packet.samples, input_channels, self.channels, &mut self.remixed);

        let spec = ResamplingSpec {
            from_rate: packet.spec.rate as usize,
            to_rate: output_rate as usize,
            channels: self.channels,
        };
        let resampler = match self.resampler.take() {
            Some(resampler) if resampler.spec == spec => self.resampler.insert(resampler),
            _ => {
                log::debug!("resampling {:?}", spec);
                self.resampler.insert(AudioResampler::new(
                    ResamplingQuality::SincMediumQuality,
                    spec,
                )?)
            }
        };
        let max_output = spec.max_output_size(self.remixed.len());
        if self.resampled.len() < max_output {
            self.resampled.resize(max_output, 0.0);
        }
        let to_flush = resampler.resample(&self.remixed, &mut self.resampled)?;
        self.pending = 0..to_flush;
        Ok(Step::Progress)
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{unbounded, Receiver};
    use symphonia::core::audio::{Channels, SignalSpec};

    use super::*;
    use crate::{
        audio::{decode::DecodedPacket, source::AudioSource},
        player::PlayerEvent,
    };

    const SESSION: Session = 7;

    /// Stereo packets of 50 frames each, at the output rate.
    struct Tone {
        packets: usize,
        samples: Vec<f32>,
    }

    impl PacketSource for Tone {
        fn read_packet(&mut self) -> Result<Option<DecodedPacket<'_>>, Error> {
            if self.packets == 0 {
                return Ok(None);
            }
            self.packets -= 1;
            Ok(Some(DecodedPacket {
                samples: &self.samples,
                spec: SignalSpec::new(44_100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT),
            }))
        }
    }

    #[derive(Clone, Default)]
    struct FakeSink {
        source: Arc<Mutex<Option<Box<dyn AudioSource>>>>,
    }

    impl FakeSink {
        /// Play out everything buffered so far.
        fn drain(&self) {
            let mut output = vec![0.0; 4096];
            if let Some(source) = self.source.lock().as_mut() {
                source.write(&mut output);
            }
        }
    }

    impl AudioSink for FakeSink {
        fn channel_count(&self) -> usize {
            2
        }

        fn sample_rate(&self) -> u32 {
            44_100
        }

        fn set_volume(&self, _volume: f32) {}

        fn play(&self, source: impl AudioSource) {
            *self.source.lock() = Some(Box::new(source));
        }

        fn stop(&self) {
            *self.source.lock() = None;
        }

        fn close(&self) {}
    }

    struct Fixture {
        worker: Worker<FakeSink>,
        sink: FakeSink,
        events: Receiver<PlayerEvent>,
        _reads: Receiver<WorkerMsg>,
    }

    /// Worker over `packets` packets, with room for 400 samples, so playback
    /// starts at 200.
    fn fixture(packets: usize) -> Fixture {
        let (sender, events) = unbounded();
        let (this, reads) = unbounded();
        let sink = FakeSink::default();
        let tone = Tone {
            packets,
            samples: vec![0.25; 100],
        };
        let worker = Worker {
            this,
            uri: "http://radio/stream".into(),
            agent: streaming_ureq_agent(),
            sink: sink.clone(),
            active: Arc::new(Mutex::new(Some(SESSION))),
            reporter: Reporter::new(SESSION, sender),
            decoding: Some(Decoding::new(Box::new(tone), 400, 2)),
        };
        Fixture {
            worker,
            sink,
            events,
            _reads: reads,
        }
    }

    fn messages(events: &Receiver<PlayerEvent>) -> Vec<String> {
        events
            .try_iter()
            .filter_map(|event| match event {
                PlayerEvent::Backend(event) => {
                    assert_eq!(event.session, SESSION);
                    Some(format!("{:?}", event.message))
                }
                _ => None,
            })
            .collect()
    }

    /// Read until the worker has to wait, for room or for the output.
    fn read_until_waiting(worker: &mut Worker<FakeSink>) {
        for _ in 0..100 {
            match worker.on_read().unwrap() {
                Act::Continue => {}
                Act::WaitOr { .. } => return,
                Act::Shutdown => panic!("worker shut down"),
            }
        }
        panic!("worker never waited");
    }

    #[test]
    fn prebuffering_reports_rise_to_a_single_100() {
        let mut f = fixture(20);
        read_until_waiting(&mut f.worker);

        assert_eq!(
            messages(&f.events),
            vec!["Buffering(0)", "Buffering(50)", "Buffering(100)", "Started"]
        );
        assert!(f.sink.source.lock().is_some());

        read_until_waiting(&mut f.worker);
        assert!(messages(&f.events).is_empty());
    }

    #[test]
    fn underrun_rebuffers() {
        let mut f = fixture(40);
        read_until_waiting(&mut f.worker);
        messages(&f.events);

        // The output eats everything, faster than the stream delivers.
        let mut seen = Vec::new();
        for _ in 0..100 {
            f.sink.drain();
            assert!(matches!(f.worker.on_read().unwrap(), Act::Continue));
            seen.extend(messages(&f.events));
            if !seen.is_empty() {
                break;
            }
        }
        assert_eq!(seen, vec!["Buffering(0)"]);

        for _ in 0..100 {
            f.worker.on_read().unwrap();
            seen.extend(messages(&f.events));
            if seen.last().map(String::as_str) == Some("Buffering(100)") {
                break;
            }
        }
        assert_eq!(seen, vec!["Buffering(0)", "Buffering(50)", "Buffering(100)"]);
    }

    #[test]
    fn end_of_stream_waits_for_the_output() {
        let mut f = fixture(3);
        read_until_waiting(&mut f.worker);
        assert!(f.worker.decoding.as_ref().unwrap().end_of_stream);
        let seen = messages(&f.events);
        assert!(seen.contains(&"Started".to_string()));
        assert!(!seen.contains(&"EndOfStream".to_string()));

        f.sink.drain();
        assert!(matches!(f.worker.on_read().unwrap(), Act::Shutdown));
        assert_eq!(messages(&f.events), vec!["EndOfStream"]);
    }

    #[test]
    fn stopped_session_never_reaches_the_sink() {
        let mut f = fixture(20);
        *f.worker.active.lock() = None;
        for _ in 0..100 {
            if matches!(f.worker.on_read().unwrap(), Act::Shutdown) {
                break;
            }
        }
        assert!(f.sink.source.lock().is_none());
        assert!(!messages(&f.events).contains(&"Started".to_string()));
    }
}
