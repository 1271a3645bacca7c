use std::io::{self, Read, Seek, SeekFrom};

use parking_lot::Mutex;
use symphonia::core::{
    audio::{SampleBuffer, SignalSpec},
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};

use crate::error::Error;

/// Adapts a forward-only network body for symphonia, which wants a seekable,
/// shareable media source.
pub struct StreamSource {
    inner: Mutex<Box<dyn Read + Send>>,
}

impl StreamSource {
    pub fn new(inner: impl Read + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(inner)),
        }
    }
}

impl Read for StreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.get_mut().read(buf)
    }
}

impl Seek for StreamSource {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "live streams are not seekable",
        ))
    }
}

impl MediaSource for StreamSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

/// One decoded packet, as interleaved `f32` samples.
pub struct DecodedPacket<'a> {
    pub samples: &'a [f32],
    pub spec: SignalSpec,
}

/// Something that yields decoded audio, packet by packet.
pub trait PacketSource {
    /// Next packet, or `None` at the end of the stream.
    fn read_packet(&mut self) -> Result<Option<DecodedPacket<'_>>, Error>;
}

pub struct AudioDecoder {
    track_id: u32,
    decoder: Box<dyn Decoder>,
    format: Box<dyn FormatReader>,
    buffer: Option<SampleBuffer<f32>>,
    buffer_spec: Option<SignalSpec>,
}

impl AudioDecoder {
    /// Probe the container format of `source`.  `mime_type`, usually the
    /// `Content-Type` of the response, helps with headerless formats.
    pub fn probe(source: StreamSource, mime_type: Option<&str>) -> Result<Self, Error> {
        let mss = MediaSourceStream::new(Box::new(source), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(mime_type) = mime_type {
            hint.mime_type(mime_type);
        }
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| match err {
                SymphoniaError::IoError(err) => Error::IoError(err),
                _ => Error::FormatUnrecognized,
            })?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(Error::FormatUnrecognized)?;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| Error::FormatUnrecognized)?;

        let p = &track.codec_params;
        log::debug!(
            "probed stream: codec={:?} sample_rate={:?} channels={:?} bits_per_sample={:?}",
            p.codec,
            p.sample_rate,
            p.channels,
            p.bits_per_sample,
        );

        Ok(Self {
            track_id: track.id,
            decoder,
            format,
            buffer: None,
            buffer_spec: None,
        })
    }

    /// Nominal bitrate in bit/s, if the codec parameters tell.
    pub fn bitrate(&self) -> Option<u32> {
        let params = self.decoder.codec_params();
        match (params.bits_per_sample, params.sample_rate, params.channels) {
            (Some(bits), Some(rate), Some(channels)) => {
                Some(bits * rate * channels.count() as u32)
            }
            _ => None,
        }
    }
}

impl PacketSource for AudioDecoder {
    /// Corrupt packets are skipped.
    fn read_packet(&mut self) -> Result<Option<DecodedPacket<'_>>, Error> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    log::debug!("stream parameters changed, resetting decoder");
                    self.decoder.reset();
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::IoError(err)) => {
                    log::warn!("io decode error: {}", err);
                    continue;
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    log::warn!("decode error: {}", err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if decoded.frames() == 0 {
                continue;
            }
            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            let needed = decoded.capacity() * spec.channels.count();
            let reusable = matches!(
                (&self.buffer, self.buffer_spec),
                (Some(buffer), Some(buffer_spec)) if buffer_spec == spec && buffer.capacity() >= needed
            );
            if !reusable {
                self.buffer = None;
                self.buffer_spec = Some(spec);
            }
            let buffer = self
                .buffer
                .get_or_insert_with(|| SampleBuffer::new(capacity, spec));
            buffer.copy_interleaved_ref(decoded);
            return Ok(Some(DecodedPacket {
                samples: buffer.samples(),
                spec,
            }));
        }
    }
}

impl From<SymphoniaError> for Error {
    fn from(err: SymphoniaError) -> Error {
        Error::AudioDecodingError(Box::new(err))
    }
}
