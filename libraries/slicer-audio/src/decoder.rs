/// Streaming audio source using Symphonia
use crate::error::{AudioError, Result};
use slicer_core::{AudioBuffer, AudioFormat, AudioSource};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Audio source decoding any container Symphonia supports
///
/// Packets rarely line up with the requested block size, so decoded frames
/// beyond `max_frames` are held back and returned by the next `read_block`.
pub struct SymphoniaSource {
    /// Format reader (container parser)
    reader: Box<dyn FormatReader>,
    /// Audio decoder
    decoder: Box<dyn Decoder>,
    /// Track ID
    track_id: u32,
    /// Output format (interleaved f32)
    format: AudioFormat,
    /// Total duration, when the container knows it
    duration: Option<Duration>,
    /// Reusable conversion buffer, sized to the largest packet seen
    sample_buf: Option<SampleBuffer<f32>>,
    /// Decoded samples not yet handed out
    pending: VecDeque<f32>,
    /// Reader reached end of stream
    exhausted: bool,
}

impl SymphoniaSource {
    /// Open a file for streaming decode
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let file = std::fs::File::open(path)?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        tracing::debug!(path = %path.display(), "Opening input");
        Self::from_media_source(Box::new(file), hint)
    }

    /// Decode from an arbitrary media source, e.g. an in-memory cursor
    pub fn from_media_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::Symphonia(format!("Failed to probe input: {}", e)))?;

        let reader = probed.format;

        let track = reader
            .default_track()
            .ok_or_else(|| AudioError::DecodeError("No audio tracks found".to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| AudioError::UnsupportedFormat("unknown sample rate".to_string()))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| AudioError::UnsupportedFormat("unknown channel layout".to_string()))?;
        let track_id = track.id;

        let duration = track
            .codec_params
            .n_frames
            .map(|n_frames| Duration::from_secs_f64(n_frames as f64 / f64::from(sample_rate)));

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Symphonia(format!("Failed to create decoder: {}", e)))?;

        tracing::info!(
            sample_rate,
            channels,
            duration_secs = duration.map(|d| d.as_secs_f64()),
            "Input opened"
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            format: AudioFormat::float32(sample_rate, channels),
            duration,
            sample_buf: None,
            pending: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Decode packets until `wanted` samples are pending or the stream ends
    fn fill(&mut self, wanted: usize) -> Result<()> {
        while self.pending.len() < wanted && !self.exhausted {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.exhausted = true;
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Track list changed mid-stream; treat as end of this track
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    return Err(AudioError::Symphonia(format!("Failed to read packet: {}", e)))
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let needs_alloc = self
                        .sample_buf
                        .as_ref()
                        .map_or(true, |buf| buf.capacity() < decoded.capacity());
                    if needs_alloc {
                        self.sample_buf = Some(SampleBuffer::<f32>::new(
                            decoded.capacity() as u64,
                            *decoded.spec(),
                        ));
                    }

                    if let Some(buf) = self.sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        self.pending.extend(buf.samples().iter().copied());
                    }
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Corrupt packet: skip it and keep going
                    tracing::warn!(error = %msg, "Skipping undecodable packet");
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            }
        }

        Ok(())
    }
}

impl AudioSource for SymphoniaSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_block(&mut self, max_frames: usize) -> slicer_core::Result<Option<AudioBuffer>> {
        let channels = usize::from(self.format.channels);
        let wanted = max_frames.max(1) * channels;

        self.fill(wanted)?;

        if self.pending.is_empty() {
            return Ok(None);
        }

        let take = wanted.min(self.pending.len());
        let samples: Vec<f32> = self.pending.drain(..take).collect();
        Ok(Some(AudioBuffer::new(samples, self.format)))
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}
