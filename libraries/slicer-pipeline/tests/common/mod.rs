//! Shared helpers for pipeline integration tests

#![allow(dead_code)]

use slicer_core::{AudioBuffer, AudioFormat, AudioSource};
use std::io::Cursor;
use std::time::Duration;

/// One stretch of synthetic signal
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub frames: usize,
    pub amplitude: f32,
}

impl Segment {
    pub fn tone(frames: usize) -> Self {
        Self {
            frames,
            amplitude: 0.5,
        }
    }

    pub fn silence(frames: usize) -> Self {
        Self {
            frames,
            amplitude: 0.0,
        }
    }
}

/// Tone/silence source, optionally paced so the control thread keeps up
pub struct SegmentSource {
    format: AudioFormat,
    segments: Vec<Segment>,
    segment: usize,
    offset: usize,
    position: u64,
    pace: Option<Duration>,
    endless: bool,
}

impl SegmentSource {
    pub fn new(sample_rate: u32, channels: u16, segments: Vec<Segment>) -> Self {
        Self {
            format: AudioFormat::float32(sample_rate, channels),
            segments,
            segment: 0,
            offset: 0,
            position: 0,
            pace: None,
            endless: false,
        }
    }

    /// Sleep this long before each block
    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    /// Loop the segments forever
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    pub fn total_frames(&self) -> usize {
        self.segments.iter().map(|s| s.frames).sum()
    }
}

impl AudioSource for SegmentSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_block(&mut self, max_frames: usize) -> slicer_core::Result<Option<AudioBuffer>> {
        if let Some(pace) = self.pace {
            std::thread::sleep(pace);
        }

        while self.segment < self.segments.len()
            && self.offset >= self.segments[self.segment].frames
        {
            self.segment += 1;
            self.offset = 0;
            if self.endless && self.segment == self.segments.len() {
                self.segment = 0;
            }
        }
        let Some(segment) = self.segments.get(self.segment).copied() else {
            return Ok(None);
        };

        let frames = max_frames.min(segment.frames - self.offset);
        let channels = usize::from(self.format.channels);
        let rate = self.format.sample_rate.as_hz() as f32;
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let t = (self.position + i as u64) as f32 / rate;
            let value = segment.amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            samples.extend(std::iter::repeat(value).take(channels));
        }

        self.offset += frames;
        self.position += frames as u64;
        Ok(Some(AudioBuffer::new(samples, self.format)))
    }
}

/// Frame count of an encoded WAV slice
pub fn wav_frames(bytes: Vec<u8>) -> u32 {
    hound::WavReader::new(Cursor::new(bytes)).unwrap().duration()
}
