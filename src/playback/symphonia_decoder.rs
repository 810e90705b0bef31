use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use symphonia::core::{
    audio::AudioBufferRef,
    codecs::{Decoder, DecoderOptions},
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
    units::Time,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Symphonia error: {0}")]
    Symphonia(#[from] symphonia::core::errors::Error),
    #[error("No audio tracks found")]
    NoAudioTracks,
}

/// Wrapper around symphonia decoder that tracks decoded frames for position calculation
pub struct TrackDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    decoded_frames: u64,
    duration: Option<Duration>,
}

impl TrackDecoder {
    /// Read and probe an audio file. The extension is used as a format hint.
    pub fn open(path: &Path) -> Result<Self, DecoderError> {
        let data = std::fs::read(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        Self::new(data, extension)
    }

    /// Create a decoder over in-memory audio data
    pub fn new(data: Vec<u8>, extension: Option<&str>) -> Result<Self, DecoderError> {
        let cursor = Cursor::new(data);
        let media_source = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            media_source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;

        let format_reader = probed.format;

        // Find the audio track
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoAudioTracks)?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);

        let duration = track
            .codec_params
            .n_frames
            .map(|n_frames| Duration::from_secs_f64(n_frames as f64 / sample_rate as f64));

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        info!(
            "Decoder ready: {} Hz, {} channel(s), duration {:?}",
            sample_rate, channels, duration
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            decoded_frames: 0,
            duration,
        })
    }

    /// Decode the next packet and return audio buffer
    /// Returns None when end of stream is reached
    pub fn decode_next(&mut self) -> Result<Option<AudioBufferRef<'_>>, DecoderError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(DecoderError::Symphonia(e)),
            };

            // Skip packets not for our track
            if packet.track_id() != self.track_id {
                continue;
            }

            let audio_buf = self.decoder.decode(&packet)?;
            self.decoded_frames += audio_buf.frames() as u64;

            return Ok(Some(audio_buf));
        }
    }

    /// Playback position based on decoded frames
    pub fn position(&self) -> Duration {
        Duration::from_secs_f64(self.decoded_frames as f64 / self.sample_rate as f64)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Track duration, if the container reports a frame count
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Seek to a specific position
    pub fn seek(&mut self, position: Duration) -> Result<(), DecoderError> {
        let position_seconds = position.as_secs_f64();
        let frame_number = (position_seconds * self.sample_rate as f64) as u64;

        let seek_time = Time::new(position_seconds.floor() as u64, position_seconds.fract());

        match self.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: seek_time,
                track_id: Some(self.track_id),
            },
        ) {
            Ok(_) => {
                self.decoder.reset();
                self.decoded_frames = frame_number;
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Seek by time failed for {:.3}s: {:?}, falling back to decode",
                    position_seconds, e
                );
            }
        }

        // Fallback: rewind and decode forward to the desired position
        self.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::new(0, 0.0),
                track_id: Some(self.track_id),
            },
        )?;
        self.decoder.reset();
        self.decoded_frames = 0;

        while self.decoded_frames < frame_number {
            if self.decode_next()?.is_none() {
                break;
            }
        }
        self.decoded_frames = self.decoded_frames.min(frame_number);

        Ok(())
    }
}
