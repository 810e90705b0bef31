use crate::config::Config;
use crate::playback::media_source::{MediaErrorKind, MediaEvent, MediaEventSender, MediaSource};
use crate::playback::symphonia_decoder::TrackDecoder;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No output device available")]
    DeviceNotFound,
    #[error("Stream config error: {0}")]
    StreamConfig(String),
    #[error("Stream build error: {0}")]
    StreamBuild(String),
    #[error("Stream play error: {0}")]
    StreamPlay(String),
}

#[derive(Debug, Clone)]
pub struct CpalSourceOptions {
    /// How often a time update is emitted while playing
    pub position_update_interval: Duration,
    /// Keep the output silent regardless of the requested volume
    pub mute_output: bool,
}

impl Default for CpalSourceOptions {
    fn default() -> Self {
        Self {
            position_update_interval: Duration::from_millis(250),
            mute_output: false,
        }
    }
}

impl From<&Config> for CpalSourceOptions {
    fn from(config: &Config) -> Self {
        Self {
            position_update_interval: config.position_update_interval,
            mute_output: config.mute_output,
        }
    }
}

/// Commands consumed inside the output callback
#[derive(Debug, Clone)]
enum AudioCommand {
    Play,
    Pause,
    Seek(Duration),
    SetVolume(f32),
}

/// Requests from the controller side to the audio thread
#[derive(Debug)]
enum SourceRequest {
    Load,
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    Shutdown,
}

/// Subscribed event sender, shared with the audio thread.
/// Events are emitted while holding the lock, so clearing it is a hard cutoff.
#[derive(Clone, Default)]
struct EventSlot(Arc<Mutex<Option<MediaEventSender>>>);

impl EventSlot {
    fn set(&self, events: Option<MediaEventSender>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = events;
    }

    fn emit(&self, event: MediaEvent) {
        let slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(events) = slot.as_ref() {
            if !events.emit(event) {
                debug!("Controller gone, event dropped");
            }
        }
    }
}

/// Media source playing a local audio file on the default output device.
///
/// The cpal stream is not `Send`, so it lives on a dedicated audio thread;
/// this type only forwards requests to that thread.
pub struct CpalMediaSource {
    events: EventSlot,
    request_tx: mpsc::Sender<SourceRequest>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CpalMediaSource {
    /// Prepare a source for `path`. Nothing is read until the first subscribe.
    pub fn open(path: impl Into<PathBuf>, options: CpalSourceOptions) -> Self {
        let path = path.into();
        let events = EventSlot::default();
        let (request_tx, request_rx) = mpsc::channel();

        let worker_events = events.clone();
        let worker = thread::Builder::new()
            .name("deckplay-audio".to_string())
            .spawn(move || AudioWorker::new(path, options, worker_events).run(request_rx))
            .map_err(|e| error!("Failed to spawn audio thread: {}", e))
            .ok();

        Self {
            events,
            request_tx,
            worker,
        }
    }

    fn request(&self, request: SourceRequest) {
        if self.request_tx.send(request).is_err() {
            warn!("Audio thread is not running, request dropped");
        }
    }
}

impl MediaSource for CpalMediaSource {
    fn play(&mut self) {
        self.request(SourceRequest::Play);
    }

    fn pause(&mut self) {
        self.request(SourceRequest::Pause);
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.request(SourceRequest::Seek(seconds));
    }

    fn set_volume(&mut self, level: f64) {
        self.request(SourceRequest::SetVolume(level));
    }

    fn subscribe(&mut self, events: MediaEventSender) {
        self.events.set(Some(events));
        if self.worker.is_none() {
            self.events.emit(MediaEvent::Error(MediaErrorKind::PlaybackRefused(
                "audio thread unavailable".to_string(),
            )));
            return;
        }
        self.request(SourceRequest::Load);
    }

    fn unsubscribe(&mut self) {
        self.events.set(None);
    }
}

impl Drop for CpalMediaSource {
    fn drop(&mut self) {
        let _ = self.request_tx.send(SourceRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Audio thread panicked");
            }
        }
    }
}

/// Why an output stream could not be opened, with the decoder if it survived
struct OutputError {
    error: AudioError,
    decoder: Option<TrackDecoder>,
}

impl OutputError {
    fn returning(error: AudioError, decoder: TrackDecoder) -> Self {
        Self {
            error,
            decoder: Some(decoder),
        }
    }
}

type OpenOutput = Box<dyn FnMut(TrackDecoder, f32, Duration) -> Result<OutputStream, OutputError>>;

/// Running cpal stream plus the channels back out of its callback
struct OutputStream {
    stream: Stream,
    command_tx: mpsc::Sender<AudioCommand>,
    position_rx: mpsc::Receiver<Duration>,
    completion_rx: mpsc::Receiver<()>,
    failure_rx: mpsc::Receiver<MediaErrorKind>,
}

impl OutputStream {
    /// Build a paused output stream that pulls samples from `decoder`
    fn create(
        mut decoder: TrackDecoder,
        volume: f32,
        position_update_interval: Duration,
    ) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            return Err(OutputError::returning(AudioError::DeviceNotFound, decoder));
        };

        let default_config = match device.default_output_config() {
            Ok(config) => config,
            Err(e) => {
                let error = AudioError::StreamConfig(e.to_string());
                return Err(OutputError::returning(error, decoder));
            }
        };
        let stream_config = StreamConfig::from(default_config);

        let output_channels = stream_config.channels as usize;
        let sample_rate_ratio = decoder.sample_rate() as f64 / stream_config.sample_rate.0 as f64;

        info!(
            "Audio device: {} channels, {} Hz",
            stream_config.channels, stream_config.sample_rate.0
        );

        let (command_tx, command_rx) = mpsc::channel();
        let (position_tx, position_rx) = mpsc::channel();
        let (completion_tx, completion_rx) = mpsc::channel();
        let (failure_tx, failure_rx) = mpsc::channel();
        let stream_failure_tx = failure_tx.clone();

        let mut playing = false;
        let mut finished = false;
        let mut volume = volume;
        let mut pending: Vec<f32> = Vec::new();
        let mut pending_pos = 0usize;
        let mut last_position_update = Instant::now();

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = command_rx.try_recv() {
                        match cmd {
                            AudioCommand::Play => playing = true,
                            AudioCommand::Pause => playing = false,
                            AudioCommand::Seek(position) => {
                                if let Err(e) = decoder.seek(position) {
                                    error!("Seek failed: {}", e);
                                }
                                pending.clear();
                                pending_pos = 0;
                                finished = false;
                                let _ = position_tx.send(decoder.position());
                            }
                            AudioCommand::SetVolume(level) => volume = level.clamp(0.0, 1.0),
                        }
                    }

                    if !playing || finished {
                        data.fill(0.0);
                        return;
                    }

                    let mut output_pos = 0;
                    while output_pos < data.len() {
                        if pending_pos >= pending.len() {
                            match decoder.decode_next() {
                                Ok(Some(audio_buf)) => {
                                    let (samples, channels) = interleave(audio_buf);
                                    let samples = remix(&samples, channels, output_channels);
                                    pending =
                                        resample_nearest(samples, output_channels, sample_rate_ratio);
                                    pending_pos = 0;
                                    continue;
                                }
                                Ok(None) => {
                                    // End of stream
                                    finished = true;
                                    playing = false;
                                    let _ = completion_tx.send(());
                                }
                                Err(e) => {
                                    error!("Decoder error: {}", e);
                                    finished = true;
                                    playing = false;
                                    let _ = failure_tx
                                        .send(MediaErrorKind::LoadError(e.to_string()));
                                }
                            }
                            data[output_pos..].fill(0.0);
                            return;
                        }

                        data[output_pos] = pending[pending_pos] * volume;
                        output_pos += 1;
                        pending_pos += 1;
                    }

                    if last_position_update.elapsed() >= position_update_interval {
                        let _ = position_tx.send(decoder.position());
                        last_position_update = Instant::now();
                    }
                },
                move |err| {
                    error!("Audio stream error: {:?}", err);
                    let _ = stream_failure_tx.send(MediaErrorKind::PlaybackRefused(err.to_string()));
                },
                None,
            )
            // The decoder moved into the callback and is gone with it
            .map_err(|e| OutputError {
                error: AudioError::StreamBuild(e.to_string()),
                decoder: None,
            })?;

        Ok(Self {
            stream,
            command_tx,
            position_rx,
            completion_rx,
            failure_rx,
        })
    }

    fn send(&self, command: AudioCommand) {
        let _ = self.command_tx.send(command);
    }
}

/// State owned by the audio thread
struct AudioWorker {
    path: PathBuf,
    options: CpalSourceOptions,
    events: EventSlot,
    open_output: OpenOutput,
    decoder: Option<TrackDecoder>,
    duration: Option<Duration>,
    metadata_sent: bool,
    output: Option<OutputStream>,
    volume: f32,
    is_playing: bool,
    /// Last reported or requested position
    position: Duration,
    /// The callback stops after the end or a decoder failure and needs a seek before it plays again
    restart_at: Option<Duration>,
    last_reported: Option<Duration>,
}

impl AudioWorker {
    fn new(path: PathBuf, options: CpalSourceOptions, events: EventSlot) -> Self {
        Self::with_output(path, options, events, Box::new(OutputStream::create))
    }

    fn with_output(
        path: PathBuf,
        options: CpalSourceOptions,
        events: EventSlot,
        open_output: OpenOutput,
    ) -> Self {
        let volume = if options.mute_output { 0.0 } else { 1.0 };
        Self {
            path,
            options,
            events,
            open_output,
            decoder: None,
            duration: None,
            metadata_sent: false,
            output: None,
            volume,
            is_playing: false,
            position: Duration::ZERO,
            restart_at: None,
            last_reported: None,
        }
    }

    fn run(mut self, request_rx: mpsc::Receiver<SourceRequest>) {
        info!("Audio thread started for {}", self.path.display());

        loop {
            match request_rx.recv_timeout(self.options.position_update_interval) {
                Ok(SourceRequest::Shutdown) => break,
                Ok(request) => self.handle(request),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
            self.poll_output();
        }

        // Stream stops when dropped
        self.output = None;
        info!("Audio thread stopped");
    }

    fn handle(&mut self, request: SourceRequest) {
        debug!("Audio request: {:?}", request);
        match request {
            SourceRequest::Load => self.load(),
            SourceRequest::Play => self.play(),
            SourceRequest::Pause => self.pause(),
            SourceRequest::Seek(seconds) => self.seek(seconds),
            SourceRequest::SetVolume(level) => self.set_volume(level),
            SourceRequest::Shutdown => {}
        }
    }

    fn load(&mut self) {
        if self.decoder.is_none() && self.output.is_none() {
            match open_decoder(&self.path) {
                Ok(decoder) => {
                    self.duration = decoder.duration();
                    self.decoder = Some(decoder);
                }
                Err(kind) => {
                    self.events.emit(MediaEvent::Error(kind));
                    return;
                }
            }
        }

        self.emit_metadata();
    }

    fn emit_metadata(&mut self) {
        let duration = self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        self.metadata_sent = true;
        self.events.emit(MediaEvent::MetadataLoaded { duration });
    }

    /// Decoder for a new output stream, reopened at the current position if it was lost
    fn take_decoder(&mut self) -> Option<TrackDecoder> {
        if let Some(decoder) = self.decoder.take() {
            return Some(decoder);
        }

        let mut decoder = match open_decoder(&self.path) {
            Ok(decoder) => decoder,
            Err(kind) => {
                self.events.emit(MediaEvent::Error(kind));
                return None;
            }
        };

        self.duration = decoder.duration();
        if !self.metadata_sent {
            // Retry after an earlier load failure
            self.emit_metadata();
        }
        if self.position > Duration::ZERO {
            if let Err(e) = decoder.seek(self.position) {
                warn!("Seek failed: {}", e);
            }
        }
        Some(decoder)
    }

    fn play(&mut self) {
        if self.output.is_none() {
            let Some(decoder) = self.take_decoder() else {
                return;
            };

            let interval = self.options.position_update_interval;
            match (self.open_output)(decoder, self.volume, interval) {
                Ok(output) => self.output = Some(output),
                Err(OutputError { error, decoder }) => {
                    error!("Failed to open audio output: {}", error);
                    self.decoder = decoder;
                    self.events.emit(MediaEvent::Error(MediaErrorKind::PlaybackRefused(
                        error.to_string(),
                    )));
                    return;
                }
            }
        }

        let Some(output) = self.output.as_ref() else {
            return;
        };

        // Like a media element, playing after the end starts over
        if let Some(position) = self.restart_at.take() {
            output.send(AudioCommand::Seek(position));
            self.position = position;
        }

        output.send(AudioCommand::Play);
        if let Err(e) = output.stream.play() {
            let e = AudioError::StreamPlay(e.to_string());
            error!("{}", e);
            self.events
                .emit(MediaEvent::Error(MediaErrorKind::PlaybackRefused(e.to_string())));
            return;
        }

        self.is_playing = true;
        self.events.emit(MediaEvent::Started);
    }

    fn pause(&mut self) {
        if !self.is_playing {
            return;
        }
        if let Some(output) = &self.output {
            output.send(AudioCommand::Pause);
        }
        self.is_playing = false;
        self.events.emit(MediaEvent::Paused);
    }

    fn seek(&mut self, seconds: f64) {
        let mut seconds = seconds.max(0.0);
        if let Some(duration) = self.duration {
            seconds = seconds.min(duration.as_secs_f64());
        }
        let Ok(position) = Duration::try_from_secs_f64(seconds) else {
            warn!("Ignoring unusable seek target {}", seconds);
            return;
        };

        // A seek also restarts a stopped callback
        self.restart_at = None;

        if let Some(output) = &self.output {
            // The callback reports the new position once the seek is applied
            output.send(AudioCommand::Seek(position));
            self.position = position;
            return;
        }

        match self.decoder.as_mut() {
            Some(decoder) => {
                if let Err(e) = decoder.seek(position) {
                    warn!("Seek failed: {}", e);
                    return;
                }
                self.position = decoder.position();
            }
            // Applied once the decoder is reopened
            None => self.position = position,
        }
        self.events.emit(MediaEvent::TimeUpdate {
            time: self.position.as_secs_f64(),
        });
    }

    fn set_volume(&mut self, level: f64) {
        self.volume = if self.options.mute_output {
            0.0
        } else {
            level.clamp(0.0, 1.0) as f32
        };
        if let Some(output) = &self.output {
            output.send(AudioCommand::SetVolume(self.volume));
        }
    }

    fn poll_output(&mut self) {
        let Some(output) = &self.output else {
            return;
        };

        let mut latest = None;
        while let Ok(position) = output.position_rx.try_recv() {
            latest = Some(position);
        }
        let completed = output.completion_rx.try_recv().is_ok();
        let failure = output.failure_rx.try_recv().ok();

        if let Some(position) = latest {
            self.report_position(position);
        }
        if let Some(kind) = failure {
            self.handle_failure(kind);
        }
        if completed {
            self.handle_completion();
        }
    }

    fn report_position(&mut self, position: Duration) {
        self.position = position;
        if self.last_reported != Some(position) {
            self.last_reported = Some(position);
            self.events.emit(MediaEvent::TimeUpdate {
                time: position.as_secs_f64(),
            });
        }
    }

    fn handle_failure(&mut self, kind: MediaErrorKind) {
        self.is_playing = false;
        self.restart_at = Some(self.position);
        self.events.emit(MediaEvent::Error(kind));
    }

    fn handle_completion(&mut self) {
        info!("Reached end of {}", self.path.display());
        self.is_playing = false;
        self.restart_at = Some(Duration::ZERO);
        if let Some(duration) = self.duration {
            self.position = duration;
            self.events.emit(MediaEvent::TimeUpdate {
                time: duration.as_secs_f64(),
            });
        }
        self.events.emit(MediaEvent::Ended);
    }
}

fn open_decoder(path: &Path) -> Result<TrackDecoder, MediaErrorKind> {
    TrackDecoder::open(path).map_err(|e| {
        warn!("Failed to load {}: {}", path.display(), e);
        MediaErrorKind::LoadError(e.to_string())
    })
}

/// Convert any decoded buffer to interleaved f32 samples
fn interleave(audio_buf: AudioBufferRef<'_>) -> (Vec<f32>, usize) {
    let spec = *audio_buf.spec();
    let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
    sample_buf.copy_interleaved_ref(audio_buf);
    (sample_buf.samples().to_vec(), spec.channels.count())
}

/// Map interleaved samples from `in_channels` to `out_channels`.
/// Mono is duplicated, extra channels are dropped, missing ones are silent.
fn remix(samples: &[f32], in_channels: usize, out_channels: usize) -> Vec<f32> {
    if in_channels == out_channels {
        return samples.to_vec();
    }
    if in_channels == 0 {
        return Vec::new();
    }

    let mut converted = Vec::with_capacity(samples.len() / in_channels * out_channels);
    for frame in samples.chunks_exact(in_channels) {
        for ch in 0..out_channels {
            let sample = if in_channels == 1 {
                frame[0]
            } else {
                frame.get(ch).copied().unwrap_or(0.0)
            };
            converted.push(sample);
        }
    }
    converted
}

/// Nearest-neighbour rate conversion; `ratio` is source rate over output rate
fn resample_nearest(samples: Vec<f32>, channels: usize, ratio: f64) -> Vec<f32> {
    if channels == 0 || (ratio - 1.0).abs() < f64::EPSILON {
        return samples;
    }

    let input_frames = samples.len() / channels;
    if input_frames == 0 {
        return samples;
    }
    let output_frames = (input_frames as f64 / ratio) as usize;

    let mut resampled = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_frames {
        let src_idx = ((frame_idx as f64 * ratio) as usize).min(input_frames - 1);
        resampled.extend_from_slice(&samples[src_idx * channels..(src_idx + 1) * channels]);
    }
    resampled
}
