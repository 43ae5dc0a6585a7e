//! Player backed by symphonia.
//!
//! The source (local path, `file://` or http(s) URL) is loaded into memory,
//! probed and checked for a decodable first packet when opened. Once started,
//! a worker thread decodes packets paced against the wall clock, so
//! position, duration and end-of-stream reflect real playback time. Sending
//! decoded samples to an audio device is not handled here.

use crate::error::PlaybackError;
use crate::playback::backend::{OnFinishCallback, PlaybackBackend, PlaybackClock, PlayerHandle};
use async_trait::async_trait;
use reqwest::Client;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tokio::task;
use tracing::{debug, info, instrument, trace, warn};

const LOG_TARGET: &str = "r_medialist::playback::symphonia";

/// Longest the worker sleeps before re-checking its stop flag.
const PACING_SLICE: Duration = Duration::from_millis(20);

enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

fn locate(source_ref: &str) -> SourceLocation {
    match url::Url::parse(source_ref) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            SourceLocation::Remote(source_ref.to_string())
        }
        Ok(url) if url.scheme() == "file" => match url.to_file_path() {
            Ok(path) => SourceLocation::Local(path),
            Err(()) => SourceLocation::Local(PathBuf::from(url.path())),
        },
        _ => SourceLocation::Local(PathBuf::from(source_ref)),
    }
}

fn extension_hint(source_ref: &str) -> Hint {
    let mut hint = Hint::new();
    let path = match locate(source_ref) {
        SourceLocation::Remote(url) => url::Url::parse(&url)
            .map(|u| PathBuf::from(u.path()))
            .unwrap_or_default(),
        SourceLocation::Local(path) => path,
    };
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    hint
}

/// Opens sources with symphonia's default probe and codec registry.
pub struct SymphoniaBackend {
    client: Client,
}

impl SymphoniaBackend {
    pub fn new(timeout: Duration) -> Self {
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(target: LOG_TARGET, "Error creating HTTP client with timeout: {}. Falling back to default.", e);
                Client::new()
            }
        };
        Self { client }
    }

    async fn load(&self, source_ref: &str) -> Result<Vec<u8>, PlaybackError> {
        match locate(source_ref) {
            SourceLocation::Remote(url) => {
                let response = self.client.get(&url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(PlaybackError::Open(format!("{} returned status {}", url, status)));
                }
                let bytes = response.bytes().await?;
                debug!(target: LOG_TARGET, "Fetched {} bytes from {}", bytes.len(), url);
                Ok(bytes.to_vec())
            }
            SourceLocation::Local(path) => read_local(&path).await,
        }
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, PlaybackError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| PlaybackError::Open(format!("{}: {}", path.display(), e)))
}

#[async_trait]
impl PlaybackBackend for SymphoniaBackend {
    #[instrument(skip(self))]
    async fn open(&self, source_ref: &str) -> Result<Box<dyn PlayerHandle>, PlaybackError> {
        let bytes = self.load(source_ref).await?;
        let hint = extension_hint(source_ref);
        let source = task::spawn_blocking(move || DecodedSource::probe(bytes, hint))
            .await
            .map_err(|e| PlaybackError::Open(format!("probe task failed: {}", e)))??;
        info!(target: LOG_TARGET, duration = ?source.duration, "Opened source");
        Ok(Box::new(SymphoniaPlayer::new(source)))
    }
}

/// Format reader and decoder for the first playable track of a source.
struct DecodedSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: Option<u32>,
    duration: Option<Duration>,
    position: Duration,
    decoded_packets: u64,
}

impl DecodedSource {
    fn probe(bytes: Vec<u8>, hint: Hint) -> Result<Self, PlaybackError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), MediaSourceStreamOptions::default());
        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::UnsupportedFormat("No suitable audio track found".to_string()))?
            .clone();
        let decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut source = Self {
            format,
            decoder,
            track_id: track.id,
            time_base: track.codec_params.time_base,
            sample_rate: track.codec_params.sample_rate,
            duration: None,
            position: Duration::ZERO,
            decoded_packets: 0,
        };
        let duration = track.codec_params.n_frames.map(|n| source.time_of(n));
        source.duration = duration;

        match source.next_packet()? {
            Some(_) => Ok(source),
            None => Err(PlaybackError::Decode("stream contains no audio packets".to_string())),
        }
    }

    fn time_of(&self, ts: u64) -> Duration {
        if let Some(time_base) = self.time_base {
            let time = time_base.calc_time(ts);
            return Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac);
        }
        match self.sample_rate {
            Some(rate) if rate > 0 => Duration::from_secs_f64(ts as f64 / f64::from(rate)),
            _ => Duration::ZERO,
        }
    }

    /// Decodes the next packet of the track and returns the media time at
    /// its end, or `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<Duration>, PlaybackError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(_) => self.decoded_packets += 1,
                // A corrupt packet mid-stream is skipped; one before anything
                // decoded means the source is not decodable at all.
                Err(SymphoniaError::DecodeError(msg)) if self.decoded_packets > 0 => {
                    warn!(target: LOG_TARGET, "Skipping undecodable packet: {}", msg);
                }
                Err(e) => return Err(e.into()),
            }
            self.position = self.time_of(packet.ts() + packet.dur());
            return Ok(Some(self.position));
        }
    }

    fn seek(&mut self, target: Duration) -> Result<Duration, PlaybackError> {
        let time = Time::new(target.as_secs(), f64::from(target.subsec_nanos()) / 1_000_000_000.0);
        let seeked = self
            .format
            .seek(SeekMode::Coarse, SeekTo::Time { time, track_id: Some(self.track_id) })
            .map_err(|e| PlaybackError::Seek(e.to_string()))?;
        self.decoder.reset();
        self.position = self.time_of(seeked.actual_ts);
        Ok(self.position)
    }
}

#[derive(Default)]
struct WorkerControl {
    stop: AtomicBool,
    seek_to: Mutex<Option<Duration>>,
}

impl WorkerControl {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn take_seek(&self) -> Option<Duration> {
        self.seek_to.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn request_seek(&self, position: Duration) {
        *self.seek_to.lock().unwrap_or_else(PoisonError::into_inner) = Some(position);
    }
}

/// A prepared (and later running) symphonia player.
pub struct SymphoniaPlayer {
    source: Option<DecodedSource>,
    control: Arc<WorkerControl>,
    clock: PlaybackClock,
    worker: Option<JoinHandle<()>>,
}

impl SymphoniaPlayer {
    fn new(source: DecodedSource) -> Self {
        let clock = PlaybackClock::new(source.duration);
        clock.set_position(source.position);
        Self {
            source: Some(source),
            control: Arc::new(WorkerControl::default()),
            clock,
            worker: None,
        }
    }
}

impl PlayerHandle for SymphoniaPlayer {
    fn start(&mut self, on_finish: OnFinishCallback) -> Result<(), PlaybackError> {
        let source = self
            .source
            .take()
            .ok_or_else(|| PlaybackError::Open("player already started or released".to_string()))?;
        let control = self.control.clone();
        let clock = self.clock.clone();
        let worker = thread::Builder::new()
            .name("medialist-decoder".to_string())
            .spawn(move || play_loop(source, control, clock, on_finish))?;
        self.worker = Some(worker);
        Ok(())
    }

    fn clock(&self) -> PlaybackClock {
        self.clock.clone()
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        if let Some(source) = self.source.as_mut() {
            let actual = source.seek(position)?;
            self.clock.set_position(actual);
            return Ok(());
        }
        if self.control.stopped() {
            return Err(PlaybackError::Seek("player released".to_string()));
        }
        self.control.request_seek(position);
        Ok(())
    }

    fn release(&mut self) {
        self.control.stop.store(true, Ordering::Release);
        self.source = None;
        let Some(worker) = self.worker.take() else {
            return;
        };
        // Returns within one decode plus one pacing slice. The decoder and
        // the finish callback are dropped by the time the join completes.
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            warn!(target: LOG_TARGET, "Playback worker panicked");
        }
        debug!(target: LOG_TARGET, "Released running player");
    }
}

impl Drop for SymphoniaPlayer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Sleeps until `due`, waking every [`PACING_SLICE`] to honour a stop.
/// Returns `false` if stopped while waiting.
fn pace_until(due: Instant, control: &WorkerControl) -> bool {
    loop {
        if control.stopped() {
            return false;
        }
        let now = Instant::now();
        if now >= due {
            return true;
        }
        std::thread::sleep((due - now).min(PACING_SLICE));
    }
}

fn play_loop(mut source: DecodedSource, control: Arc<WorkerControl>, clock: PlaybackClock, on_finish: OnFinishCallback) {
    let mut anchor_wall = Instant::now();
    let mut anchor_media = source.position;
    debug!(target: LOG_TARGET, "Playback worker started");

    loop {
        if control.stopped() {
            debug!(target: LOG_TARGET, "Playback worker stopped");
            return;
        }
        if let Some(target) = control.take_seek() {
            match source.seek(target) {
                Ok(actual) => {
                    anchor_wall = Instant::now();
                    anchor_media = actual;
                    clock.set_position(actual);
                }
                Err(e) => warn!(target: LOG_TARGET, "Seek to {:?} failed: {}", target, e),
            }
        }
        match source.next_packet() {
            Ok(Some(position)) => {
                let due = anchor_wall + position.saturating_sub(anchor_media);
                if !pace_until(due, &control) {
                    debug!(target: LOG_TARGET, "Playback worker stopped");
                    return;
                }
                clock.set_position(position);
                trace!(target: LOG_TARGET, ?position, "Packet played");
            }
            Ok(None) => break,
            Err(e) => {
                warn!(target: LOG_TARGET, "Decoding failed mid-stream, ending playback: {}", e);
                break;
            }
        }
    }

    if !control.stopped() {
        info!(target: LOG_TARGET, "End of stream reached");
        on_finish();
    }
}
