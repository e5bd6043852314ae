use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::artifact::RecordingArtifact;
use crate::models::config::EncoderSettings;
use crate::models::error::CaptureError;
use crate::models::media::CombinedStream;
use crate::models::state::StateHandle;
use crate::processing::chunk_buffer::ChunkBuffer;
use crate::scheduler::{Scheduler, TimerId};
use crate::storage::artifact_writer::sha256_hex;
use crate::traits::media_encoder::MediaEncoder;
use crate::traits::recorder_delegate::RecorderDelegate;

/// Pick the first candidate the encoder supports.
pub fn negotiate_mime_type<E: MediaEncoder + ?Sized>(
    candidates: &[String],
    encoder: &E,
) -> Result<String, CaptureError> {
    candidates
        .iter()
        .find(|mime| encoder.is_type_supported(mime))
        .cloned()
        .ok_or_else(|| {
            CaptureError::UnsupportedEncoding(format!(
                "none of the candidate formats is supported: {}",
                candidates.join(", ")
            ))
        })
}

/// Chunk counters for one recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub chunks_emitted: u64,
    pub empty_chunks_discarded: u64,
    pub bytes_collected: u64,
}

/// Result of finalizing a recording.
///
/// The artifact always holds every chunk collected before the stop, even
/// when the encoder failed to stop cleanly; `stop_error` reports that failure.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub artifact: RecordingArtifact,
    pub stop_error: Option<CaptureError>,
}

/// Drives a [`MediaEncoder`]: periodic chunk collection while recording,
/// and assembly of the final artifact on finalize.
pub struct Recorder<E: MediaEncoder> {
    encoder: Arc<Mutex<E>>,
    chunks: Arc<Mutex<ChunkBuffer>>,
    stats: Arc<Mutex<RecorderStats>>,
    delegate: Option<Arc<dyn RecorderDelegate>>,
    settings: Option<EncoderSettings>,
    emission_timer: Option<TimerId>,
    started_at: Duration,
}

impl<E: MediaEncoder + 'static> Recorder<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder: Arc::new(Mutex::new(encoder)),
            chunks: Arc::new(Mutex::new(ChunkBuffer::new())),
            stats: Arc::new(Mutex::new(RecorderStats::default())),
            delegate: None,
            settings: None,
            emission_timer: None,
            started_at: Duration::ZERO,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecorderDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn negotiate(&self, candidates: &[String]) -> Result<String, CaptureError> {
        let encoder = self.encoder.lock();
        negotiate_mime_type(candidates, &*encoder)
    }

    /// Settings of the running recording.
    pub fn settings(&self) -> Option<&EncoderSettings> {
        self.settings.as_ref()
    }

    pub fn stats(&self) -> RecorderStats {
        *self.stats.lock()
    }

    /// Chunks collected so far in this recording.
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.lock().total_bytes()
    }

    /// Start encoding `stream` and collect a chunk every `settings.timeslice`.
    ///
    /// Only valid while `state` is recording; ticks that fire after the
    /// session left recording collect nothing.
    pub fn start(
        &mut self,
        stream: CombinedStream,
        settings: EncoderSettings,
        scheduler: &Scheduler,
        state: &StateHandle,
    ) -> Result<(), CaptureError> {
        state.require_recording("encoder start")?;
        if self.settings.is_some() || self.encoder.lock().is_active() {
            return Err(CaptureError::InvalidState("recorder is already running".into()));
        }

        self.chunks.lock().clear();
        *self.stats.lock() = RecorderStats::default();

        self.encoder.lock().start(stream, &settings)?;

        let encoder = Arc::clone(&self.encoder);
        let chunks = Arc::clone(&self.chunks);
        let stats = Arc::clone(&self.stats);
        let delegate = self.delegate.clone();
        let state = state.clone();
        let timer = scheduler.set_interval(settings.timeslice, move || {
            if !state.is_recording() {
                log::trace!("Chunk tick outside recording, skipping");
                return;
            }
            let data = encoder.lock().request_data();
            match data {
                Ok(data) => collect(&chunks, &stats, delegate.as_deref(), data),
                Err(e) => log::error!("Chunk request failed: {}", e),
            }
        });

        log::info!(
            "Encoder started: {} at {} bps video / {} bps audio, {} fps",
            settings.mime_type,
            settings.video_bits_per_second(),
            settings.audio_bitrate_bps,
            settings.frame_rate
        );
        self.emission_timer = Some(timer);
        self.started_at = scheduler.now();
        self.settings = Some(settings);
        Ok(())
    }

    /// Flush and stop the encoder, then assemble the artifact.
    ///
    /// `on_stopped` runs exactly once, right after the encoder acknowledged
    /// the stop (or failed to), and before the chunk buffer is assembled.
    /// Only a recorder that was never started is an error here.
    pub fn finalize<F: FnOnce()>(
        &mut self,
        scheduler: &Scheduler,
        file_name: &str,
        on_stopped: F,
    ) -> Result<FinalizeOutcome, CaptureError> {
        let Some(settings) = self.settings.take() else {
            return Err(CaptureError::InvalidState("recorder is not running".into()));
        };
        if let Some(timer) = self.emission_timer.take() {
            scheduler.clear(timer);
        }

        let flushed = self.encoder.lock().request_data();
        match flushed {
            Ok(data) => collect(&self.chunks, &self.stats, self.delegate.as_deref(), data),
            Err(e) => log::warn!("Final chunk request failed: {}", e),
        }

        let stopped = self.encoder.lock().stop();
        on_stopped();

        let stop_error = match stopped {
            Ok(trailing) => {
                collect(&self.chunks, &self.stats, self.delegate.as_deref(), trailing);
                None
            }
            Err(e) => {
                log::error!("Encoder failed to stop, keeping {} collected chunk(s): {}", self.chunks.lock().len(), e);
                Some(e)
            }
        };

        let (data, chunk_count) = {
            let mut chunks = self.chunks.lock();
            let count = chunks.len();
            (chunks.take_concatenated(), count)
        };

        let artifact = RecordingArtifact {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            mime_type: settings.mime_type,
            checksum: sha256_hex(&data),
            data,
            chunk_count,
            duration_secs: scheduler.now().saturating_sub(self.started_at).as_secs_f64(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        log::info!(
            "Recording finalized: {} chunks, {} bytes, {:.2}s",
            artifact.chunk_count,
            artifact.len(),
            artifact.duration_secs
        );
        Ok(FinalizeOutcome { artifact, stop_error })
    }
}

fn collect(
    chunks: &Mutex<ChunkBuffer>,
    stats: &Mutex<RecorderStats>,
    delegate: Option<&dyn RecorderDelegate>,
    data: Vec<u8>,
) {
    let len = data.len();
    let (appended, total) = {
        let mut buffer = chunks.lock();
        let appended = buffer.push(data);
        (appended, buffer.len())
    };

    let mut s = stats.lock();
    if !appended {
        s.empty_chunks_discarded += 1;
        log::trace!("Discarded empty chunk");
        return;
    }
    s.chunks_emitted += 1;
    s.bytes_collected += len as u64;
    drop(s);

    log::debug!("Chunk {} collected ({} bytes)", total, len);
    if let Some(d) = delegate {
        d.on_chunk(len, total);
    }
}
