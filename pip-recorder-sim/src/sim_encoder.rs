//! In-memory chunking encoder.
//!
//! Each chunk is a small record describing what the encoder saw since the
//! previous request: a digest of the current composed frame and the number
//! of mixed audio samples drained. The first chunk carries a container
//! header and `stop` returns a trailer, so a concatenated recording is
//! self-delimiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use pip_recorder_core::models::config::EncoderSettings;
use pip_recorder_core::models::error::CaptureError;
use pip_recorder_core::models::media::CombinedStream;
use pip_recorder_core::traits::media_encoder::MediaEncoder;

pub const HEADER_MAGIC: &[u8; 4] = b"SIMR";
pub const TRAILER: &[u8; 4] = b"END\n";

const DEFAULT_SUPPORTED: [&str; 2] = ["video/webm;codecs=vp8,opus", "video/webm"];

/// What the encoder was asked to do, for inspection from outside the session.
#[derive(Default)]
pub struct EncoderProbe {
    starts: AtomicUsize,
    stops: AtomicUsize,
    settings: Mutex<Vec<EncoderSettings>>,
    output: Mutex<Vec<Vec<u8>>>,
    audio_samples: AtomicUsize,
}

impl EncoderProbe {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Settings of every start, oldest first.
    pub fn settings(&self) -> Vec<EncoderSettings> {
        self.settings.lock().clone()
    }

    pub fn last_settings(&self) -> Option<EncoderSettings> {
        self.settings.lock().last().cloned()
    }

    /// Every buffer returned so far, empty ones included.
    pub fn output(&self) -> Vec<Vec<u8>> {
        self.output.lock().clone()
    }

    pub fn non_empty_output(&self) -> Vec<Vec<u8>> {
        self.output.lock().iter().filter(|c| !c.is_empty()).cloned().collect()
    }

    /// Mixed audio samples consumed across all recordings.
    pub fn audio_samples(&self) -> usize {
        self.audio_samples.load(Ordering::SeqCst)
    }
}

/// A `MediaEncoder` that produces deterministic bytes in memory.
pub struct SimEncoder {
    supported: Vec<String>,
    empty_every: Option<usize>,
    fail_on_stop: bool,
    stream: Option<CombinedStream>,
    sequence: u32,
    probe: Arc<EncoderProbe>,
}

impl SimEncoder {
    pub fn new() -> Self {
        Self {
            supported: DEFAULT_SUPPORTED.iter().map(|s| s.to_string()).collect(),
            empty_every: None,
            fail_on_stop: false,
            stream: None,
            sequence: 0,
            probe: Arc::new(EncoderProbe::default()),
        }
    }

    /// Replace the list of producible types. An empty list supports nothing.
    pub fn with_supported_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported = types.into_iter().map(Into::into).collect();
        self
    }

    /// Return an empty buffer on every `n`th data request.
    pub fn with_empty_chunk_every(mut self, n: usize) -> Self {
        self.empty_every = Some(n.max(1));
        self
    }

    /// Fail the stop call after draining.
    pub fn failing_on_stop(mut self) -> Self {
        self.fail_on_stop = true;
        self
    }

    pub fn probe(&self) -> Arc<EncoderProbe> {
        Arc::clone(&self.probe)
    }

    fn encode_chunk(&mut self, stream: &CombinedStream) -> Vec<u8> {
        self.sequence += 1;
        let samples = stream.audio().read_samples();
        self.probe.audio_samples.fetch_add(samples.len(), Ordering::SeqCst);

        if let Some(n) = self.empty_every {
            if self.sequence as usize % n == 0 {
                return Vec::new();
            }
        }

        let mut chunk = Vec::with_capacity(24);
        chunk.extend_from_slice(&self.sequence.to_le_bytes());
        match stream.video().current_frame() {
            Some(frame) => chunk.extend_from_slice(&Sha256::digest(frame.data())[..8]),
            None => chunk.extend_from_slice(&[0u8; 8]),
        }
        chunk.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        chunk
    }

    fn record(&self, data: &[u8]) {
        self.probe.output.lock().push(data.to_vec());
    }
}

impl Default for SimEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEncoder for SimEncoder {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|s| s == mime_type)
    }

    fn start(&mut self, stream: CombinedStream, settings: &EncoderSettings) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::EncodingFailed("encoder is already running".into()));
        }
        if !self.is_type_supported(&settings.mime_type) {
            return Err(CaptureError::UnsupportedEncoding(settings.mime_type.clone()));
        }
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        self.probe.settings.lock().push(settings.clone());
        self.sequence = 0;
        self.stream = Some(stream);
        log::debug!(
            "Sim encoder started: {} @ {} bps",
            settings.mime_type,
            settings.video_bits_per_second()
        );
        Ok(())
    }

    fn request_data(&mut self) -> Result<Vec<u8>, CaptureError> {
        let Some(stream) = self.stream.clone() else {
            return Err(CaptureError::EncodingFailed("encoder is not running".into()));
        };

        let first = self.sequence == 0;
        let body = self.encode_chunk(&stream);
        let data = if first {
            let mime = self
                .probe
                .last_settings()
                .map(|s| s.mime_type)
                .unwrap_or_default();
            let mut data = HEADER_MAGIC.to_vec();
            data.extend_from_slice(mime.as_bytes());
            data.push(b'\n');
            data.extend_from_slice(&body);
            data
        } else {
            body
        };
        self.record(&data);
        Ok(data)
    }

    fn stop(&mut self) -> Result<Vec<u8>, CaptureError> {
        if self.stream.take().is_none() {
            return Err(CaptureError::EncodingFailed("encoder is not running".into()));
        }
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_stop {
            return Err(CaptureError::EncodingFailed("muxer failed to write the trailer".into()));
        }
        let trailer = TRAILER.to_vec();
        self.record(&trailer);
        log::debug!("Sim encoder stopped after {} chunk(s)", self.sequence);
        Ok(trailer)
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}
