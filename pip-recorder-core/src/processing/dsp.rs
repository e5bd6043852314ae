//! Pure-math audio processing stages used by the mixing graph.
//!
//! All stages operate in place on mono `f32` buffers and keep their own
//! state between calls, so a track can be processed block by block.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Second-order IIR filter (RBJ cookbook), direct form I.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    cutoff_hz: f64,
}

impl BiquadFilter {
    /// Butterworth high-pass at `cutoff_hz`.
    pub fn high_pass(cutoff_hz: f64, sample_rate: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * FRAC_1_SQRT_2);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            cutoff_hz,
        }
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn process_sample(&mut self, input: f32) -> f32 {
        let x0 = input as f64;
        let y0 = self.b0 * x0 + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = y0;
        y0 as f32
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Static parameters of a dynamics compressor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub knee_db: f64,
    pub ratio: f64,
    pub attack_secs: f64,
    pub release_secs: f64,
}

impl CompressorSettings {
    /// The fixed microphone echo-dampening curve.
    pub const ECHO_DAMPENING: CompressorSettings = CompressorSettings {
        threshold_db: -40.0,
        knee_db: 10.0,
        ratio: 4.0,
        attack_secs: 0.003,
        release_secs: 0.25,
    };
}

/// Feed-forward compressor with a soft knee and attack/release smoothing
/// of the gain reduction.
#[derive(Debug, Clone)]
pub struct DynamicsCompressor {
    settings: CompressorSettings,
    attack_coeff: f64,
    release_coeff: f64,
    /// Smoothed gain reduction in dB (always <= 0).
    envelope_db: f64,
}

impl DynamicsCompressor {
    /// Levels below this are treated as silence.
    const FLOOR_DB: f64 = -120.0;

    pub fn new(settings: CompressorSettings, sample_rate: f64) -> Self {
        Self {
            settings,
            attack_coeff: smoothing_coeff(settings.attack_secs, sample_rate),
            release_coeff: smoothing_coeff(settings.release_secs, sample_rate),
            envelope_db: 0.0,
        }
    }

    pub fn settings(&self) -> CompressorSettings {
        self.settings
    }

    /// Current gain reduction in dB (0 = none).
    pub fn reduction_db(&self) -> f64 {
        self.envelope_db
    }

    /// Static output level for an input level, both in dB.
    pub fn gain_computer(&self, level_db: f64) -> f64 {
        let CompressorSettings {
            threshold_db,
            knee_db,
            ratio,
            ..
        } = self.settings;
        let over = level_db - threshold_db;

        if 2.0 * over < -knee_db {
            level_db
        } else if knee_db > 0.0 && 2.0 * over.abs() <= knee_db {
            let k = over + knee_db / 2.0;
            level_db + (1.0 / ratio - 1.0) * k * k / (2.0 * knee_db)
        } else {
            threshold_db + over / ratio
        }
    }

    pub fn process_sample(&mut self, input: f32) -> f32 {
        let magnitude = (input as f64).abs();
        let level_db = if magnitude > 0.0 {
            (20.0 * magnitude.log10()).max(Self::FLOOR_DB)
        } else {
            Self::FLOOR_DB
        };

        let target = self.gain_computer(level_db) - level_db;
        let coeff = if target < self.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * target;

        (input as f64 * db_to_gain(self.envelope_db)) as f32
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

fn smoothing_coeff(time_secs: f64, sample_rate: f64) -> f64 {
    if time_secs <= 0.0 || sample_rate <= 0.0 {
        return 0.0;
    }
    (-1.0 / (time_secs * sample_rate)).exp()
}

/// Streaming linear-interpolation rate converter for one mono track.
///
/// Output positions are tracked across calls, and the last input sample is
/// held back so the next block interpolates from it. Feeding a track block
/// by block yields the same samples as converting it in one piece.
#[derive(Debug, Clone)]
pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
    /// Position of the next output relative to the held sample, in
    /// 1/`to_rate` fractions of an input sample.
    position: u64,
    held: Option<f32>,
}

impl Resampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            position: 0,
            held: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate || self.from_rate == 0 || self.to_rate == 0
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        if input.is_empty() {
            return Vec::new();
        }

        let to = u64::from(self.to_rate);
        let window: Vec<f32> = self.held.into_iter().chain(input.iter().copied()).collect();
        let last = window.len() - 1;
        let mut out = Vec::with_capacity(input.len() * self.to_rate as usize / self.from_rate as usize + 1);
        loop {
            let index = (self.position / to) as usize;
            if index >= last {
                break;
            }
            let fraction = (self.position % to) as f32 / self.to_rate as f32;
            out.push(window[index] * (1.0 - fraction) + window[index + 1] * fraction);
            self.position += u64::from(self.from_rate);
        }

        self.position -= last as u64 * to;
        self.held = Some(window[last]);
        out
    }
}

/// Peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}
