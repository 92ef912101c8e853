//! Amplitude-based end-of-utterance detection
//!
//! The detector watches the per-chunk level while recording and reports when
//! the user has been quiet for longer than the configured threshold, so a
//! recording ends without an explicit stop. The threshold distinguishes
//! "finished speaking" from "paused mid-thought" and is tuned for feel, not
//! correctness.

/// Mean absolute amplitude of a chunk, normalized to [0, 1]
pub fn chunk_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&s| (s as i32).unsigned_abs() as u64).sum();
    (sum as f64 / samples.len() as f64 / i16::MAX as f64) as f32
}

/// Tracks how long the signal has stayed below the noise floor.
///
/// Pure over `(level, now_ms)` so tests can drive it with a simulated clock.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    noise_floor: f32,
    silence_threshold_ms: u64,
    last_sound_ms: Option<u64>,
}

impl SilenceDetector {
    pub fn new(noise_floor: f32, silence_threshold_ms: u64) -> Self {
        Self {
            noise_floor,
            silence_threshold_ms,
            last_sound_ms: None,
        }
    }

    /// Feed one level reading; returns true once the quiet period has
    /// exceeded the threshold.
    ///
    /// The first reading seeds the clock, so silence is measured from the
    /// start of the recording even if the user never speaks.
    pub fn observe(&mut self, level: f32, now_ms: u64) -> bool {
        let last_sound = match self.last_sound_ms {
            Some(ms) => ms,
            None => {
                self.last_sound_ms = Some(now_ms);
                return false;
            }
        };

        if level > self.noise_floor {
            self.last_sound_ms = Some(now_ms);
            return false;
        }

        now_ms.saturating_sub(last_sound) > self.silence_threshold_ms
    }

    /// Forget everything for a fresh recording
    pub fn reset(&mut self) {
        self.last_sound_ms = None;
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    pub fn silence_threshold_ms(&self) -> u64 {
        self.silence_threshold_ms
    }
}
