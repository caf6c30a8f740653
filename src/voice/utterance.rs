//! End-of-utterance detection
//!
//! Energy-based: speech starts when a block is loud enough and the utterance
//! ends after a stretch of silence following enough speech.

use super::capture::rms;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech before an utterance can end (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (0.8s at 16kHz)
const SILENCE_SAMPLES: usize = 12800;

/// Progress of the current utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    /// Nothing heard yet
    Waiting,
    /// Speech in progress
    Speaking,
    /// Speech followed by enough silence
    Complete,
}

/// Accumulates one spoken utterance from a stream of sample blocks
#[derive(Debug)]
pub struct UtteranceDetector {
    state: UtteranceState,
    speech: Vec<f32>,
    voiced: usize,
    silence: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: UtteranceState::Waiting,
            speech: Vec::new(),
            voiced: 0,
            silence: 0,
        }
    }

    /// Feed a block of samples; returns the state afterwards
    pub fn process(&mut self, samples: &[f32]) -> UtteranceState {
        if samples.is_empty() {
            return self.state;
        }

        let energy = rms(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            UtteranceState::Waiting => {
                if is_speech {
                    tracing::trace!(energy, "speech started");
                    self.state = UtteranceState::Speaking;
                    self.speech.extend_from_slice(samples);
                    self.voiced = samples.len();
                    self.silence = 0;
                }
            }
            UtteranceState::Speaking => {
                self.speech.extend_from_slice(samples);

                if is_speech {
                    self.voiced += samples.len();
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                if self.silence > SILENCE_SAMPLES && self.voiced > MIN_SPEECH_SAMPLES {
                    tracing::debug!(samples = self.speech.len(), "utterance complete");
                    self.state = UtteranceState::Complete;
                }
            }
            UtteranceState::Complete => {}
        }

        self.state
    }

    /// Whether enough voiced audio has been heard to count as speech
    #[must_use]
    pub const fn has_speech(&self) -> bool {
        self.voiced > MIN_SPEECH_SAMPLES
    }

    /// Take the accumulated speech and start over
    pub fn take_speech(&mut self) -> Vec<f32> {
        self.state = UtteranceState::Waiting;
        self.voiced = 0;
        self.silence = 0;
        std::mem::take(&mut self.speech)
    }

    #[must_use]
    pub const fn state(&self) -> UtteranceState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (16000.0 * seconds) as usize;
        #[allow(clippy::cast_precision_loss)]
        (0..n)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin())
            .collect()
    }

    fn silence(seconds: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (16000.0 * seconds) as usize;
        vec![0.0; n]
    }

    #[test]
    fn test_silence_keeps_waiting() {
        let mut detector = UtteranceDetector::new();
        assert_eq!(detector.process(&silence(1.0)), UtteranceState::Waiting);
        assert!(!detector.has_speech());
    }

    #[test]
    fn test_speech_then_silence_completes() {
        let mut detector = UtteranceDetector::new();
        assert_eq!(detector.process(&tone(0.5)), UtteranceState::Speaking);
        assert_eq!(detector.process(&silence(0.5)), UtteranceState::Speaking);
        assert_eq!(detector.process(&silence(0.5)), UtteranceState::Complete);

        let speech = detector.take_speech();
        assert_eq!(speech.len(), tone(0.5).len() + silence(1.0).len());
        assert_eq!(detector.state(), UtteranceState::Waiting);
    }

    #[test]
    fn test_short_blip_does_not_complete() {
        let mut detector = UtteranceDetector::new();
        detector.process(&tone(0.1));
        assert_eq!(detector.process(&silence(1.0)), UtteranceState::Speaking);
        assert!(!detector.has_speech());
    }

    #[test]
    fn test_voiced_count_resets_after_take() {
        let mut detector = UtteranceDetector::new();
        detector.process(&tone(0.5));
        assert!(detector.has_speech());

        detector.take_speech();
        assert!(!detector.has_speech());

        detector.process(&tone(0.1));
        assert_eq!(detector.process(&silence(1.0)), UtteranceState::Speaking);
    }
}
