//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Decoded mono audio
#[derive(Debug, Clone, Default)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Clip {
    /// Playing time of the clip
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let millis = self.samples.len() as u64 * 1000 / u64::from(self.sample_rate);
        Duration::from_millis(millis)
    }
}

/// Plays audio to the default output device
///
/// Blocking; run it on a blocking thread. The output stream is not `Send`.
pub struct AudioPlayback {
    device: Device,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self { device })
    }

    /// Play a clip until it ends or `stop` is raised
    ///
    /// Returns `true` if playback ran to completion.
    ///
    /// # Errors
    ///
    /// Returns error if the device has no config for the clip's sample rate
    pub fn play(&self, clip: Clip, stop: &AtomicBool) -> Result<bool> {
        if clip.samples.is_empty() {
            return Ok(true);
        }

        let config = self.output_config(clip.sample_rate)?;
        let channels = usize::from(config.channels);
        let duration = clip.duration();
        let sample_count = clip.samples.len();

        let samples = Arc::new(clip.samples);
        let position = Arc::new(AtomicUsize::new(0));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            self.device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or(0.0);
                            frame.fill(sample);
                            pos = (pos + 1).min(samples.len());
                        }
                        position.store(pos, Ordering::Relaxed);
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let deadline = Instant::now() + duration + Duration::from_millis(500);
        let mut completed = false;

        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                tracing::debug!("playback interrupted");
                break;
            }
            if position.load(Ordering::Relaxed) >= sample_count {
                completed = true;
                // let the device drain its last buffer
                std::thread::sleep(Duration::from_millis(100));
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        drop(stream);
        tracing::debug!(samples = sample_count, completed, "playback finished");
        Ok(completed)
    }

    /// Decode and play MP3 bytes until done or `stop` is raised
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8], stop: &AtomicBool) -> Result<bool> {
        let clip = decode_mp3(mp3_data)?;
        self.play(clip, stop)
    }

    fn output_config(&self, sample_rate: u32) -> Result<StreamConfig> {
        let rate = SampleRate(sample_rate);
        let fits = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        };

        let mono = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| fits(c, 1));

        let range = match mono {
            Some(range) => range,
            None => self
                .device
                .supported_output_configs()
                .map_err(|e| Error::Audio(e.to_string()))?
                .find(|c| fits(c, 2))
                .ok_or_else(|| {
                    Error::Audio(format!("no output config for {sample_rate}Hz"))
                })?,
        };

        Ok(range.with_sample_rate(rate).config())
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error on a corrupt stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Clip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut clip = Clip::default();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if clip.sample_rate == 0 {
                    clip.sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();
                }

                if frame.channels == 2 {
                    clip.samples.extend(frame.data.chunks(2).map(|pair| {
                        let left = f32::from(pair[0]) / 32768.0;
                        let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    clip.samples
                        .extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_duration() {
        let clip = Clip {
            samples: vec![0.0; 24_000],
            sample_rate: 24_000,
        };
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert_eq!(Clip::default().duration(), Duration::ZERO);
    }
}
