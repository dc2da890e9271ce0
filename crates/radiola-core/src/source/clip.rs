//! One-shot clip source (notifications, decoded TTS announcements)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{AudioSource, Seekable, SourceCategory, SourceId};
use crate::error::{CoreError, CoreResult};
use crate::types::AtomicF32;

/// Plays a pre-decoded interleaved buffer once
pub struct ClipSource {
    id: SourceId,
    category: SourceCategory,
    volume: AtomicF32,
    samples: Arc<[f32]>,
    channels: usize,
    sample_rate: u32,
    /// Read position in samples (always frame aligned)
    cursor: AtomicUsize,
}

impl ClipSource {
    pub fn new(
        id: &str,
        category: SourceCategory,
        samples: impl Into<Arc<[f32]>>,
        sample_rate: u32,
        channels: u16,
    ) -> CoreResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(CoreError::InvalidArgument(
                "clip sample rate and channel count must be positive".to_string(),
            ));
        }
        Ok(Self {
            id: SourceId::new(id)?,
            category,
            volume: AtomicF32::new(1.0),
            samples: samples.into(),
            channels: channels as usize,
            sample_rate,
            cursor: AtomicUsize::new(0),
        })
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

impl AudioSource for ClipSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn category(&self) -> SourceCategory {
        self.category
    }

    fn volume(&self) -> f32 {
        self.volume.get()
    }

    fn set_volume(&self, volume: f32) {
        self.volume.set(volume.clamp(0.0, 1.0));
    }

    fn read_samples(&self, out: &mut [f32]) -> usize {
        let end = self.frames() * self.channels;
        let start = self.cursor.load(Ordering::Acquire).min(end);
        let wanted = out.len() - out.len() % self.channels;
        let n = wanted.min(end - start);

        out[..n].copy_from_slice(&self.samples[start..start + n]);
        self.cursor.store(start + n, Ordering::Release);
        n
    }

    fn is_finished(&self) -> bool {
        self.cursor.load(Ordering::Acquire) >= self.frames() * self.channels
    }

    fn as_seekable(&self) -> Option<&dyn Seekable> {
        Some(self)
    }
}

impl Seekable for ClipSource {
    fn seek(&self, position: Duration) -> CoreResult<()> {
        let frame = (position.as_secs_f64() * self.sample_rate as f64) as usize;
        let frame = frame.min(self.frames());
        self.cursor.store(frame * self.channels, Ordering::Release);
        Ok(())
    }

    fn position(&self) -> Duration {
        let frame = self.cursor.load(Ordering::Acquire) / self.channels;
        Duration::from_secs_f64(frame as f64 / self.sample_rate as f64)
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.frames() as f64 / self.sample_rate as f64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::seek;

    fn chime() -> ClipSource {
        let samples: Vec<f32> = (0..8).map(|i| i as f32 / 10.0).collect();
        ClipSource::new("chime", SourceCategory::Event, samples, 4, 2).unwrap()
    }

    #[test]
    fn test_plays_once_then_finishes() {
        let clip = chime();
        let mut out = [0.0f32; 6];
        assert_eq!(clip.read_samples(&mut out), 6);
        assert!(!clip.is_finished());
        assert_eq!(clip.read_samples(&mut out), 2);
        assert_eq!(&out[..2], &[0.6, 0.7]);
        assert!(clip.is_finished());
        assert_eq!(clip.read_samples(&mut out), 0);
    }

    #[test]
    fn test_seek_is_frame_aligned() {
        let clip = chime();
        seek(&clip, Duration::from_millis(500)).unwrap();
        // 0.5 s at 4 Hz = frame 2 = sample 4
        assert_eq!(clip.position(), Duration::from_millis(500));
        let mut out = [0.0f32; 2];
        clip.read_samples(&mut out);
        assert_eq!(out, [0.4, 0.5]);
    }

    #[test]
    fn test_duration() {
        assert_eq!(chime().duration(), Some(Duration::from_secs(1)));
    }
}
