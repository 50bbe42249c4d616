//! Frame source abstraction and fixed-size framing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::defaults;
use crate::error::{Result, VocmdError};
use crate::pipeline::types::Frame;

/// Abstraction over audio input for the pipeline.
///
/// Implementations: live microphone capture ([`crate::audio::capture::CpalFrameSource`]),
/// WAV file playback ([`crate::audio::wav::WavFrameSource`]), and
/// [`MockFrameSource`] for tests.
pub trait FrameSource: Send {
    /// Begins capturing. Idempotent.
    fn start(&mut self) -> Result<()>;

    /// Stops capturing. Idempotent.
    fn stop(&mut self) -> Result<()>;

    /// Drains whatever samples have accumulated since the last read.
    ///
    /// `Ok(Some(vec))` may be empty when no new audio has arrived yet.
    /// `Ok(None)` means the source is exhausted and will never produce more;
    /// live sources never return it.
    fn read_samples(&mut self) -> Result<Option<Vec<i16>>>;

    /// Sample rate of the delivered audio.
    fn sample_rate(&self) -> u32 {
        defaults::SAMPLE_RATE
    }

    /// True for sources with a fixed end (files, test scripts).
    fn is_finite(&self) -> bool {
        false
    }
}

/// Scripted source for tests: replays queued reads in order, then reports
/// exhaustion with `Ok(None)`.
pub struct MockFrameSource {
    script: Mutex<VecDeque<Result<Option<Vec<i16>>>>>,
    starts: Arc<AtomicUsize>,
}

impl MockFrameSource {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queues one chunk of samples for the next `read_samples` call.
    pub fn then_samples(self, samples: Vec<i16>) -> Self {
        self.then_read(Ok(Some(samples)))
    }

    /// Queues a capture error, for exercising the re-open path.
    pub fn then_error(self, message: &str) -> Self {
        self.then_read(Err(VocmdError::Capture {
            message: message.to_string(),
        }))
    }

    pub fn then_read(self, read: Result<Option<Vec<i16>>>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(read);
        }
        self
    }

    /// Counter incremented on every `start()`, shared so callers can assert
    /// on re-open behavior after the source moves into the pipeline.
    pub fn start_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.starts)
    }
}

impl Default for MockFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for MockFrameSource {
    fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Option<Vec<i16>>> {
        let mut script = self.script.lock().map_err(|e| VocmdError::Capture {
            message: format!("mock script lock poisoned: {}", e),
        })?;
        script.pop_front().unwrap_or(Ok(None))
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Slices a sample stream into fixed-size frames.
///
/// Reads from a [`FrameSource`] arrive in arbitrary chunk sizes; the framer
/// buffers the remainder so every emitted frame carries exactly
/// `frame_samples` samples. Sequence numbers are assigned here and increase
/// monotonically for the life of the stream, including across device
/// re-opens.
pub struct Framer {
    frame_samples: usize,
    residual: Vec<i16>,
    sequence: u64,
}

impl Framer {
    pub fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples,
            residual: Vec::with_capacity(frame_samples * 2),
            sequence: 0,
        }
    }

    /// Appends samples and returns every complete frame now available.
    pub fn push(&mut self, samples: &[i16], timestamp: Instant) -> Vec<Frame> {
        self.residual.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.residual.len() >= self.frame_samples {
            let rest = self.residual.split_off(self.frame_samples);
            let chunk = std::mem::replace(&mut self.residual, rest);
            frames.push(Frame::new(chunk, timestamp, self.sequence));
            self.sequence += 1;
        }
        frames
    }

    /// Flushes the trailing partial frame at end of stream, zero-padded to
    /// full size so no captured sample is dropped. Returns `None` when the
    /// residual is empty.
    pub fn flush(&mut self, timestamp: Instant) -> Option<Frame> {
        if self.residual.is_empty() {
            return None;
        }
        let mut chunk = std::mem::take(&mut self.residual);
        chunk.resize(self.frame_samples, 0);
        let frame = Frame::new(chunk, timestamp, self.sequence);
        self.sequence += 1;
        Some(frame)
    }

    /// Next sequence number to be assigned.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Samples currently buffered below one frame.
    pub fn pending_samples(&self) -> usize {
        self.residual.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_nothing_below_one_frame() {
        let mut framer = Framer::new(512);
        let frames = framer.push(&vec![1i16; 511], Instant::now());
        assert!(frames.is_empty());
        assert_eq!(framer.pending_samples(), 511);
    }

    #[test]
    fn emits_exact_frames_and_keeps_remainder() {
        let mut framer = Framer::new(512);
        let frames = framer.push(&vec![1i16; 1200], Instant::now());
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.samples.len() == 512));
        assert_eq!(framer.pending_samples(), 176);
    }

    #[test]
    fn sequence_numbers_are_monotonic_across_pushes() {
        let mut framer = Framer::new(512);
        let first = framer.push(&vec![0i16; 1024], Instant::now());
        let second = framer.push(&vec![0i16; 1024], Instant::now());
        let sequences: Vec<u64> = first
            .iter()
            .chain(second.iter())
            .map(|f| f.sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn residual_carries_across_reads() {
        let mut framer = Framer::new(4);
        assert!(framer.push(&[1, 2, 3], Instant::now()).is_empty());
        let frames = framer.push(&[4, 5], Instant::now());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![1, 2, 3, 4]);
        assert_eq!(framer.pending_samples(), 1);
    }

    #[test]
    fn flush_pads_partial_frame_with_zeros() {
        let mut framer = Framer::new(4);
        framer.push(&[7, 8], Instant::now());
        let frame = framer.flush(Instant::now()).unwrap();
        assert_eq!(frame.samples, vec![7, 8, 0, 0]);
        assert!(framer.flush(Instant::now()).is_none());
    }

    #[test]
    fn flush_on_empty_residual_is_none() {
        let mut framer = Framer::new(512);
        assert!(framer.flush(Instant::now()).is_none());
    }
}
