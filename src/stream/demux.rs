//! Marker-driven frame extraction from the live byte stream.

use super::buffer::FixedBuffer;
use super::slot::FrameSlot;
use crate::jpeg::{EOI, MARKER_PREFIX, SOI};
use std::io::{self, Read};

/// Parser position relative to frame boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxState {
    /// Waiting for a start-of-image marker.
    Searching,
    /// Accumulating bytes of a frame.
    InFrame,
}

/// Running counters, exported through the metrics registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    /// Total bytes consumed from the stream.
    pub bytes_consumed: u64,
    /// Frames copied into the slot.
    pub frames_delivered: u64,
    /// Complete frames discarded because the slot was still occupied.
    pub frames_dropped_busy: u64,
    /// Frames discarded because they outgrew the scratch buffer.
    pub frames_oversized: u64,
}

/// Result of one bounded [`StreamDemux::poll`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Bytes consumed during this call.
    pub consumed: usize,
    /// Frames handed to the slot during this call.
    pub delivered: usize,
    /// The source reported end of stream.
    pub end_of_stream: bool,
}

/// Resumable SOI/EOI frame splitter with a fixed memory budget.
///
/// All parsing state lives in the struct, so a frame may arrive across any
/// number of `poll` calls. Each call consumes at most `bytes_per_poll`
/// bytes so the control loop stays responsive.
pub struct StreamDemux {
    state: DemuxState,
    previous: u8,
    scratch: FixedBuffer,
    chunk: Box<[u8]>,
    stats: DemuxStats,
}

impl StreamDemux {
    /// Creates a demux whose frames may be at most `max_frame_size - 1`
    /// bytes, reading at most `bytes_per_poll` bytes per call.
    pub fn new(max_frame_size: usize, bytes_per_poll: usize) -> Self {
        Self {
            state: DemuxState::Searching,
            previous: 0,
            scratch: FixedBuffer::new(max_frame_size),
            chunk: vec![0u8; bytes_per_poll.max(1)].into_boxed_slice(),
            stats: DemuxStats::default(),
        }
    }

    /// Current parser state.
    pub fn state(&self) -> DemuxState {
        self.state
    }

    /// Bytes of the frame currently being accumulated.
    pub fn pending_len(&self) -> usize {
        self.scratch.len()
    }

    /// Scratch buffer capacity.
    pub fn capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Per-call byte budget.
    pub fn bytes_per_poll(&self) -> usize {
        self.chunk.len()
    }

    /// Counters accumulated since creation.
    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// Forgets any partial frame, e.g. after the feed was reconnected.
    pub fn reset(&mut self) {
        self.state = DemuxState::Searching;
        self.previous = 0;
        self.scratch.clear();
    }

    /// Reads up to the per-call budget from `source` and feeds it through
    /// the parser.
    ///
    /// Stops early when a read returns fewer bytes than asked for or
    /// reports `WouldBlock` or `TimedOut`, so a stalled source costs at most
    /// one read wait per call.
    pub fn poll<R: Read>(&mut self, source: &mut R, slot: &mut FrameSlot) -> io::Result<PollOutcome> {
        let budget = self.chunk.len();
        let mut outcome = PollOutcome::default();

        while outcome.consumed < budget {
            let want = budget - outcome.consumed;
            let read = match source.read(&mut self.chunk[..want]) {
                Ok(0) => {
                    outcome.end_of_stream = true;
                    break;
                }
                Ok(n) => n,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    break
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            for i in 0..read {
                let byte = self.chunk[i];
                if self.feed_byte(byte, slot) {
                    outcome.delivered += 1;
                }
            }
            outcome.consumed += read;

            if read < want {
                break;
            }
        }

        self.stats.bytes_consumed += outcome.consumed as u64;
        tracing::trace!(
            consumed = outcome.consumed,
            delivered = outcome.delivered,
            pending = self.scratch.len(),
            "Demux poll"
        );
        Ok(outcome)
    }

    /// Feeds an in-memory chunk, ignoring the per-call budget.
    ///
    /// Returns the number of frames handed to the slot.
    pub fn feed(&mut self, bytes: &[u8], slot: &mut FrameSlot) -> usize {
        let mut delivered = 0;
        for &byte in bytes {
            if self.feed_byte(byte, slot) {
                delivered += 1;
            }
        }
        self.stats.bytes_consumed += bytes.len() as u64;
        delivered
    }

    /// Advances the state machine by one byte. Returns true if a frame was
    /// delivered to the slot.
    fn feed_byte(&mut self, byte: u8, slot: &mut FrameSlot) -> bool {
        let mut delivered = false;

        if self.previous == MARKER_PREFIX && byte == SOI {
            // A start marker restarts the frame from any state
            if self.scratch.replace_with(&[MARKER_PREFIX, SOI]).is_ok() {
                self.state = DemuxState::InFrame;
            }
        } else if self.state == DemuxState::InFrame {
            if self.scratch.push(byte).is_err() || self.scratch.is_full() {
                self.stats.frames_oversized += 1;
                tracing::debug!(capacity = self.scratch.capacity(), "Discarding oversize frame");
                self.scratch.clear();
                self.state = DemuxState::Searching;
                self.previous = 0;
                return false;
            }

            if self.previous == MARKER_PREFIX && byte == EOI {
                if slot.offer(self.scratch.as_slice()) {
                    self.stats.frames_delivered += 1;
                    delivered = true;
                } else {
                    self.stats.frames_dropped_busy += 1;
                }
                self.scratch.clear();
                self.state = DemuxState::Searching;
            }
        }

        self.previous = byte;
        delivered
    }
}

impl std::fmt::Debug for StreamDemux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDemux")
            .field("state", &self.state)
            .field("pending", &self.scratch.len())
            .field("capacity", &self.scratch.capacity())
            .field("bytes_per_poll", &self.chunk.len())
            .field("stats", &self.stats)
            .finish()
    }
}
