//! # Hardware Buffer Ring
//!
//! The fixed set of backend buffers a stream cycles through.
//!
//! ## Design
//!
//! - **Capacity**: fixed when the stream loop starts (`buffer_count` slots)
//! - **Ownership**: the ring allocates its buffers and deletes them on
//!   [`BufferRing::release`] or drop
//! - **Bookkeeping**: each slot carries its own tag, independent of what the
//!   backend reports. A queued slot is never refilled, a slot that comes
//!   back without having been queued is an error, and a foreign handle is
//!   detected instead of silently reused
//!
//! ```text
//!        submit              reclaim
//! Idle ─────────▶ Queued ─────────────▶ PendingRefill
//!                   ▲                        │
//!                   └──────── submit ────────┘
//! ```

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{AudioBackend, BufferHandle, SampleFormat, VoiceHandle};
use std::sync::Arc;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Freshly allocated, never filled.
    Idle,
    /// Queued on the voice.
    Queued,
    /// Unqueued by the backend and waiting for the next chunk.
    PendingRefill,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    handle: BufferHandle,
    state: SlotState,
    /// Samples (all channels) uploaded with the last submit.
    samples: usize,
}

/// Backend buffers owned by one run of a stream loop.
pub struct BufferRing {
    backend: Arc<dyn AudioBackend>,
    slots: Vec<Slot>,
    released: bool,
}

impl BufferRing {
    /// Allocate `count` backend buffers.
    pub fn allocate(backend: Arc<dyn AudioBackend>, count: usize) -> Result<Self> {
        let handles = backend.create_buffers(count)?;
        trace!(count, "allocated buffer ring");
        Ok(Self {
            backend,
            slots: handles
                .into_iter()
                .map(|handle| Slot {
                    handle,
                    state: SlotState::Idle,
                    samples: 0,
                })
                .collect(),
            released: false,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|slot| slot.state)
    }

    pub fn handle(&self, index: usize) -> Option<BufferHandle> {
        self.slots.get(index).map(|slot| slot.handle)
    }

    /// Upload `samples` into slot `index` and append it to `voice`'s queue.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::BufferStillQueued`] if the slot has not been reclaimed
    /// - [`PlaybackError::Backend`] if the upload or queueing fails
    pub fn submit(
        &mut self,
        index: usize,
        voice: VoiceHandle,
        format: SampleFormat,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| PlaybackError::Internal(format!("ring slot {index} out of range")))?;
        if slot.state == SlotState::Queued {
            return Err(PlaybackError::BufferStillQueued(index));
        }

        self.backend
            .buffer_data(slot.handle, format, samples, sample_rate)?;
        self.backend.queue_buffers(voice, &[slot.handle])?;
        slot.state = SlotState::Queued;
        slot.samples = samples.len();
        trace!(index, samples = samples.len(), buffer = %slot.handle, "submitted chunk");
        Ok(())
    }

    /// Take back a buffer the backend unqueued.
    ///
    /// Returns the slot index and the number of samples it carried.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::ForeignBuffer`] if the ring does not own `handle`
    /// - [`PlaybackError::BufferNotQueued`] if the slot was not queued
    pub fn reclaim(&mut self, handle: BufferHandle) -> Result<(usize, usize)> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.handle == handle)
            .ok_or(PlaybackError::ForeignBuffer(handle.0))?;
        if slot.state != SlotState::Queued {
            return Err(PlaybackError::BufferNotQueued(index));
        }
        slot.state = SlotState::PendingRefill;
        Ok((index, slot.samples))
    }

    /// Slots currently queued on the voice.
    pub fn queued_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Queued)
            .count()
    }

    /// Slots unqueued but not refilled yet.
    pub fn pending_refill_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::PendingRefill)
            .count()
    }

    /// Delete every backend buffer. The voice must no longer reference them.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let handles: Vec<BufferHandle> = self.slots.iter().map(|slot| slot.handle).collect();
        self.backend.delete_buffers(&handles)?;
        trace!(count = handles.len(), "released buffer ring");
        Ok(())
    }
}

impl Drop for BufferRing {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release buffer ring: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SoftwareBackend;

    fn setup(count: usize) -> (Arc<SoftwareBackend>, VoiceHandle, BufferRing) {
        let backend = Arc::new(SoftwareBackend::new());
        let voice = backend.create_voice().unwrap();
        let ring = BufferRing::allocate(backend.clone(), count).unwrap();
        (backend, voice, ring)
    }

    #[test]
    fn test_allocate_and_release() {
        let (backend, _voice, mut ring) = setup(3);
        assert_eq!(ring.len(), 3);
        assert_eq!(backend.buffer_count(), 3);

        ring.release().unwrap();
        assert_eq!(backend.buffer_count(), 0);

        // Second release and the drop are no-ops
        ring.release().unwrap();
        drop(ring);
        assert_eq!(backend.buffer_count(), 0);
    }

    #[test]
    fn test_submit_rejects_queued_slot() {
        let (_backend, voice, mut ring) = setup(2);
        let pcm = [0i16; 100];

        ring.submit(0, voice, SampleFormat::Mono16, &pcm, 1_000).unwrap();
        assert_eq!(ring.slot_state(0), Some(SlotState::Queued));
        assert_eq!(ring.queued_count(), 1);

        let err = ring
            .submit(0, voice, SampleFormat::Mono16, &pcm, 1_000)
            .unwrap_err();
        assert!(matches!(err, PlaybackError::BufferStillQueued(0)));
    }

    #[test]
    fn test_reclaim_after_processing() {
        let (backend, voice, mut ring) = setup(2);
        let pcm = [0i16; 50];

        ring.submit(0, voice, SampleFormat::Mono16, &pcm, 1_000).unwrap();
        ring.submit(1, voice, SampleFormat::Mono16, &pcm, 1_000).unwrap();

        // Stopping marks every queued buffer processed
        backend.stop(voice).unwrap();
        let handles = backend.unqueue_buffers(voice, 2).unwrap();

        assert_eq!(ring.reclaim(handles[0]).unwrap(), (0, 50));
        assert_eq!(ring.reclaim(handles[1]).unwrap(), (1, 50));
        assert_eq!(ring.queued_count(), 0);
        assert_eq!(ring.pending_refill_count(), 2);
        assert_eq!(ring.slot_state(0), Some(SlotState::PendingRefill));

        // Slot is reusable once reclaimed
        ring.submit(0, voice, SampleFormat::Mono16, &pcm, 1_000).unwrap();
        assert_eq!(ring.slot_state(0), Some(SlotState::Queued));
        assert_eq!(ring.pending_refill_count(), 1);
        backend.stop(voice).unwrap();
        backend.unqueue_buffers(voice, 1).unwrap();
        ring.reclaim(ring.handle(0).unwrap()).unwrap();
        backend.attach_buffer(voice, None).unwrap();
    }

    #[test]
    fn test_reclaim_requires_queued_slot() {
        let (backend, voice, mut ring) = setup(2);
        let pcm = [0i16; 20];

        // Never submitted
        let err = ring.reclaim(ring.handle(1).unwrap()).unwrap_err();
        assert!(matches!(err, PlaybackError::BufferNotQueued(1)));
        assert_eq!(ring.slot_state(1), Some(SlotState::Idle));

        ring.submit(0, voice, SampleFormat::Mono16, &pcm, 1_000).unwrap();
        backend.stop(voice).unwrap();
        let handle = backend.unqueue_buffers(voice, 1).unwrap()[0];
        ring.reclaim(handle).unwrap();

        // Reclaimed twice without a refill in between
        let err = ring.reclaim(handle).unwrap_err();
        assert!(matches!(err, PlaybackError::BufferNotQueued(0)));
        assert_eq!(ring.slot_state(0), Some(SlotState::PendingRefill));
    }

    #[test]
    fn test_reclaim_foreign_buffer() {
        let (_backend, _voice, mut ring) = setup(1);
        let err = ring.reclaim(BufferHandle(9_999)).unwrap_err();
        assert!(matches!(err, PlaybackError::ForeignBuffer(9_999)));
    }
}
