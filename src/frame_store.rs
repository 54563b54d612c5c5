// SPDX-License-Identifier: MPL-2.0

//! Frame allocation and recycling.
//!
//! The decoder thread allocates frames from a [`FrameStore`], fills them and
//! hands them to the display thread. The display thread keeps the most
//! recently shown frames in a [`RecentFrames`] ring so a redraw can repaint
//! the last picture; frames pushed out of the ring go back to the store.
//!
//! ```text
//! ┌─────────────┐  alloc_frame()   ┌─────────────┐
//! │ FrameStore  │ ───────────────▶ │  decoder    │
//! └─────▲───────┘                  └─────┬───────┘
//!       │ release()                      │ display_frame()
//!       │                                ▼
//! ┌─────┴────────┐   push()        ┌─────────────┐
//! │ RecentFrames │ ◀────────────── │  display    │
//! └──────────────┘                 └─────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::frame::{Frame, FrameFlags, PixelFormat};

/// Released frames kept around for reuse.
pub const DEFAULT_POOL_SIZE: usize = 15;

/// Frames kept by the display side for redraws.
pub const DEFAULT_RECENT_CAPACITY: usize = 2;

/// A frame shared between the decoder and display threads.
pub type SharedFrame = Arc<Mutex<Frame>>;

/// Lock a shared frame, recovering the data if a holder panicked.
pub fn lock_frame(frame: &SharedFrame) -> MutexGuard<'_, Frame> {
    frame.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of [`FrameStore::update_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChange {
    /// The existing buffers already match the requested layout.
    Unchanged,
    /// New buffers were allocated.
    Reallocated,
    /// Allocation failed, the frame has zero width until the next update.
    Failed,
}

/// Counters describing frame store traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Frames handed out by [`FrameStore::alloc_frame`].
    pub frames_allocated: u64,
    /// Allocations served from the pool of released frames.
    pub frames_reused: u64,
    /// Buffer (re)allocations triggered by format updates.
    pub reallocations: u64,
    /// Format updates whose buffers could not be allocated.
    pub allocation_failures: u64,
    /// Frames whose buffers were freed for good.
    pub frames_disposed: u64,
}

/// Hands out frames and takes them back once displayed.
pub struct FrameStore {
    free: Mutex<Vec<SharedFrame>>,
    pool_size: usize,
    next_id: AtomicU64,
    stats_allocated: AtomicU64,
    stats_reused: AtomicU64,
    stats_reallocations: AtomicU64,
    stats_failures: AtomicU64,
    stats_disposed: AtomicU64,
}

impl FrameStore {
    #[must_use]
    pub fn new(pool_size: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(pool_size)),
            pool_size,
            next_id: AtomicU64::new(0),
            stats_allocated: AtomicU64::new(0),
            stats_reused: AtomicU64::new(0),
            stats_reallocations: AtomicU64::new(0),
            stats_failures: AtomicU64::new(0),
            stats_disposed: AtomicU64::new(0),
        }
    }

    /// Get an empty frame, reusing a released one when possible.
    ///
    /// Reused frames keep their buffers so a following
    /// [`update_format`](Self::update_format) with the same layout is free.
    pub fn alloc_frame(&self) -> SharedFrame {
        self.stats_allocated.fetch_add(1, Ordering::Relaxed);

        let recycled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        if let Some(frame) = recycled {
            self.stats_reused.fetch_add(1, Ordering::Relaxed);
            {
                let mut guard = lock_frame(&frame);
                guard.set_crop(Default::default());
                guard.set_flags(FrameFlags::BOTH_FIELDS);
            }
            return frame;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(id, "allocated new frame");
        Arc::new(Mutex::new(Frame::new(id)))
    }

    /// Make sure the frame's buffers fit the given layout.
    ///
    /// Buffers are only replaced when width, height, format or the chroma
    /// layout change; the flags are always stored. On allocation failure the
    /// frame is left without buffers and a zero width.
    pub fn update_format(
        &self,
        frame: &SharedFrame,
        width: u32,
        height: u32,
        format: PixelFormat,
        flags: FrameFlags,
    ) -> FormatChange {
        let mut frame = lock_frame(frame);
        frame.set_flags(flags);

        let chroma_422 = flags.contains(FrameFlags::CHROMA_422) && format == PixelFormat::Planar420;
        if frame.layout_matches(width, height, format, chroma_422) {
            return FormatChange::Unchanged;
        }

        if width == 0 || height == 0 {
            tracing::warn!(id = frame.id(), width, height, "refusing empty frame format");
            frame.release_planes();
            self.stats_failures.fetch_add(1, Ordering::Relaxed);
            return FormatChange::Failed;
        }

        self.stats_reallocations.fetch_add(1, Ordering::Relaxed);
        match frame.reallocate(width, height, format, chroma_422) {
            Ok(()) => {
                tracing::debug!(
                    id = frame.id(),
                    width,
                    height,
                    ?format,
                    chroma_422,
                    "frame buffers reallocated"
                );
                FormatChange::Reallocated
            }
            Err(why) => {
                frame.release_planes();
                self.stats_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    id = frame.id(),
                    width,
                    height,
                    ?format,
                    ?why,
                    "frame buffer allocation failed"
                );
                FormatChange::Failed
            }
        }
    }

    /// Give a frame back once nobody displays it anymore.
    ///
    /// Frames still referenced elsewhere, including ones already pooled,
    /// are not taken; the pool only hands out frames nobody else holds.
    pub fn release(&self, frame: SharedFrame) {
        if Arc::strong_count(&frame) > 1 {
            tracing::trace!(id = lock_frame(&frame).id(), "frame still in use, not pooling");
            return;
        }

        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.pool_size {
            free.push(frame);
        } else {
            drop(free);
            self.dispose(frame);
        }
    }

    /// Free a frame's buffers for good.
    pub fn dispose(&self, frame: SharedFrame) {
        let mut guard = lock_frame(&frame);
        tracing::trace!(id = guard.id(), "disposing frame");
        guard.release_planes();
        self.stats_disposed.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of released frames waiting for reuse.
    pub fn pooled(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            frames_allocated: self.stats_allocated.load(Ordering::Relaxed),
            frames_reused: self.stats_reused.load(Ordering::Relaxed),
            reallocations: self.stats_reallocations.load(Ordering::Relaxed),
            allocation_failures: self.stats_failures.load(Ordering::Relaxed),
            frames_disposed: self.stats_disposed.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl Drop for FrameStore {
    fn drop(&mut self) {
        let free = std::mem::take(self.free.get_mut().unwrap_or_else(PoisonError::into_inner));
        for frame in free {
            self.dispose(frame);
        }
    }
}

/// Ring of the most recently displayed frames, newest last.
pub struct RecentFrames {
    frames: Vec<Option<SharedFrame>>,
    write_pos: usize,
    count: usize,
}

impl RecentFrames {
    /// Create a ring holding `capacity` frames, at least two.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            frames: (0..capacity).map(|_| None).collect(),
            write_pos: 0,
            count: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Remember a displayed frame.
    ///
    /// Returns the oldest frame when the ring was full; the caller owns it
    /// from then on and usually releases it to the store.
    pub fn push(&mut self, frame: SharedFrame) -> Option<SharedFrame> {
        let capacity = self.capacity();
        let evicted = self.frames[self.write_pos].replace(frame);
        self.write_pos = (self.write_pos + 1) % capacity;
        if evicted.is_none() {
            self.count += 1;
        }
        evicted
    }

    /// The frame shown last.
    #[must_use]
    pub fn newest(&self) -> Option<&SharedFrame> {
        self.nth_newest(0)
    }

    /// The frame shown before the newest one.
    #[must_use]
    pub fn previous(&self) -> Option<&SharedFrame> {
        self.nth_newest(1)
    }

    fn nth_newest(&self, n: usize) -> Option<&SharedFrame> {
        if n >= self.count {
            return None;
        }
        let capacity = self.capacity();
        let idx = (self.write_pos + capacity - 1 - n) % capacity;
        self.frames[idx].as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Take every frame out of the ring, oldest first.
    pub fn drain(&mut self) -> Vec<SharedFrame> {
        let capacity = self.capacity();
        let start = (self.write_pos + capacity - self.count) % capacity;
        let drained = (0..capacity)
            .filter_map(|i| self.frames[(start + i) % capacity].take())
            .collect();
        self.write_pos = 0;
        self.count = 0;
        drained
    }
}

impl Default for RecentFrames {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(frame: &SharedFrame) -> u64 {
        lock_frame(frame).id()
    }

    #[test]
    fn test_update_format_keeps_buffers() {
        let store = FrameStore::default();
        let frame = store.alloc_frame();

        let change = store.update_format(&frame, 720, 480, PixelFormat::Planar420, FrameFlags::BOTH_FIELDS);
        assert_eq!(change, FormatChange::Reallocated);
        let ptr = lock_frame(&frame).planes()[0].data().as_ptr();

        let change = store.update_format(&frame, 720, 480, PixelFormat::Planar420, FrameFlags::TOP_FIELD);
        assert_eq!(change, FormatChange::Unchanged);
        let guard = lock_frame(&frame);
        assert_eq!(guard.planes()[0].data().as_ptr(), ptr);
        assert_eq!(guard.flags(), FrameFlags::TOP_FIELD);
    }

    #[test]
    fn test_update_format_reallocates_on_change() {
        let store = FrameStore::default();
        let frame = store.alloc_frame();

        store.update_format(&frame, 720, 480, PixelFormat::Planar420, FrameFlags::BOTH_FIELDS);
        let change = store.update_format(&frame, 720, 480, PixelFormat::Packed422, FrameFlags::BOTH_FIELDS);
        assert_eq!(change, FormatChange::Reallocated);

        let guard = lock_frame(&frame);
        assert_eq!(guard.planes().len(), 1);
        assert_eq!(guard.pitches(), [1440, 0, 0]);
        drop(guard);

        let change = store.update_format(
            &frame,
            720,
            480,
            PixelFormat::Planar420,
            FrameFlags::BOTH_FIELDS | FrameFlags::CHROMA_422,
        );
        assert_eq!(change, FormatChange::Reallocated);
        assert_eq!(lock_frame(&frame).planes()[1].rows(), 480);
        assert_eq!(store.stats().reallocations, 3);
    }

    #[test]
    fn test_empty_format_leaves_frame_unusable() {
        let store = FrameStore::default();
        let frame = store.alloc_frame();

        store.update_format(&frame, 64, 64, PixelFormat::Planar420, FrameFlags::BOTH_FIELDS);
        let change = store.update_format(&frame, 0, 64, PixelFormat::Planar420, FrameFlags::BOTH_FIELDS);

        assert_eq!(change, FormatChange::Failed);
        let guard = lock_frame(&frame);
        assert_eq!(guard.width(), 0);
        assert!(!guard.is_ready());
        assert_eq!(store.stats().allocation_failures, 1);
    }

    #[test]
    fn test_released_frames_are_reused() {
        let store = FrameStore::new(1);
        let first = store.alloc_frame();
        let second = store.alloc_frame();
        let first_id = id(&first);
        store.update_format(&first, 32, 32, PixelFormat::Packed422, FrameFlags::BOTTOM_FIELD);

        store.release(first);
        // pool is full, this one gets disposed
        store.release(second);
        assert_eq!(store.pooled(), 1);

        let again = store.alloc_frame();
        assert_eq!(id(&again), first_id);
        let guard = lock_frame(&again);
        assert!(guard.is_ready());
        assert_eq!(guard.flags(), FrameFlags::BOTH_FIELDS);

        let stats = store.stats();
        assert_eq!(stats.frames_allocated, 3);
        assert_eq!(stats.frames_reused, 1);
        assert_eq!(stats.frames_disposed, 1);
    }

    #[test]
    fn test_release_ignores_shared_frames() {
        let store = FrameStore::default();
        let frame = store.alloc_frame();

        store.release(frame.clone());
        assert_eq!(store.pooled(), 0);
        store.release(frame);
        assert_eq!(store.pooled(), 1);

        let first = store.alloc_frame();
        let second = store.alloc_frame();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(store.stats().frames_reused, 1);
    }

    #[test]
    fn test_unrepresentable_format_fails() {
        let store = FrameStore::default();
        let frame = store.alloc_frame();

        let change = store.update_format(&frame, u32::MAX, u32::MAX, PixelFormat::Packed422, FrameFlags::BOTH_FIELDS);
        assert_eq!(change, FormatChange::Failed);
        assert_eq!(lock_frame(&frame).width(), 0);
        assert_eq!(store.stats().allocation_failures, 1);
    }

    #[test]
    fn test_dispose_frees_buffers() {
        let store = FrameStore::default();
        let frame = store.alloc_frame();
        store.update_format(&frame, 16, 16, PixelFormat::Planar420, FrameFlags::BOTH_FIELDS);

        store.dispose(frame.clone());
        let guard = lock_frame(&frame);
        assert!(guard.planes().is_empty());
        assert_eq!(guard.width(), 0);
    }

    #[test]
    fn test_recent_frames_minimum_capacity() {
        assert_eq!(RecentFrames::new(0).capacity(), 2);
        assert_eq!(RecentFrames::new(5).capacity(), 5);
    }

    #[test]
    fn test_recent_frames_evicts_oldest() {
        let store = FrameStore::default();
        let mut recent = RecentFrames::new(2);
        let frames: Vec<_> = (0..3).map(|_| store.alloc_frame()).collect();

        assert!(recent.push(frames[0].clone()).is_none());
        assert!(recent.push(frames[1].clone()).is_none());
        assert_eq!(recent.len(), 2);

        let evicted = recent.push(frames[2].clone()).unwrap();
        assert_eq!(id(&evicted), id(&frames[0]));
        assert_eq!(recent.len(), 2);

        assert_eq!(id(recent.newest().unwrap()), id(&frames[2]));
        assert_eq!(id(recent.previous().unwrap()), id(&frames[1]));
    }

    #[test]
    fn test_recent_frames_drain_oldest_first() {
        let store = FrameStore::default();
        let mut recent = RecentFrames::new(3);
        let frames: Vec<_> = (0..4).map(|_| store.alloc_frame()).collect();
        for frame in &frames {
            recent.push(frame.clone());
        }

        let drained: Vec<_> = recent.drain().iter().map(id).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(recent.is_empty());
        assert!(recent.newest().is_none());
    }
}
