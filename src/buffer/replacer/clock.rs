//! CLOCK (second chance) replacement policy.
//!
//! The hand sweeps the frame array circularly. A warm frame loses its
//! reference bit and is passed over once; the first free or cold frame found
//! is the victim. Pinned frames are never touched.

use tracing::trace;

use crate::buffer::frame::{FrameDescriptor, FrameState};
use crate::common::{Error, FrameId, Result};

/// Clock hand over a fixed number of frames.
#[derive(Debug)]
pub struct ClockReplacer {
    hand: usize,
    pool_size: usize,
}

impl ClockReplacer {
    /// Hand starts on the last frame so the first sweep begins at frame 0.
    pub fn new(pool_size: usize) -> Self {
        Self {
            hand: pool_size.saturating_sub(1),
            pool_size,
        }
    }

    /// Frame the hand currently points at.
    #[inline]
    pub fn hand(&self) -> FrameId {
        FrameId::new(self.hand)
    }

    #[inline]
    fn advance(&mut self) {
        self.hand = (self.hand + 1) % self.pool_size;
    }

    /// Choose the frame to reuse.
    ///
    /// The returned frame is either free or an unpinned resident page whose
    /// reference bit was already clear; the caller writes it back if dirty
    /// and clears it. Reference bits of warm frames passed over are cleared.
    ///
    /// # Errors
    /// `Error::BufferExceeded` after `pool_size` consecutive pinned frames.
    /// That only happens when every frame is pinned, in which case the hand
    /// has made one full turn and no descriptor was changed.
    pub fn pick_victim(&mut self, descriptors: &mut [FrameDescriptor]) -> Result<FrameId> {
        debug_assert_eq!(descriptors.len(), self.pool_size);
        let mut pinned_run = 0;

        loop {
            self.advance();
            let descriptor = &mut descriptors[self.hand];

            match descriptor.state() {
                FrameState::Free | FrameState::Cold => return Ok(FrameId::new(self.hand)),
                FrameState::Pinned => {
                    pinned_run += 1;
                    if pinned_run >= self.pool_size {
                        return Err(Error::BufferExceeded);
                    }
                }
                FrameState::Warm => {
                    pinned_run = 0;
                    if let Some(resident) = descriptor.resident_mut() {
                        resident.ref_bit = false;
                    }
                    trace!(frame = self.hand, "second chance");
                }
            }
        }
    }
}
