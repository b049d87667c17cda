//! Frame scheduling over a fixed ring of frame slots.
//!
//! Each call to [`FrameScheduler::run_frame`] performs one iteration:
//!
//! 1. wait on the active slot's completion fence
//! 2. acquire a presentable image; out-of-date rebuilds and ends the iteration
//!    without advancing
//! 3. recompute the spin transform and write it to the slot's uniform buffer
//! 4. reset the fence and submit the slot's pre-recorded commands
//! 5. present; a stale result (or a pending resize) rebuilds
//! 6. advance to the next slot
//!
//! Any backend error is returned unchanged; deciding whether it is fatal is
//! left to the caller.

use spinview_core::constants::FRAMES_IN_FLIGHT;
use spinview_core::{Extent, SpinTransform, TransformUniform};

/// Result of acquiring a presentable image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. Suboptimal images are still rendered to.
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed; nothing was acquired.
    OutOfDate,
}

/// Result of presenting an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented (or dropped) but the swapchain no longer matches the surface.
    Stale,
}

/// The operations the scheduler needs from a graphics backend.
///
/// `slot` is always in `0..FRAMES_IN_FLIGHT`.
pub trait FrameBackend {
    type Error;

    /// Block until the slot's previous submission has completed.
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Acquire the next image, signalling the slot's image-acquired semaphore.
    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome, Self::Error>;

    /// Current swapchain extent.
    fn extent(&self) -> Extent;

    /// Write the slot's uniform buffer.
    fn write_uniform(&mut self, slot: usize, uniform: &TransformUniform)
        -> Result<(), Self::Error>;

    /// Return the slot's completion fence to the unsignaled state.
    fn reset_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Submit the slot's commands for `image_index`.
    fn submit(&mut self, slot: usize, image_index: u32) -> Result<(), Self::Error>;

    /// Present `image_index` after the slot's render-finished semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome, Self::Error>;

    /// Tear down and rebuild all swapchain-dependent resources.
    fn rebuild(&mut self) -> Result<(), Self::Error>;
}

/// Where a slot is in its cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// What one iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Submitted and presented; the slot advanced.
    Presented { slot: usize, image_index: u32 },
    /// Submitted and presented, then rebuilt; the slot advanced.
    PresentedAndRebuilt { slot: usize, image_index: u32 },
    /// Acquire reported out-of-date: rebuilt, nothing submitted, slot kept.
    Skipped { slot: usize },
}

/// Running totals kept by the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub submissions: u64,
    pub presentations: u64,
    pub rebuilds: u64,
    pub skipped: u64,
}

/// Drives the per-frame protocol against a [`FrameBackend`].
pub struct FrameScheduler<B> {
    backend: B,
    slot: usize,
    states: [SlotState; FRAMES_IN_FLIGHT],
    transform: SpinTransform,
    stats: FrameStats,
    rebuild_requested: bool,
}

impl<B: FrameBackend> FrameScheduler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slot: 0,
            states: [SlotState::Idle; FRAMES_IN_FLIGHT],
            transform: SpinTransform::default(),
            stats: FrameStats::default(),
            rebuild_requested: false,
        }
    }

    /// Index of the slot the next iteration will use.
    pub const fn current_slot(&self) -> usize {
        self.slot
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    pub const fn transform(&self) -> &SpinTransform {
        &self.transform
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Mark presentation as stale (e.g. the window was resized). The rebuild
    /// happens after the next present.
    pub fn request_rebuild(&mut self) {
        self.rebuild_requested = true;
    }

    pub const fn rebuild_requested(&self) -> bool {
        self.rebuild_requested
    }

    /// Run one iteration of the frame protocol.
    pub fn run_frame(&mut self) -> Result<FrameOutcome, B::Error> {
        let slot = self.slot;

        self.states[slot] = SlotState::Acquiring;
        self.backend.wait_for_slot(slot)?;

        let image_index = match self.backend.acquire(slot)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    tracing::trace!("Slot {slot}: acquired suboptimal image {image_index}");
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                tracing::debug!("Slot {slot}: swapchain out of date on acquire");
                self.states[slot] = SlotState::Idle;
                self.rebuild()?;
                self.stats.skipped += 1;
                return Ok(FrameOutcome::Skipped { slot });
            }
        };

        self.states[slot] = SlotState::Recording;
        let uniform = self.transform.advance(self.backend.extent());
        self.backend.write_uniform(slot, &uniform)?;

        self.backend.reset_slot(slot)?;
        self.backend.submit(slot, image_index)?;
        self.states[slot] = SlotState::Submitted;
        self.stats.submissions += 1;

        self.states[slot] = SlotState::Presenting;
        let presented = self.backend.present(slot, image_index)?;
        self.stats.presentations += 1;

        let stale = presented == PresentOutcome::Stale || self.rebuild_requested;
        if stale {
            tracing::debug!("Slot {slot}: presentation stale after image {image_index}");
            self.rebuild()?;
        }

        self.states[slot] = SlotState::Idle;
        self.slot = (slot + 1) % FRAMES_IN_FLIGHT;
        tracing::trace!("Slot {slot}: presented image {image_index}");

        Ok(if stale {
            FrameOutcome::PresentedAndRebuilt { slot, image_index }
        } else {
            FrameOutcome::Presented { slot, image_index }
        })
    }

    fn rebuild(&mut self) -> Result<(), B::Error> {
        self.backend.rebuild()?;
        self.rebuild_requested = false;
        self.stats.rebuilds += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend that records slot states observed at each call.
    #[derive(Default)]
    struct Probe {
        seen: Vec<(&'static str, usize)>,
        present_stale: bool,
    }

    impl FrameBackend for Probe {
        type Error = ();

        fn wait_for_slot(&mut self, slot: usize) -> Result<(), ()> {
            self.seen.push(("wait", slot));
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome, ()> {
            self.seen.push(("acquire", slot));
            Ok(AcquireOutcome::Acquired {
                image_index: 0,
                suboptimal: false,
            })
        }

        fn extent(&self) -> Extent {
            Extent::new(800, 600)
        }

        fn write_uniform(&mut self, slot: usize, _: &TransformUniform) -> Result<(), ()> {
            self.seen.push(("uniform", slot));
            Ok(())
        }

        fn reset_slot(&mut self, slot: usize) -> Result<(), ()> {
            self.seen.push(("reset", slot));
            Ok(())
        }

        fn submit(&mut self, slot: usize, _: u32) -> Result<(), ()> {
            self.seen.push(("submit", slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, _: u32) -> Result<PresentOutcome, ()> {
            self.seen.push(("present", slot));
            Ok(if self.present_stale {
                PresentOutcome::Stale
            } else {
                PresentOutcome::Presented
            })
        }

        fn rebuild(&mut self) -> Result<(), ()> {
            self.seen.push(("rebuild", usize::MAX));
            Ok(())
        }
    }

    #[test]
    fn steps_run_in_protocol_order() {
        let mut scheduler = FrameScheduler::new(Probe::default());
        scheduler.run_frame().unwrap();

        let calls: Vec<&str> = scheduler.backend().seen.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            calls,
            ["wait", "acquire", "uniform", "reset", "submit", "present"]
        );
        assert_eq!(scheduler.slot_state(0), Some(SlotState::Idle));
        assert_eq!(scheduler.current_slot(), 1);
    }

    #[test]
    fn stale_present_rebuilds_then_advances() {
        let mut scheduler = FrameScheduler::new(Probe {
            present_stale: true,
            ..Default::default()
        });
        let outcome = scheduler.run_frame().unwrap();

        assert_eq!(
            outcome,
            FrameOutcome::PresentedAndRebuilt {
                slot: 0,
                image_index: 0
            }
        );
        assert_eq!(scheduler.backend().seen.last(), Some(&("rebuild", usize::MAX)));
        assert_eq!(scheduler.current_slot(), 1);
        assert_eq!(scheduler.stats().rebuilds, 1);
    }

    #[test]
    fn resize_request_rebuilds_once() {
        let mut scheduler = FrameScheduler::new(Probe::default());
        scheduler.request_rebuild();
        assert!(scheduler.rebuild_requested());

        scheduler.run_frame().unwrap();
        assert!(!scheduler.rebuild_requested());
        scheduler.run_frame().unwrap();

        assert_eq!(scheduler.stats().rebuilds, 1);
        assert_eq!(scheduler.stats().presentations, 2);
    }

    #[test]
    fn unknown_slot_has_no_state() {
        let scheduler = FrameScheduler::new(Probe::default());
        assert_eq!(scheduler.slot_state(FRAMES_IN_FLIGHT), None);
    }
}
