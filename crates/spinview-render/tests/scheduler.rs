//! Frame scheduler behavior against a scripted backend.

use std::collections::VecDeque;

use approx::assert_relative_eq;
use glam::Vec4;
use spinview_core::constants::FRAMES_IN_FLIGHT;
use spinview_core::{Extent, TransformUniform};
use spinview_render::{
    AcquireOutcome, FrameBackend, FrameOutcome, FrameScheduler, PresentOutcome, SlotState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Call {
    Wait(usize),
    Acquire(usize),
    Write(usize),
    Reset(usize),
    Submit(usize, u32),
    Present(usize, u32),
    Rebuild,
}

#[derive(Debug, PartialEq, Eq)]
struct DeviceLost;

/// Hands out swapchain images round-robin and replays scripted acquire and
/// present results.
struct MockBackend {
    extent: Extent,
    image_count: u32,
    next_image: u32,
    calls: Vec<Call>,
    uniforms: Vec<TransformUniform>,
    acquire_script: VecDeque<Option<AcquireOutcome>>,
    present_script: VecDeque<PresentOutcome>,
    fail_submit: bool,
}

impl MockBackend {
    fn new(extent: Extent) -> Self {
        Self {
            extent,
            image_count: 3,
            next_image: 0,
            calls: Vec::new(),
            uniforms: Vec::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fail_submit: false,
        }
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn submitted_slots(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Submit(slot, _) => Some(*slot),
                _ => None,
            })
            .collect()
    }
}

impl FrameBackend for MockBackend {
    type Error = DeviceLost;

    fn wait_for_slot(&mut self, slot: usize) -> Result<(), DeviceLost> {
        self.calls.push(Call::Wait(slot));
        Ok(())
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome, DeviceLost> {
        self.calls.push(Call::Acquire(slot));
        if let Some(Some(outcome)) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn write_uniform(&mut self, slot: usize, uniform: &TransformUniform) -> Result<(), DeviceLost> {
        self.calls.push(Call::Write(slot));
        self.uniforms.push(*uniform);
        Ok(())
    }

    fn reset_slot(&mut self, slot: usize) -> Result<(), DeviceLost> {
        self.calls.push(Call::Reset(slot));
        Ok(())
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<(), DeviceLost> {
        if self.fail_submit {
            return Err(DeviceLost);
        }
        self.calls.push(Call::Submit(slot, image_index));
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome, DeviceLost> {
        self.calls.push(Call::Present(slot, image_index));
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn rebuild(&mut self) -> Result<(), DeviceLost> {
        self.calls.push(Call::Rebuild);
        self.next_image = 0;
        Ok(())
    }
}

fn run(scheduler: &mut FrameScheduler<MockBackend>, iterations: usize) -> Vec<FrameOutcome> {
    (0..iterations)
        .map(|_| scheduler.run_frame().unwrap())
        .collect()
}

#[test]
fn ten_frames_submit_and_present_ten_times() {
    let mut scheduler = FrameScheduler::new(MockBackend::new(Extent::new(800, 600)));
    run(&mut scheduler, 10);

    let backend = scheduler.backend();
    assert_eq!(backend.count(|c| matches!(c, Call::Submit(..))), 10);
    assert_eq!(backend.count(|c| matches!(c, Call::Present(..))), 10);
    assert_eq!(backend.count(|c| matches!(c, Call::Rebuild)), 0);
    assert_eq!(scheduler.current_slot(), 10 % FRAMES_IN_FLIGHT);

    let stats = scheduler.stats();
    assert_eq!(stats.submissions, 10);
    assert_eq!(stats.presentations, 10);
    assert_eq!(stats.skipped, 0);
}

#[test]
fn slots_cycle_in_order() {
    let mut scheduler = FrameScheduler::new(MockBackend::new(Extent::new(800, 600)));
    run(&mut scheduler, 7);

    assert_eq!(
        scheduler.backend().submitted_slots(),
        vec![0, 1, 2, 0, 1, 2, 0]
    );
}

#[test]
fn each_iteration_follows_the_protocol() {
    let mut scheduler = FrameScheduler::new(MockBackend::new(Extent::new(800, 600)));
    run(&mut scheduler, 2);

    assert_eq!(
        scheduler.backend().calls,
        vec![
            Call::Wait(0),
            Call::Acquire(0),
            Call::Write(0),
            Call::Reset(0),
            Call::Submit(0, 0),
            Call::Present(0, 0),
            Call::Wait(1),
            Call::Acquire(1),
            Call::Write(1),
            Call::Reset(1),
            Call::Submit(1, 1),
            Call::Present(1, 1),
        ]
    );
}

#[test]
fn out_of_date_acquire_skips_the_frame_and_keeps_the_slot() {
    let mut backend = MockBackend::new(Extent::new(800, 600));
    backend.acquire_script = [None, None, None, None, Some(AcquireOutcome::OutOfDate)]
        .into_iter()
        .collect();
    let mut scheduler = FrameScheduler::new(backend);

    let outcomes = run(&mut scheduler, 4);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, FrameOutcome::Presented { .. })));
    let slot_before = scheduler.current_slot();
    let angle_before = scheduler.transform().angle_degrees();

    let outcome = scheduler.run_frame().unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped { slot: slot_before });
    assert_eq!(scheduler.current_slot(), slot_before);
    assert_relative_eq!(scheduler.transform().angle_degrees(), angle_before);

    let backend = scheduler.backend();
    assert_eq!(backend.count(|c| matches!(c, Call::Submit(..))), 4);
    assert_eq!(backend.count(|c| matches!(c, Call::Present(..))), 4);
    assert_eq!(backend.count(|c| matches!(c, Call::Rebuild)), 1);
    assert_eq!(backend.count(|c| matches!(c, Call::Reset(..))), 4);
    assert_eq!(scheduler.stats().skipped, 1);

    // The retried iteration uses the same slot and the fresh swapchain.
    let outcome = scheduler.run_frame().unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Presented {
            slot: slot_before,
            image_index: 0
        }
    );
}

#[test]
fn stale_present_rebuilds_and_still_advances() {
    let mut backend = MockBackend::new(Extent::new(800, 600));
    backend.present_script = [PresentOutcome::Stale].into_iter().collect();
    let mut scheduler = FrameScheduler::new(backend);

    let outcome = scheduler.run_frame().unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::PresentedAndRebuilt {
            slot: 0,
            image_index: 0
        }
    );
    assert_eq!(scheduler.current_slot(), 1);
    assert_eq!(
        scheduler.backend().calls.last().copied(),
        Some(Call::Rebuild)
    );
}

#[test]
fn resize_request_is_served_after_present() {
    let mut scheduler = FrameScheduler::new(MockBackend::new(Extent::new(800, 600)));
    scheduler.request_rebuild();
    assert!(scheduler.rebuild_requested());

    run(&mut scheduler, 2);

    let calls = &scheduler.backend().calls;
    let rebuild_at = calls.iter().position(|c| *c == Call::Rebuild).unwrap();
    assert_eq!(calls[rebuild_at - 1], Call::Present(0, 0));
    assert_eq!(calls.iter().filter(|c| **c == Call::Rebuild).count(), 1);
    assert!(!scheduler.rebuild_requested());
}

#[test]
fn angle_counts_presented_frames() {
    let mut scheduler = FrameScheduler::new(MockBackend::new(Extent::new(800, 600)));
    run(&mut scheduler, 45);
    assert_relative_eq!(scheduler.transform().angle_degrees(), 45.0);
}

#[test]
fn uniform_scales_y_by_aspect_ratio() {
    let mut scheduler = FrameScheduler::new(MockBackend::new(Extent::new(800, 600)));
    run(&mut scheduler, 90);

    // After a quarter turn the X axis lands on Y, stretched by width / height.
    let last = scheduler.backend().uniforms.last().copied().unwrap();
    let x_axis = last.matrix() * Vec4::new(1.0, 0.0, 0.0, 1.0);
    assert_relative_eq!(x_axis.x, 0.0, epsilon = 1e-5);
    assert_relative_eq!(x_axis.y, 800.0 / 600.0, epsilon = 1e-5);
    assert_relative_eq!(x_axis.w, 1.0);

    let first = scheduler.backend().uniforms[0];
    let y_axis = first.matrix() * Vec4::new(0.0, 1.0, 0.0, 0.0);
    assert_relative_eq!(y_axis.y, 1.0_f32.to_radians().cos() * 800.0 / 600.0, epsilon = 1e-5);
}

#[test]
fn backend_errors_propagate_and_leave_the_slot() {
    let mut backend = MockBackend::new(Extent::new(800, 600));
    backend.fail_submit = true;
    let mut scheduler = FrameScheduler::new(backend);

    assert_eq!(scheduler.run_frame(), Err(DeviceLost));
    assert_eq!(scheduler.current_slot(), 0);
    assert_eq!(scheduler.stats().submissions, 0);
    assert_eq!(scheduler.slot_state(0), Some(SlotState::Recording));
}
