mod common;

use common::{Call, FakeDevice, Shared, config, count, last_position};
use vkpresent_platform::SurfaceEvent;
use vkpresent_renderer::{FrameState, Presenter};
use vkpresent_rhi::{AcquireOutcome, PresentOutcome, RhiError, vk};

fn setup(frames_in_flight: usize, image_count: usize) -> (Presenter<FakeDevice>, Shared) {
    let (device, state) = FakeDevice::new(frames_in_flight, image_count);
    let presenter = Presenter::new(device, config(frames_in_flight), (800, 600)).unwrap();
    (presenter, state)
}

/// Runs one tick; returns the slot and image used, or `None` if skipped.
fn tick(presenter: &mut Presenter<FakeDevice>) -> Option<(usize, u32)> {
    let (slot, image_index) = {
        let frame = presenter.begin_frame().unwrap()?;
        (frame.slot, frame.image_index)
    };
    presenter.submit_frame().unwrap();
    Some((slot, image_index))
}

fn assert_clean(state: &Shared) {
    let state = state.borrow();
    assert!(
        state.violations.is_empty(),
        "protocol violations: {:?}",
        state.violations
    );
}

fn slot_fences(state: &Shared) -> Vec<u32> {
    state
        .borrow()
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::CreateFence { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

#[test]
fn test_slots_cycle_and_first_frames_do_not_stall() {
    let (mut presenter, state) = setup(3, 3);

    let slots: Vec<usize> = (0..7).map(|_| tick(&mut presenter).unwrap().0).collect();

    assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(presenter.stats().frames_presented, 7);

    // Fresh fences start signaled, so no wait failed on the first lap.
    assert!(
        state
            .borrow()
            .calls
            .iter()
            .any(|c| matches!(c, Call::CreateFence { signaled: true, .. }))
    );
    assert_clean(&state);
}

#[test]
fn test_frames_in_flight_never_exceed_slot_count() {
    for n in 1..=4 {
        let (mut presenter, state) = setup(n, 3);
        assert_eq!(presenter.frames_in_flight(), n);

        for _ in 0..25 {
            assert!(tick(&mut presenter).is_some());
            assert!(presenter.in_flight() <= n);
        }

        assert_eq!(state.borrow().max_in_flight, n);
        assert_clean(&state);
    }
}

#[test]
fn test_marker_rearmed_after_wait_and_acquire_before_submit() {
    let (mut presenter, state) = setup(2, 3);
    for _ in 0..6 {
        tick(&mut presenter);
    }

    let calls = state.borrow().calls.clone();
    for (i, call) in calls.iter().enumerate() {
        let Call::Submit {
            fence: Some(fence), ..
        } = call
        else {
            continue;
        };
        let before = &calls[..i];

        let reset = last_position(before, |c| *c == Call::ResetFence(*fence)).unwrap();
        let acquire = last_position(before, |c| matches!(c, Call::Acquire { .. })).unwrap();
        let wait = last_position(before, |c| matches!(c, Call::WaitFences(ids) if ids.contains(fence)))
            .unwrap();

        assert!(wait < acquire, "wait must precede acquire");
        assert!(acquire < reset, "rearm must follow acquire");
        assert!(
            !before[reset + 1..]
                .iter()
                .any(|c| matches!(c, Call::Submit { fence: Some(f), .. } if f == fence)),
            "fence {fence} submitted twice without a reset"
        );
    }
    assert_clean(&state);
}

#[test]
fn test_present_waits_on_the_image_signal_raised_by_submit() {
    let (mut presenter, state) = setup(2, 3);
    for _ in 0..9 {
        tick(&mut presenter);
    }

    let calls = state.borrow().calls.clone();
    let mut signal_of_image = std::collections::HashMap::new();

    for (i, call) in calls.iter().enumerate() {
        let Call::Present {
            image_index, wait, ..
        } = call
        else {
            continue;
        };
        let submit = last_position(&calls[..i], |c| matches!(c, Call::Submit { .. })).unwrap();
        let Call::Submit { signal, .. } = &calls[submit] else {
            unreachable!()
        };
        assert_eq!(*signal, Some(*wait));

        // One signal per image, stable across frames.
        let previous = signal_of_image.insert(*image_index, *wait);
        assert!(previous.is_none() || previous == Some(*wait));
    }

    assert_eq!(signal_of_image.len(), 3);
    let mut distinct: Vec<u32> = signal_of_image.values().copied().collect();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), 3);
    assert_clean(&state);
}

#[test]
fn test_resize_mid_cycle_drains_and_resizes_signal_set() {
    let (device, state) = FakeDevice::new(3, 3);
    state.borrow_mut().image_counts.extend([3, 2]);
    let mut presenter = Presenter::new(device, config(3), (800, 600)).unwrap();

    assert_eq!(presenter.image_count(), 3);
    assert_eq!(presenter.signal_count(), 3);

    assert_eq!(tick(&mut presenter).unwrap().0, 0);
    assert_eq!(tick(&mut presenter).unwrap().0, 1);
    assert_eq!(presenter.in_flight(), 2);

    presenter
        .handle_event(SurfaceEvent::Resize {
            width: 1024,
            height: 768,
        })
        .unwrap();
    assert!(presenter.is_resize_pending());

    // The resize is serviced at the top of the next tick, restarting at slot 0.
    let (slot, _) = tick(&mut presenter).unwrap();
    assert_eq!(slot, 0);
    assert_eq!(presenter.current_slot(), 1);
    assert!(!presenter.is_resize_pending());
    assert_eq!(presenter.image_count(), 2);
    assert_eq!(presenter.signal_count(), 2);

    let calls = state.borrow().calls.clone();
    let builds: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::BuildSwapchain { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(builds.len(), 2);
    let rebuild = builds[1];

    let Call::BuildSwapchain {
        id: Some(first), ..
    } = calls[builds[0]]
    else {
        panic!("first build failed")
    };
    assert!(matches!(
        calls[rebuild],
        Call::BuildSwapchain { id: Some(_), previous: Some(p) } if p == first
    ));

    // Every slot fence is waited on, then the device idles, before the build.
    let fences = slot_fences(&state);
    let drain = last_position(&calls[..rebuild], |c| matches!(c, Call::WaitFences(ids) if ids.len() == 3))
        .unwrap();
    let Call::WaitFences(ids) = &calls[drain] else {
        unreachable!()
    };
    for fence in &fences {
        assert!(ids.contains(fence));
    }
    let idle = last_position(&calls[..rebuild], |c| *c == Call::WaitIdle).unwrap();
    assert!(drain < idle);

    // N acquire signals plus one signal per new image; the old set is gone.
    {
        let state = state.borrow();
        assert_eq!(state.semaphores.len(), 3 + 2);
        assert_eq!(state.live_swapchains.len(), 1);
    }

    let rest: Vec<(usize, u32)> = (0..3).map(|_| tick(&mut presenter).unwrap()).collect();
    assert_eq!(rest.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 2, 0]);
    assert!(rest.iter().all(|r| r.1 < 2));
    assert_clean(&state);
}

#[test]
fn test_consecutive_rebuilds_leak_nothing() {
    let (mut presenter, state) = setup(2, 3);
    tick(&mut presenter);

    assert!(presenter.rebuild().unwrap());
    assert!(presenter.rebuild().unwrap());

    assert_eq!(presenter.swapchain_generation(), 3);
    assert_eq!(presenter.stats().swapchain_rebuilds, 2);
    assert_eq!(presenter.signal_count(), 3);
    {
        let state = state.borrow();
        assert_eq!(state.semaphores.len(), 2 + 3);
        assert_eq!(state.live_swapchains.len(), 1);
        assert_eq!(state.retired_swapchains.len(), 2);
    }

    assert!(tick(&mut presenter).is_some());
    assert_clean(&state);
}

#[test]
fn test_minimized_ticks_touch_nothing() {
    let (mut presenter, state) = setup(2, 3);
    tick(&mut presenter);
    tick(&mut presenter);

    presenter.handle_event(SurfaceEvent::Minimize).unwrap();
    let calls_before = state.borrow().calls.len();

    for _ in 0..5 {
        assert!(presenter.begin_frame().unwrap().is_none());
    }

    assert_eq!(state.borrow().calls.len(), calls_before);
    assert_eq!(presenter.state(), FrameState::Minimized);
    assert_eq!(presenter.current_extent(), None);
    assert_eq!(presenter.stats().skipped_ticks, 5);

    presenter
        .handle_event(SurfaceEvent::Restore {
            width: 800,
            height: 600,
        })
        .unwrap();
    assert_eq!(presenter.state(), FrameState::Idle);
    assert!(tick(&mut presenter).is_some());
    assert_eq!(presenter.swapchain_generation(), 2);
    assert_eq!(
        presenter.current_extent(),
        Some(vk::Extent2D {
            width: 800,
            height: 600
        })
    );
    assert_clean(&state);
}

#[test]
fn test_zero_sized_resize_acts_as_minimize() {
    let (mut presenter, state) = setup(2, 3);
    tick(&mut presenter);

    presenter
        .handle_event(SurfaceEvent::Resize {
            width: 0,
            height: 0,
        })
        .unwrap();
    let calls_before = state.borrow().calls.len();

    assert!(presenter.begin_frame().unwrap().is_none());
    assert_eq!(state.borrow().calls.len(), calls_before);
    assert_eq!(presenter.state(), FrameState::Minimized);
}

#[test]
fn test_zero_extent_surface_defers_rebuild() {
    let (mut presenter, state) = setup(2, 3);
    tick(&mut presenter);

    state.borrow_mut().surface_extent = vk::Extent2D {
        width: 0,
        height: 0,
    };
    presenter.request_resize();

    assert!(presenter.begin_frame().unwrap().is_none());
    {
        let state = state.borrow();
        assert_eq!(
            state.calls.last(),
            Some(&Call::BuildSwapchain {
                id: None,
                previous: state.live_swapchains.first().copied(),
            })
        );
        assert_eq!(state.live_swapchains.len(), 1);
    }
    assert!(presenter.is_resize_pending());

    state.borrow_mut().surface_extent = vk::Extent2D {
        width: 640,
        height: 480,
    };
    assert!(tick(&mut presenter).is_some());
    assert!(!presenter.is_resize_pending());
    assert_eq!(presenter.swapchain_generation(), 2);
    assert_clean(&state);
}

#[test]
fn test_out_of_date_acquire_skips_tick_without_rearming() {
    let (mut presenter, state) = setup(2, 3);
    tick(&mut presenter);

    state
        .borrow_mut()
        .acquire_script
        .push_back(AcquireOutcome::OutOfDate);
    let resets = count(&state.borrow().calls, |c| matches!(c, Call::ResetFence(_)));

    assert!(presenter.begin_frame().unwrap().is_none());
    assert_eq!(presenter.state(), FrameState::Idle);
    assert!(presenter.is_resize_pending());
    {
        let state = state.borrow();
        assert_eq!(
            count(&state.calls, |c| matches!(c, Call::ResetFence(_))),
            resets
        );
        assert!(matches!(
            state.calls.last(),
            Some(Call::Acquire {
                outcome: AcquireOutcome::OutOfDate,
                ..
            })
        ));
    }

    assert_eq!(tick(&mut presenter).unwrap().0, 0);
    assert_eq!(presenter.swapchain_generation(), 2);
    assert_eq!(presenter.stats().skipped_ticks, 1);
    assert_clean(&state);
}

#[test]
fn test_suboptimal_acquire_presents_then_rebuilds() {
    let (mut presenter, state) = setup(2, 3);

    state
        .borrow_mut()
        .acquire_script
        .push_back(AcquireOutcome::Acquired {
            image_index: 0,
            suboptimal: true,
        });

    assert!(tick(&mut presenter).is_some());
    assert!(presenter.is_resize_pending());
    assert_eq!(presenter.stats().frames_presented, 1);
    assert!(matches!(
        state.borrow().calls.last(),
        Some(Call::Present { .. })
    ));

    assert!(tick(&mut presenter).is_some());
    assert_eq!(presenter.swapchain_generation(), 2);
    assert_clean(&state);
}

#[test]
fn test_out_of_date_present_rebuilds_next_tick() {
    let (mut presenter, state) = setup(2, 3);

    state
        .borrow_mut()
        .present_script
        .push_back(PresentOutcome::OutOfDate);

    assert!(tick(&mut presenter).is_some());
    assert!(presenter.is_resize_pending());
    assert_eq!(presenter.stats().frames_presented, 0);

    assert!(tick(&mut presenter).is_some());
    assert_eq!(presenter.swapchain_generation(), 2);
    assert_eq!(presenter.stats().frames_presented, 1);
    assert_clean(&state);
}

#[test]
fn test_suboptimal_present_counts_frame_then_rebuilds() {
    let (mut presenter, state) = setup(2, 3);

    state
        .borrow_mut()
        .present_script
        .push_back(PresentOutcome::Suboptimal);

    assert!(tick(&mut presenter).is_some());
    assert_eq!(presenter.stats().frames_presented, 1);
    assert!(presenter.is_resize_pending());

    let first = state.borrow().live_swapchains[0];
    assert!(tick(&mut presenter).is_some());
    assert_eq!(presenter.swapchain_generation(), 2);
    assert!(!presenter.is_resize_pending());

    let calls = state.borrow().calls.clone();
    let rebuild = last_position(&calls, |c| matches!(c, Call::BuildSwapchain { .. })).unwrap();
    assert!(matches!(
        calls[rebuild],
        Call::BuildSwapchain { id: Some(_), previous: Some(p) } if p == first
    ));
    assert_eq!(presenter.stats().frames_presented, 2);
    assert_clean(&state);
}

#[test]
fn test_failed_recording_leaves_frame_unsubmitted() {
    let (mut presenter, state) = setup(2, 3);

    let result = presenter.render_frame(|_| Err(RhiError::InvalidState("record".to_string())));
    assert!(matches!(result, Err(RhiError::InvalidState(_))));
    assert!(matches!(presenter.state(), FrameState::Recording { slot: 0, .. }));
    assert_eq!(
        count(&state.borrow().calls, |c| matches!(c, Call::Submit { .. })),
        0
    );

    assert!(matches!(
        presenter.begin_frame(),
        Err(RhiError::InvalidState(_))
    ));
    assert!(matches!(presenter.rebuild(), Err(RhiError::InvalidState(_))));
}

#[test]
fn test_frame_calls_out_of_order_are_rejected() {
    let (mut presenter, _state) = setup(2, 3);

    assert!(matches!(
        presenter.submit_frame(),
        Err(RhiError::InvalidState(_))
    ));

    assert!(presenter.begin_frame().unwrap().is_some());
    assert!(matches!(
        presenter.begin_frame(),
        Err(RhiError::InvalidState(_))
    ));
    assert!(matches!(presenter.rebuild(), Err(RhiError::InvalidState(_))));

    presenter.submit_frame().unwrap();
    assert_eq!(presenter.state(), FrameState::Idle);
}

#[test]
fn test_render_frame_runs_recorder_on_acquired_frame() {
    let (mut presenter, state) = setup(2, 3);

    let mut seen = None;
    let rendered = presenter
        .render_frame(|frame| {
            seen = Some((*frame.target, frame.extent));
            Ok(())
        })
        .unwrap();

    assert!(rendered);
    let (target, extent) = seen.unwrap();
    assert_eq!(target % 100, 0);
    assert_eq!(extent.width, 800);
    assert_clean(&state);
}

#[test]
fn test_hung_gpu_times_out() {
    let (mut presenter, state) = setup(2, 3);
    tick(&mut presenter);
    tick(&mut presenter);

    state.borrow_mut().hung = true;

    assert!(matches!(
        presenter.begin_frame(),
        Err(RhiError::Timeout(_))
    ));
}

#[test]
fn test_teardown_drains_then_releases_swapchain_before_slots() {
    let (mut presenter, state) = setup(3, 3);
    for _ in 0..4 {
        tick(&mut presenter);
    }
    let calls_before = state.borrow().calls.len();

    drop(presenter);

    let state = state.borrow();
    let teardown = &state.calls[calls_before..];

    assert!(matches!(teardown[0], Call::WaitFences(ref ids) if ids.len() == 3));
    assert_eq!(teardown[1], Call::WaitIdle);

    let last_swapchain = last_position(teardown, |c| matches!(c, Call::DestroySwapchain(_))).unwrap();
    let first_fence = teardown
        .iter()
        .position(|c| matches!(c, Call::DestroyFence(_)))
        .unwrap();
    assert!(last_swapchain < first_fence);

    assert!(state.semaphores.is_empty());
    assert!(state.fences.is_empty());
    assert!(state.live_swapchains.is_empty());
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_quit_stops_presenter() {
    let (mut presenter, state) = setup(2, 3);
    tick(&mut presenter);

    presenter.handle_event(SurfaceEvent::Quit).unwrap();
    assert_eq!(presenter.state(), FrameState::Stopped);
    assert_eq!(state.borrow().calls.last(), Some(&Call::WaitIdle));

    let calls_before = state.borrow().calls.len();
    assert!(presenter.begin_frame().unwrap().is_none());
    assert_eq!(state.borrow().calls.len(), calls_before);
}

#[test]
fn test_zero_slots_rejected() {
    let (device, _state) = FakeDevice::new(0, 3);
    assert!(matches!(
        Presenter::new(device, config(0), (800, 600)),
        Err(RhiError::InvalidState(_))
    ));
}

#[test]
fn test_starts_minimized_with_zero_drawable() {
    let (device, state) = FakeDevice::new(2, 3);
    let mut presenter = Presenter::new(device, config(2), (0, 0)).unwrap();

    assert_eq!(presenter.state(), FrameState::Minimized);
    assert_eq!(presenter.swapchain_generation(), 0);
    assert!(presenter.begin_frame().unwrap().is_none());

    presenter
        .handle_event(SurfaceEvent::Restore {
            width: 800,
            height: 600,
        })
        .unwrap();
    assert!(tick(&mut presenter).is_some());
    assert_eq!(presenter.swapchain_generation(), 1);
    assert_clean(&state);
}
