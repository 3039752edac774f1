//! Race resolution and teardown across every exit path of a catch call.

#![allow(clippy::pedantic, clippy::nursery)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fault_catch::{
    catch_with, catch_with_finally, CatchConfig, CatchError, ChannelError, LoopbackPort,
    SafetyFlagCell, SafetyFlagStore, SafetyFlags,
};
use fault_core::{decode_for, Arch, FaultCategory, RawFault};
use log as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror::Error;

const POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation failed: {0}")]
struct OperationFailed(&'static str);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> CatchConfig {
    CatchConfig::default()
        .with_listener_timeout(POLL)
        .with_arch(Arch::X86_64)
        .with_worker_name("race-test-operation")
}

fn assert_torn_down(port: &LoopbackPort, store: &SafetyFlagCell) {
    assert_eq!(port.arm_count(), port.disarm_count());
    assert_eq!(port.armed_mask(), None);
    assert_eq!(store.load(), SafetyFlags::STRICT);
}

fn wait_for(flag: &AtomicBool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn no_fault_returns_operation_value() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);

    let result = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::BadInstruction],
        |_cancel| Ok::<_, OperationFailed>("ok"),
    );

    assert_eq!(result.expect("operation wins"), "ok");
    assert_eq!(port.arm_count(), 1);
    assert_torn_down(&port, &store);

    let receives = port.receive_count();
    thread::sleep(POLL * 4);
    assert_eq!(port.receive_count(), receives, "listener stopped receiving");
}

#[test]
fn session_flags_are_installed_while_racing() {
    init_logging();
    let port = LoopbackPort::new();
    let store = Arc::new(SafetyFlagCell::new(SafetyFlags::STRICT));
    let observed = {
        let store = Arc::clone(&store);
        catch_with(
            &port,
            &*Arc::clone(&store),
            &config(),
            [FaultCategory::BadAccess],
            move |_cancel| Ok::<_, OperationFailed>(store.load()),
        )
    };
    assert_eq!(observed.expect("operation wins"), SafetyFlags::RELAXED);
    assert_torn_down(&port, &store);
}

#[test]
fn injected_bad_instruction_fault_wins() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    let injector = port.injector();
    let raw = RawFault::with_codes(FaultCategory::BadInstruction, 1, 0x4000);

    let result = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::BadInstruction],
        move |cancel| {
            injector.raise(raw);
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok::<_, OperationFailed>("late")
        },
    );

    let expected = decode_for(
        Arch::X86_64,
        FaultCategory::BadInstruction,
        Some(1),
        Some(0x4000),
    )
    .expect("invalid opcode decodes");
    match result {
        Err(CatchError::Fault(decoded)) => assert_eq!(decoded, expected),
        other => panic!("expected decoded fault, got {other:?}"),
    }
    assert_torn_down(&port, &store);
}

#[test]
fn undecodable_fault_is_reported_raw() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    let injector = port.injector();
    let raw = RawFault::with_codes(FaultCategory::BadAccess, 0x7fff_ffff, 0);

    let result = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::BadAccess],
        move |cancel| {
            injector.raise(raw);
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok::<(), OperationFailed>(())
        },
    );

    match result {
        Err(CatchError::Unrecognized(reported)) => assert_eq!(reported, raw),
        other => panic!("expected unrecognized fault, got {other:?}"),
    }
    assert_torn_down(&port, &store);
}

#[test]
fn registration_failure_never_runs_the_operation() {
    init_logging();
    let port = LoopbackPort::new();
    port.fail_next_arm(ChannelError::Allocation("port space exhausted".into()));
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    let ran = Arc::new(AtomicBool::new(false));

    let result = {
        let ran = Arc::clone(&ran);
        catch_with(
            &port,
            &store,
            &config(),
            [FaultCategory::BadAccess],
            move |_cancel| {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, OperationFailed>(())
            },
        )
    };

    assert!(matches!(
        result,
        Err(CatchError::Registration(ChannelError::Allocation(_)))
    ));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(port.arm_count(), 0);
    assert_eq!(port.disarm_count(), 0);
    assert_torn_down(&port, &store);
}

#[test]
fn receive_failure_surfaces_as_registration_error() {
    init_logging();
    let port = LoopbackPort::new();
    port.fail_next_receive(ChannelError::Receive("port destroyed".into()));
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);

    let result = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::BadAccess],
        |cancel| {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok::<_, OperationFailed>(())
        },
    );

    assert!(matches!(
        result,
        Err(CatchError::Registration(ChannelError::Receive(_)))
    ));
    assert_eq!(port.disarm_count(), 1);
    assert_torn_down(&port, &store);
}

#[test]
fn operation_error_bypasses_the_decoder() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);

    let result = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::Arithmetic],
        |_cancel| Err::<(), _>(OperationFailed("bad input")),
    );

    match result {
        Err(CatchError::Operation(error)) => assert_eq!(error, OperationFailed("bad input")),
        other => panic!("expected operation error, got {other:?}"),
    }
    assert_torn_down(&port, &store);
}

#[test]
fn operation_panic_resumes_after_teardown() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
        catch_with(
            &port,
            &store,
            &config(),
            [FaultCategory::Arithmetic],
            |_cancel| -> Result<(), OperationFailed> { panic!("operation blew up") },
        )
    }));

    let payload = unwound.expect_err("panic propagates to the caller");
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"operation blew up"));
    assert_torn_down(&port, &store);
}

#[test]
fn faults_outside_the_requested_categories_are_ignored() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    let injector = port.injector();

    let result = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::Arithmetic],
        move |_cancel| {
            let delivered = injector.raise(RawFault::with_codes(FaultCategory::BadAccess, 1, 0));
            thread::sleep(POLL * 4);
            Ok::<_, OperationFailed>((delivered, "unaffected"))
        },
    );

    assert_eq!(result.expect("operation wins"), (false, "unaffected"));
    assert_eq!(port.pending(), 0);
    assert_torn_down(&port, &store);
}

#[test]
fn unrouted_fault_does_not_reach_the_next_session() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);

    let injector = port.injector();
    let first = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::Arithmetic],
        move |_cancel| {
            injector.raise(RawFault::with_codes(FaultCategory::BadAccess, 13, 0));
            Ok::<_, OperationFailed>("first ok")
        },
    );
    assert_eq!(first.expect("operation wins"), "first ok");
    assert_torn_down(&port, &store);

    let second = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::BadAccess],
        |_cancel| {
            thread::sleep(POLL * 4);
            Ok::<_, OperationFailed>("second ok")
        },
    );
    assert_eq!(second.expect("no fault carried over"), "second ok");
    assert_eq!(port.pending(), 0);
    assert_torn_down(&port, &store);
}

#[test]
fn fault_left_undelivered_is_discarded_at_teardown() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);

    let injector = port.injector();
    let first = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::Breakpoint],
        move |cancel| {
            injector.raise(RawFault::with_codes(FaultCategory::Breakpoint, 1, 0));
            injector.raise(RawFault::with_codes(FaultCategory::Breakpoint, 2, 0));
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok::<_, OperationFailed>(())
        },
    );
    assert!(first.expect_err("first fault wins").is_fault());
    assert_eq!(port.pending(), 0);

    let second = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::Breakpoint],
        |_cancel| {
            thread::sleep(POLL * 4);
            Ok::<_, OperationFailed>("clean")
        },
    );
    assert_eq!(second.expect("second fault was discarded"), "clean");
    assert_torn_down(&port, &store);
}

#[test]
fn operation_outliving_the_session_is_discarded() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    let injector = port.injector();
    let finished = Arc::new(AtomicBool::new(false));

    let result = {
        let finished = Arc::clone(&finished);
        catch_with(
            &port,
            &store,
            &config(),
            [FaultCategory::Breakpoint],
            move |_cancel| {
                injector.raise(RawFault::with_codes(FaultCategory::Breakpoint, 2, 0));
                thread::sleep(Duration::from_millis(50));
                finished.store(true, Ordering::SeqCst);
                Ok::<_, OperationFailed>("ignored")
            },
        )
    };

    assert!(matches!(result, Err(CatchError::Fault(_))));
    assert_torn_down(&port, &store);
    assert!(wait_for(&finished), "operation keeps running to completion");
}

#[rstest]
#[case::registration("registration")]
#[case::operation("operation")]
#[case::fault("fault")]
fn teardown_invariant_holds_on_every_path(#[case] path: &str) {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    if path == "registration" {
        port.fail_next_arm(ChannelError::Rejected("denied".into()));
    }
    let injector = port.injector();
    let raise = path == "fault";
    let value = path.len();

    let result = catch_with(
        &port,
        &store,
        &config(),
        [FaultCategory::Arithmetic],
        move |cancel| {
            if raise {
                injector.raise(RawFault::with_codes(FaultCategory::Arithmetic, 1, 0));
                while !cancel.is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            Ok::<_, OperationFailed>(value)
        },
    );

    match path {
        "registration" => assert!(matches!(result, Err(CatchError::Registration(_)))),
        "operation" => assert_eq!(result.expect("operation wins"), "operation".len()),
        _ => assert!(result.expect_err("fault wins").is_fault()),
    }
    assert_torn_down(&port, &store);
}

#[test]
fn sessions_on_one_port_run_back_to_back() {
    init_logging();
    let port = LoopbackPort::new();
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    for round in 0..3 {
        let result = catch_with(
            &port,
            &store,
            &config(),
            [FaultCategory::Software],
            move |_cancel| Ok::<_, OperationFailed>(round),
        );
        assert_eq!(result.expect("operation wins"), round);
    }
    assert_eq!(port.arm_count(), 3);
    assert_torn_down(&port, &store);
}

fn counting_finally(store: &Arc<SafetyFlagCell>) -> (Arc<AtomicUsize>, impl FnOnce()) {
    let runs = Arc::new(AtomicUsize::new(0));
    let finally = {
        let runs = Arc::clone(&runs);
        let store = Arc::clone(store);
        move || {
            assert_eq!(store.holders(), 0, "flags restored before finally");
            assert_eq!(store.load(), SafetyFlags::STRICT);
            runs.fetch_add(1, Ordering::SeqCst);
        }
    };
    (runs, finally)
}

#[rstest]
#[case::operation_ok("ok")]
#[case::operation_error("error")]
#[case::fault("fault")]
fn finally_runs_once_after_teardown(#[case] path: &str) {
    init_logging();
    let port = LoopbackPort::new();
    let store = Arc::new(SafetyFlagCell::new(SafetyFlags::STRICT));
    let (runs, finally) = counting_finally(&store);
    let injector = port.injector();
    let outcome = path.to_string();

    let result = catch_with_finally(
        &port,
        &*store,
        &config(),
        [FaultCategory::Arithmetic],
        move |cancel| match outcome.as_str() {
            "ok" => Ok(7),
            "error" => Err(OperationFailed("refused")),
            _ => {
                injector.raise(RawFault::with_codes(FaultCategory::Arithmetic, 1, 0));
                while !cancel.is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(0)
            }
        },
        finally,
    );

    match path {
        "ok" => assert_eq!(result.expect("operation wins"), 7),
        "error" => assert!(matches!(result, Err(CatchError::Operation(_)))),
        _ => assert!(result.expect_err("fault wins").is_fault()),
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_torn_down(&port, &store);
}

#[test]
fn finally_sees_the_port_released() {
    init_logging();
    let port = Arc::new(LoopbackPort::new());
    let store = SafetyFlagCell::new(SafetyFlags::STRICT);
    let seen = Arc::new(AtomicBool::new(false));

    let result = {
        let observed = Arc::clone(&port);
        let seen = Arc::clone(&seen);
        catch_with_finally(
            &*port,
            &store,
            &config(),
            [FaultCategory::Software],
            |_cancel| Ok::<_, OperationFailed>(()),
            move || {
                let released = observed.armed_mask().is_none()
                    && observed.arm_count() == observed.disarm_count();
                seen.store(released, Ordering::SeqCst);
            },
        )
    };

    result.expect("operation wins");
    assert!(seen.load(Ordering::SeqCst));
}

#[test]
fn finally_runs_before_a_panic_resumes() {
    init_logging();
    let port = LoopbackPort::new();
    let store = Arc::new(SafetyFlagCell::new(SafetyFlags::STRICT));
    let (runs, finally) = counting_finally(&store);

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
        catch_with_finally(
            &port,
            &*store,
            &config(),
            [FaultCategory::Arithmetic],
            |_cancel| -> Result<(), OperationFailed> { panic!("operation blew up") },
            finally,
        )
    }));

    assert!(unwound.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_torn_down(&port, &store);
}

#[test]
fn finally_runs_when_the_listener_fails() {
    init_logging();
    let port = LoopbackPort::new();
    port.fail_next_receive(ChannelError::Receive("port destroyed".into()));
    let store = Arc::new(SafetyFlagCell::new(SafetyFlags::STRICT));
    let (runs, finally) = counting_finally(&store);

    let result = catch_with_finally(
        &port,
        &*store,
        &config(),
        [FaultCategory::BadAccess],
        |cancel| {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok::<_, OperationFailed>(())
        },
        finally,
    );

    assert!(matches!(result, Err(CatchError::Registration(_))));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_torn_down(&port, &store);
}

#[test]
fn finally_is_skipped_when_arming_fails() {
    init_logging();
    let port = LoopbackPort::new();
    port.fail_next_arm(ChannelError::Allocation("port space exhausted".into()));
    let store = Arc::new(SafetyFlagCell::new(SafetyFlags::STRICT));
    let (runs, finally) = counting_finally(&store);

    let result = catch_with_finally(
        &port,
        &*store,
        &config(),
        [FaultCategory::BadAccess],
        |_cancel| Ok::<_, OperationFailed>(()),
        finally,
    );

    assert!(matches!(result, Err(CatchError::Registration(_))));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_torn_down(&port, &store);
}

#[test]
fn overlapping_sessions_restore_flags_when_the_last_one_ends() {
    init_logging();
    let store = Arc::new(SafetyFlagCell::new(SafetyFlags::STRICT));
    let first_port = LoopbackPort::new();
    let second_port = LoopbackPort::new();
    let first_running = Arc::new(AtomicBool::new(false));
    let second_running = Arc::new(AtomicBool::new(false));
    let first_done = Arc::new(AtomicBool::new(false));

    let (after_first, inside_second) = thread::scope(|scope| {
        let first = scope.spawn(|| {
            let first_running = Arc::clone(&first_running);
            let second_running = Arc::clone(&second_running);
            let result = catch_with(
                &first_port,
                &*store,
                &config(),
                [FaultCategory::BadAccess],
                move |_cancel| {
                    first_running.store(true, Ordering::SeqCst);
                    Ok::<_, OperationFailed>(wait_for(&second_running))
                },
            );
            assert!(result.expect("first operation wins"));
            let after_first = (store.load(), store.holders());
            first_done.store(true, Ordering::SeqCst);
            after_first
        });

        let second = scope.spawn(|| {
            assert!(wait_for(&first_running));
            let second_running = Arc::clone(&second_running);
            let first_done = Arc::clone(&first_done);
            let observer = Arc::clone(&store);
            catch_with(
                &second_port,
                &*store,
                &config(),
                [FaultCategory::Arithmetic],
                move |_cancel| {
                    second_running.store(true, Ordering::SeqCst);
                    assert!(wait_for(&first_done));
                    Ok::<_, OperationFailed>(observer.load())
                },
            )
            .expect("second operation wins")
        });

        (
            first.join().expect("first caller"),
            second.join().expect("second caller"),
        )
    });

    assert_eq!(after_first, (SafetyFlags::RELAXED, 1));
    assert_eq!(inside_second, SafetyFlags::RELAXED);
    assert_torn_down(&first_port, &store);
    assert_torn_down(&second_port, &store);
}
