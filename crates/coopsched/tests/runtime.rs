//! End-to-end scheduling through the public API
//!
//! Each test runs on its own OS thread, so each gets its own processor.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use coopsched::{
    current_id, current_name, current_stack_bounds, park, remote_unparker, spawn,
    spawn_with_priority, unpark, yield_now, AddressSpace, Builder, Priority, Runtime,
    RuntimeConfig, SchedError,
};

type Trace = Rc<RefCell<Vec<String>>>;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::new()).unwrap()
}

fn record(trace: &Trace, event: impl Into<String>) {
    trace.borrow_mut().push(event.into());
}

#[test]
fn test_priority_order_with_fifo_ties() {
    let mut rt = runtime();
    let trace: Trace = Default::default();

    rt.block_on(|| {
        for (name, priority) in [("A", 5), ("B", 1), ("C", 5)] {
            let t = trace.clone();
            spawn_with_priority(move || record(&t, name), Priority::new(priority)).unwrap();
        }
    })
    .unwrap();

    assert_eq!(*trace.borrow(), vec!["B", "A", "C"]);
}

#[test]
fn test_yield_interleaves_equal_priorities() {
    let mut rt = runtime();
    let trace: Trace = Default::default();

    rt.block_on(|| {
        for name in ["A", "B"] {
            let t = trace.clone();
            spawn_with_priority(
                move || {
                    for i in 0..2 {
                        record(&t, format!("{}{}", name, i));
                        yield_now();
                    }
                },
                Priority::new(5),
            )
            .unwrap();
        }
    })
    .unwrap();

    assert_eq!(*trace.borrow(), vec!["A0", "B0", "A1", "B1"]);
}

#[test]
fn test_yield_alone_keeps_running() {
    let _rt = runtime();
    assert!(!yield_now());
    assert_eq!(current_name().as_deref(), Some("main"));
}

#[test]
fn test_park_and_unpark() {
    let mut rt = runtime();
    let trace: Trace = Default::default();

    rt.block_on(|| {
        let t = trace.clone();
        let sleeper = Builder::new()
            .name("sleeper")
            .priority(Priority::new(5))
            .spawn(move || {
                record(&t, "sleeper parks");
                park().unwrap();
                record(&t, "sleeper resumed");
            })
            .unwrap();

        let t = trace.clone();
        spawn_with_priority(
            move || {
                record(&t, "waker runs");
                assert!(unpark(sleeper).unwrap());
                assert!(!unpark(sleeper).unwrap(), "already ready");
            },
            Priority::new(5),
        )
        .unwrap();
    })
    .unwrap();

    assert_eq!(
        *trace.borrow(),
        vec!["sleeper parks", "waker runs", "sleeper resumed"]
    );
}

#[test]
fn test_unpark_before_park_is_remembered() {
    let _rt = runtime();
    let me = current_id().unwrap();
    assert!(!unpark(me).unwrap());
    // Token consumed: returns without blocking
    park().unwrap();
}

#[test]
fn test_stats_after_run() {
    let mut rt = runtime();

    rt.block_on(|| {
        for _ in 0..3 {
            spawn(|| {}).unwrap();
        }
    })
    .unwrap();

    let stats = rt.stats().unwrap();
    assert_eq!(stats.total_threads, 4);
    assert_eq!(stats.reclaimed, 3);
    assert_eq!(stats.dispatches, 4);

    let stats = rt.shutdown().unwrap();
    assert_eq!(stats.reclaimed, 3);
}

#[test]
fn test_thread_names_and_ids() {
    let mut rt = runtime();
    let seen: Rc<RefCell<Vec<(String, u32)>>> = Default::default();
    let main = rt.main_thread();

    rt.block_on(|| {
        let s = seen.clone();
        let id = Builder::new()
            .name("worker")
            .spawn(move || {
                let id = current_id().unwrap();
                s.borrow_mut().push((current_name().unwrap(), id.as_u32()));
            })
            .unwrap();
        assert_ne!(id, main);
    })
    .unwrap();

    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0].0, "worker");
    assert_eq!(current_id(), Some(main));
}

#[test]
fn test_remote_wake_from_other_os_thread() {
    let mut rt = runtime();
    let woke = Rc::new(Cell::new(false));

    rt.block_on(|| {
        let w = woke.clone();
        let id = spawn(move || {
            park().unwrap();
            w.set(true);
        })
        .unwrap();

        let remote = remote_unparker().unwrap();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.unpark(id);
        });
    })
    .unwrap();

    assert!(woke.get());
}

#[test]
fn test_deadlock_reported_by_block_on() {
    let mut rt = runtime();

    let result = rt.block_on(|| {
        spawn(|| {
            let _ = park();
        })
        .unwrap();
    });

    assert_eq!(result.err(), Some(SchedError::Deadlock { blocked: 1 }));
}

#[test]
fn test_deadlock_reported_to_parked_main() {
    let _rt = runtime();

    spawn(|| {
        let _ = park();
    })
    .unwrap();

    // Both threads end up parked with nothing left to wake them
    let result = park();
    assert!(matches!(result, Err(SchedError::Deadlock { blocked: 2 })));
    assert_eq!(current_name().as_deref(), Some("main"));
}

#[test]
fn test_panicking_thread_is_reclaimed() {
    let mut rt = runtime();
    let after = Rc::new(Cell::new(false));

    rt.block_on(|| {
        spawn(|| panic!("boom")).unwrap();
        let a = after.clone();
        spawn(move || a.set(true)).unwrap();
    })
    .unwrap();

    assert!(after.get());
    assert_eq!(rt.stats().unwrap().reclaimed, 2);
}

#[test]
fn test_double_init_rejected() {
    let _rt = runtime();
    let second = Runtime::new(RuntimeConfig::new());
    assert!(matches!(second, Err(SchedError::AlreadyInitialized)));
}

#[test]
fn test_invalid_config_rejected() {
    let result = Runtime::new(RuntimeConfig::new().stack_size(1024));
    assert!(matches!(result, Err(SchedError::Config(_))));
    // Nothing was installed
    assert!(Runtime::new(RuntimeConfig::new()).is_ok());
}

#[test]
fn test_spawn_without_runtime_fails() {
    assert_eq!(spawn(|| {}).err(), Some(SchedError::NotInitialized));
    assert_eq!(current_id(), None);
}

struct CountingSpace {
    saves: Rc<Cell<u32>>,
    restores: Rc<Cell<u32>>,
}

impl AddressSpace for CountingSpace {
    fn save_registers(&mut self) {}

    fn save_context(&mut self) {
        self.saves.set(self.saves.get() + 1);
    }

    fn restore_registers(&mut self) {}

    fn restore_context(&mut self) {
        self.restores.set(self.restores.get() + 1);
    }
}

#[test]
fn test_address_space_follows_switches() {
    let mut rt = runtime();
    let saves = Rc::new(Cell::new(0));
    let restores = Rc::new(Cell::new(0));

    rt.block_on(|| {
        Builder::new()
            .address_space(CountingSpace {
                saves: saves.clone(),
                restores: restores.clone(),
            })
            .spawn(|| {
                yield_now();
            })
            .unwrap();
    })
    .unwrap();

    // In on first run, out and in around the yield, out on exit
    assert_eq!(restores.get(), 2);
    assert_eq!(saves.get(), 2);
}

#[test]
fn test_spawn_from_spawned_thread() {
    let mut rt = runtime();
    let trace: Trace = Default::default();

    rt.block_on(|| {
        let t = trace.clone();
        spawn(move || {
            record(&t, "parent");
            let t2 = t.clone();
            spawn(move || record(&t2, "child")).unwrap();
            yield_now();
            record(&t, "parent again");
        })
        .unwrap();
    })
    .unwrap();

    assert_eq!(*trace.borrow(), vec!["parent", "child", "parent again"]);
}

#[test]
fn test_stale_id_does_not_wake_slot_successor() {
    let mut rt = runtime();
    let gone = rt.block_on(|| spawn(|| {}).unwrap()).unwrap();
    let trace: Trace = Default::default();

    rt.block_on(|| {
        let t = trace.clone();
        let sleeper = spawn(move || {
            record(&t, "sleeper parks");
            park().unwrap();
            record(&t, "sleeper resumed");
        })
        .unwrap();
        assert_eq!(sleeper.as_usize(), gone.as_usize());
        assert_ne!(sleeper, gone);

        // Must neither wake the sleeper nor leave it a token
        assert!(!unpark(gone).unwrap());

        let t = trace.clone();
        spawn(move || {
            record(&t, "waker runs");
            assert!(unpark(sleeper).unwrap());
        })
        .unwrap();
    })
    .unwrap();

    assert_eq!(
        *trace.borrow(),
        vec!["sleeper parks", "waker runs", "sleeper resumed"]
    );
}

#[test]
fn test_stack_bounds_only_for_spawned_threads() {
    let mut rt = runtime();
    assert_eq!(current_stack_bounds(), None);
    let seen = Rc::new(Cell::new(None));

    rt.block_on(|| {
        let s = seen.clone();
        Builder::new()
            .stack_size(64 * 1024)
            .spawn(move || s.set(current_stack_bounds()))
            .unwrap();
    })
    .unwrap();

    let (bottom, top) = seen.get().unwrap();
    assert!(bottom < top);
    assert!(top - bottom >= 60 * 1024);
}

#[cfg(unix)]
#[test]
fn test_overflowed_stack_aborts_on_switch() {
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    const CHILD_ENV: &str = "COOPSCHED_OVERFLOW_CHILD";

    if std::env::var_os(CHILD_ENV).is_some() {
        let mut rt = runtime();
        rt.block_on(|| {
            spawn(|| {
                let (bottom, _) = current_stack_bounds().unwrap();
                // Clobber the fencepost as a runaway frame would
                unsafe { (bottom as *mut u64).write_volatile(0) };
                yield_now();
                unreachable!("switched away from a corrupt stack");
            })
            .unwrap();
            spawn(|| {}).unwrap();
        })
        .unwrap();
        unreachable!("runtime survived a stack overflow");
    }

    let output = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "test_overflowed_stack_aborts_on_switch", "--nocapture"])
        .env(CHILD_ENV, "1")
        .env("COOP_LOG_LEVEL", "error")
        .output()
        .unwrap();

    assert_eq!(output.status.signal(), Some(libc::SIGABRT), "{:?}", output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("overflow"), "{}", stderr);
}
