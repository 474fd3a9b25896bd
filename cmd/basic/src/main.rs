//! Basic coopsched example
//!
//! Spawns threads at several priorities, shows them taking turns, parks
//! one until a plain OS thread wakes it, then prints the statistics.
//!
//! # Environment Variables
//!
//! - `COOP_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `COOP_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `COOP_REPORT_STATS=1` - Also print statistics when the runtime shuts down

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use coopsched::{
    current_name, dump_ready, park, remote_unparker, spawn_with_priority, yield_now, Builder, Priority,
    Runtime, RuntimeConfig, SchedResult,
};
use coopsched::{kdebug, kinfo};

// COOP_LOG_LEVEL=debug COOP_FLUSH_EPRINT=1 cargo run -p coopsched-basic
fn main() -> SchedResult<()> {
    println!("=== coopsched Basic Example ===\n");

    let config = RuntimeConfig::from_env();
    config.print();
    let mut runtime = Runtime::new(config)?;

    let completed = Rc::new(Cell::new(0usize));

    runtime.block_on(|| -> SchedResult<()> {
        kinfo!("Spawning threads...");

        for i in 1..=3 {
            let c = completed.clone();
            let id = Builder::new()
                .name(format!("worker-{}", i))
                .priority(Priority::new(5))
                .spawn(move || {
                    for j in 0..3 {
                        kdebug!("[{}] Iteration {}", current_name().unwrap_or_default(), j);
                        yield_now();
                    }
                    c.set(c.get() + 1);
                })?;
            println!("Spawned worker {} (ID={})", i, id);
        }

        let c = completed.clone();
        let urgent = spawn_with_priority(
            move || {
                kdebug!("[urgent] Started");
                yield_now();
                kdebug!("[urgent] Finished");
                c.set(c.get() + 1);
            },
            Priority::new(0),
        )?;
        println!("Spawned urgent thread (ID={})", urgent);

        let c = completed.clone();
        let sleeper = Builder::new().name("sleeper").spawn(move || {
            kdebug!("[sleeper] Parking until woken from another OS thread");
            if let Err(e) = park() {
                println!("sleeper: {}", e);
            }
            kdebug!("[sleeper] Woken");
            c.set(c.get() + 1);
        })?;

        let remote = remote_unparker()?;
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.unpark(sleeper);
        });

        println!("\nReady queue before the main thread yields:");
        dump_ready()?;
        Ok(())
    })??;

    kinfo!("{} thread(s) completed", completed.get());

    let stats = runtime.shutdown()?;
    println!("\n{}", stats);
    println!("\n=== Example Complete ===");
    Ok(())
}
