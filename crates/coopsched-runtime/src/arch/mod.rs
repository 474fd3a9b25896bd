//! Architecture-specific context switching
//!
//! Each backend provides:
//! - `SavedRegs`, the callee-saved register image of a suspended thread
//! - `init_context`, which makes a fresh image start in an entry function
//! - `switch_context`, which saves into one image and resumes another

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use self::x86_64::*;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use self::aarch64::*;
    } else {
        compile_error!("coopsched-runtime supports x86_64 and aarch64 only");
    }
}

/// Entry point of a fresh context; receives the argument given to `init_context`
pub type EntryFn = extern "C" fn(usize) -> !;
