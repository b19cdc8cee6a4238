//! # ringside-module - default ring implementations
//!
//! Each impl prioritizes correctness and simplicity over performance.
//!
//! ## Default stack
//!
//! | Backend        | Native queue             | Use                          |
//! |----------------|--------------------------|------------------------------|
//! | BasicIoUring   | kernel io_uring SQ/CQ    | production (Linux 5.6+)      |
//! | ScriptedRing   | userspace `VecDeque`s    | tests, hosts without io_uring |
//!
//! `RingConfig` picks capacities and setup flags, with `RINGSIDE_*`
//! environment overrides.

pub mod config;
pub mod scripted;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod basic_iouring;
        pub use basic_iouring::BasicIoUring;
    }
}

pub use config::{RingConfig, SetupFlags};
pub use scripted::{ScriptMode, ScriptedControl, ScriptedRing};
