//! Ring configuration
//!
//! Compiled-in defaults with runtime environment overrides.
//!
//! ```rust,ignore
//! use ringside_module::config::{RingConfig, SetupFlags};
//!
//! // Defaults with env overrides
//! let config = RingConfig::from_env();
//!
//! // Or customize programmatically
//! let config = RingConfig::new()
//!     .sq_entries(64)
//!     .flags(SetupFlags::SINGLE_ISSUER | SetupFlags::COOP_TASKRUN);
//! ```

use std::ops::BitOr;
use std::time::Duration;

use ringside_core::env::{env_flag, env_get, env_get_opt};

pub mod defaults {
    pub const SQ_ENTRIES: u32 = 256;
    pub const SQPOLL_IDLE_MS: u64 = 1000;
    /// IORING_MAX_ENTRIES
    pub const MAX_ENTRIES: u32 = 32768;
}

/// io_uring setup flags understood by `BasicIoUring`.
///
/// Bit values match the kernel's `IORING_SETUP_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct SetupFlags(u32);

impl SetupFlags {
    pub const NONE: Self = Self(0);
    /// Busy-poll for completions (O_DIRECT files only).
    pub const IOPOLL: Self = Self(1 << 0);
    /// Kernel thread polls the SQ.
    pub const SQPOLL: Self = Self(1 << 1);
    /// Clamp oversized entry counts instead of failing.
    pub const CLAMP: Self = Self(1 << 4);
    pub const COOP_TASKRUN: Self = Self(1 << 8);
    pub const SINGLE_ISSUER: Self = Self(1 << 12);

    const KNOWN: u32 = Self::IOPOLL.0
        | Self::SQPOLL.0
        | Self::CLAMP.0
        | Self::COOP_TASKRUN.0
        | Self::SINGLE_ISSUER.0;

    /// Flags from raw bits. `None` if an unsupported bit is set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::KNOWN != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SetupFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Ring configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Number of SQ entries. Rounded up to a power of 2 by the kernel.
    pub sq_entries: u32,
    /// Number of CQ entries. Defaults to 2 * sq_entries.
    pub cq_entries: Option<u32>,
    /// Setup flags.
    pub flags: SetupFlags,
    /// SQPOLL thread idle time before it sleeps.
    pub sqpoll_idle: Duration,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            sq_entries: defaults::SQ_ENTRIES,
            cq_entries: None,
            flags: SetupFlags::NONE,
            sqpoll_idle: Duration::from_millis(defaults::SQPOLL_IDLE_MS),
        }
    }
}

impl RingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `RINGSIDE_SQ_ENTRIES` - SQ depth
    /// - `RINGSIDE_CQ_ENTRIES` - CQ depth
    /// - `RINGSIDE_SQPOLL_IDLE_MS` - enables SQPOLL with this idle time
    /// - `RINGSIDE_IOPOLL` - busy-poll completions (0/1)
    /// - `RINGSIDE_CLAMP` - clamp entry counts (0/1)
    /// - `RINGSIDE_COOP_TASKRUN` - cooperative task running (0/1)
    /// - `RINGSIDE_SINGLE_ISSUER` - single submitter thread hint (0/1)
    pub fn from_env() -> Self {
        let mut config = Self::default().sq_entries(env_get("RINGSIDE_SQ_ENTRIES", defaults::SQ_ENTRIES));
        config.cq_entries = env_get_opt("RINGSIDE_CQ_ENTRIES");

        if let Some(idle) = env_get_opt::<u64>("RINGSIDE_SQPOLL_IDLE_MS") {
            config = config.sqpoll(Duration::from_millis(idle));
        }
        for (key, flag) in [
            ("RINGSIDE_IOPOLL", SetupFlags::IOPOLL),
            ("RINGSIDE_CLAMP", SetupFlags::CLAMP),
            ("RINGSIDE_COOP_TASKRUN", SetupFlags::COOP_TASKRUN),
            ("RINGSIDE_SINGLE_ISSUER", SetupFlags::SINGLE_ISSUER),
        ] {
            if env_flag(key, false) {
                config.flags = config.flags | flag;
            }
        }
        config
    }

    pub fn sq_entries(mut self, n: u32) -> Self {
        self.sq_entries = n;
        self
    }

    pub fn cq_entries(mut self, n: u32) -> Self {
        self.cq_entries = Some(n);
        self
    }

    pub fn flags(mut self, flags: SetupFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Enable SQPOLL with the given idle time.
    pub fn sqpoll(mut self, idle: Duration) -> Self {
        self.flags = self.flags | SetupFlags::SQPOLL;
        self.sqpoll_idle = idle;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.sq_entries == 0 {
            return Err("sq_entries must be at least 1");
        }
        if self.sq_entries > defaults::MAX_ENTRIES && !self.flags.contains(SetupFlags::CLAMP) {
            return Err("sq_entries exceeds IORING_MAX_ENTRIES");
        }
        if let Some(cq) = self.cq_entries {
            if cq < self.sq_entries {
                return Err("cq_entries must not be smaller than sq_entries");
            }
        }
        Ok(())
    }
}
