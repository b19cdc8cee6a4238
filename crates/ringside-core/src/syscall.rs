//! Result helpers for raw syscall return conventions.
//!
//! Two conventions show up at the ring boundary:
//!
//! - **errno style** (`open`, `close`, `pread`): a negative return means
//!   "look at `errno`". Use [`try_call`].
//! - **negated style** (io_uring setup/submit/wait, CQE `res`): a negative
//!   return *is* the negated error code. Use [`try_call_neg`].
//!
//! Neither helper retries. A negative return is always an error.

use nix::errno::Errno;

/// Signed integer returned by a syscall.
pub trait SysRet: Copy {
    fn is_negative(self) -> bool;
    /// The negated value as an errno (for the negated convention).
    fn negated_errno(self) -> Errno;
}

macro_rules! impl_sysret {
    ($($t:ty),*) => {$(
        impl SysRet for $t {
            #[inline]
            fn is_negative(self) -> bool {
                self < 0
            }

            #[inline]
            fn negated_errno(self) -> Errno {
                let code = (self as i64)
                    .checked_neg()
                    .and_then(|v| i32::try_from(v).ok())
                    .unwrap_or(libc::EOVERFLOW);
                Errno::from_raw(code)
            }
        }
    )*};
}

impl_sysret!(i32, i64, isize);

/// Call `f`; a negative return is translated from `errno`.
///
/// ```ignore
/// let fd = try_call(|| unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) })?;
/// ```
#[inline]
pub fn try_call<T: SysRet>(f: impl FnOnce() -> T) -> Result<T, Errno> {
    let ret = f();
    if ret.is_negative() {
        return Err(Errno::last());
    }
    Ok(ret)
}

/// Call `f`; a negative return `-e` becomes `Errno(e)`.
#[inline]
pub fn try_call_neg<T: SysRet>(f: impl FnOnce() -> T) -> Result<T, Errno> {
    let ret = f();
    if ret.is_negative() {
        return Err(ret.negated_errno());
    }
    Ok(ret)
}

/// Errno carried by a `std::io::Error` (EIO when it has none).
#[inline]
pub fn errno_of(e: &std::io::Error) -> Errno {
    Errno::from_raw(e.raw_os_error().unwrap_or(libc::EIO))
}
