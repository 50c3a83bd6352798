use thiserror::Error;

/// Error codes returned to guest code.
///
/// Syscalls report failure by writing the negated code into `r0`; see
/// [`Errno::as_return`].
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(i32)]
pub enum Errno {
    #[error("operation not permitted")]
    EPERM = 1,
    #[error("no such process or entry")]
    ENOENT = 2,
    #[error("no such device or address")]
    ENXIO = 6,
    #[error("resource temporarily unavailable")]
    EAGAIN = 11,
    #[error("out of memory")]
    ENOMEM = 12,
    #[error("bad address")]
    EFAULT = 14,
    #[error("invalid argument")]
    EINVAL = 22,
    #[error("no space left")]
    ENOSPC = 28,
    #[error("function not implemented")]
    ENOSYS = 38,
}

impl Errno {
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// The value a failing syscall leaves in `r0`.
    pub const fn as_return(self) -> u32 {
        (-(self as i32)) as u32
    }
}
