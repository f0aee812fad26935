#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run finished without a single successful request.
    NoData = 10,

    /// Invalid CLI/config/options (bad flags, invalid durations, unreadable TLS files, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, worker panics, unexpected invariants).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
