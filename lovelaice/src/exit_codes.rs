//! Stable exit codes for the `lovelaice` CLI.

/// The command completed.
pub const OK: i32 = 0;
/// Invalid arguments or config, or the turn failed.
pub const INVALID: i32 = 1;
/// The turn was interrupted with Ctrl-C (128 + SIGINT).
pub const CANCELLED: i32 = 130;
