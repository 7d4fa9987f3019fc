//! I/O helpers: filesystem resolution, subprocesses, the completion
//! endpoint, the terminal, prompt rendering and configuration files.

pub mod completion;
pub mod config;
pub mod init;
pub mod interaction;
pub mod paths;
pub mod process;
pub mod prompt;
