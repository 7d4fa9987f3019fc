//! Deterministic, pure logic shared by the agent core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod calc;
pub mod confirm;
pub mod context;
pub mod invocation;
pub mod message;
pub mod routing;
pub mod scope;
