//! Lovelaice: an extensible terminal AI agent.
//!
//! A turn takes a natural-language instruction, routes it to a registered
//! skill, lets the skill invoke tools under an explicit permission model and
//! streams the reply back. The crate keeps a strict split between:
//!
//! - **[`core`]**: pure logic (messages, context, scopes, routing decisions,
//!   confirmation parsing, arithmetic). No I/O.
//! - **[`io`]**: side effects (filesystem resolution, subprocesses, the
//!   completion endpoint, the terminal, configuration files).
//!
//! Orchestration lives in [`engine`], with [`security`], [`tools`] and
//! [`skills`] supplying the gate and the registered capabilities.

pub mod cancel;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod security;
pub mod skills;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
