//! Root of the `stec-core` library: the Sandboxed Tool Execution Core.
//!
//! Components A-G and I of the design live here: the actor fabric, the
//! pausable execution deadline, session state, the authorized filesystem,
//! the authorization engine, the tool registry and executor actor, the
//! shell executor, and the interactive approval client. Component H (the
//! WASM sandbox) lives in `stec-sandbox` and depends on this crate.

pub mod actor;
pub mod approval;
pub mod authorization;
pub mod config;
pub mod deadline;
pub mod error;
pub mod fs;
pub mod session;
pub mod shell;
pub mod tools;

pub use error::CoreError;
pub use error::SandboxError;
