//! Thin process harness around `stec-core`/`stec-sandbox`: wires the
//! authorization core, session, filesystem, tool registry, and executor
//! actor together, then drives them from a line-oriented JSON protocol
//! over stdin/stdout. One `ToolCall` per line in, one `ToolResult` per
//! line out.

pub mod runtime;

pub use runtime::Runtime;
