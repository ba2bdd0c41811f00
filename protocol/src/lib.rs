//! Root of the `stec-protocol` library.
//!
//! Pure data types shared by every STEC crate: the tool-call/tool-result
//! wire shapes, the authorization decision/options types, the sandbox
//! permission model, and the human-approval round trip. No logic beyond
//! constructors, accessors, and `serde` derives lives here.

pub mod approval;
pub mod params;
pub mod sandbox_policy;
pub mod tool_call;

pub use approval::ApprovalOutcome;
pub use approval::ReviewDecision;
pub use params::ParamError;
pub use params::Params;
pub use sandbox_policy::SandboxPermission;
pub use sandbox_policy::SandboxPolicy;
pub use tool_call::AuthorizationDecision;
pub use tool_call::AuthorizationOptions;
pub use tool_call::ExecutionMetadata;
pub use tool_call::ToolCall;
pub use tool_call::ToolResult;
