pub mod call_tracker;
pub mod collaborators;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod host_abi;
pub mod tool;

pub use error::CompileError;
pub use error::SandboxRunError;
pub use executor::ExecuteOutcome;
pub use executor::ExecuteParams;
pub use executor::ExecuteResult;
pub use executor::ExecutionMeta;
pub use executor::SandboxExecutor;
pub use tool::SandboxTool;
