pub mod command_executor;
pub mod command_guard;
pub mod environment;
pub mod error;
pub mod resolve;
pub mod ring_buffer;

pub use command_executor::{CommandExecutor, SandboxLimits, TerminalOutput, TerminalRequest};
pub use command_guard::CommandGuard;
pub use environment::EnvironmentSnapshot;
pub use error::SandboxError;
