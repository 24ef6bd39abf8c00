//! Workspace file tools.
//!
//! Thin wrappers over [`conclave_workspace::GuardedWorkspace`]. Mutations run
//! under the path lock of the invoking agent; failures come back as guided
//! error results. Successful mutations carry `fileEvent` details the runtime
//! turns into broadcast events.

mod create;
mod delete;
mod list;
mod read;
mod replace;

pub use create::CreateFileTool;
pub use delete::DeleteFileTool;
pub use list::ListFilesTool;
pub use read::ReadFileTool;
pub use replace::ReplaceInFileTool;
