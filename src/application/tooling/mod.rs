mod binding;
mod builtin;
mod error;
mod interface;
mod registry;

pub use binding::bind_params;
pub use builtin::{BUILTIN_TOOLS, CURRENT_TIME, builtin_tool, current_time_tool};
pub use error::{ToolError, ToolInvokeError};
pub use interface::{FnTool, Tool, ToolCapability, ToolParameter, ToolSpec};
pub use registry::{NO_TOOLS_AVAILABLE, ToolExecution, ToolRegistry, describe_specs};
