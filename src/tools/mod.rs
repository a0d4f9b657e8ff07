//! Tool system for model-initiated function calls.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::ToolRegistry;
pub use tool::{FnTool, Tool, ToolExecutionContext};
pub use types::{ParameterBuilder, ToolDefinition, ToolParameters, ToolResult};
pub use validation::validate_arguments;
