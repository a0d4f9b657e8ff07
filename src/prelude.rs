//! Convenience re-exports for common use.

pub use crate::config::ParleyConfig;
pub use crate::error::{ParleyError, Result};
pub use crate::realtime::{
    AppState, ConnectionState, LiveState, RealtimeConfiguration, RealtimeSessionManager,
    RtcBackend, SdpSignaler,
};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolParameters, ToolRegistry, ToolResult};
pub use crate::types::{Message, MessageSink, Role, ToolInvocation};
