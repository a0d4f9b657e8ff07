//! Executes model-initiated function calls and returns their results.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use super::client_events::ClientEvent;
use crate::error::ParleyError;
use crate::tools::{
    validate_arguments, ToolArguments, ToolExecutionContext, ToolRegistry, ToolResult,
};
use crate::types::{Message, ToolInvocation};
use crate::util::timeout::with_timeout;

pub const INVALID_ARGUMENTS: &str = "Invalid tool arguments";
pub const EXECUTION_FAILED: &str = "Tool execution failed";

/// Where the bridge delivers frames and synthetic messages.
pub trait ToolCallOutbound: Send + Sync {
    /// Send `frames` back-to-back, in order, with no other frame in between.
    fn send_frames(&self, frames: &[ClientEvent]) -> Result<(), ParleyError>;

    fn append_message(&self, message: Message);
}

/// Resolves, executes, and answers tool calls.
///
/// Calls are independent: overlapping calls each run to completion and
/// answer in completion order.
#[derive(Debug, Clone)]
pub struct ToolCallBridge {
    tools: Arc<ToolRegistry>,
    tool_timeout: Option<Duration>,
}

impl ToolCallBridge {
    pub fn new(tools: Arc<ToolRegistry>, tool_timeout: Option<Duration>) -> Self {
        Self {
            tools,
            tool_timeout,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one tool call end to end.
    ///
    /// Never fails: every outcome, including unknown tools and panics, is
    /// reported to the model as a result frame followed by `response.create`.
    pub async fn handle_tool_call(
        &self,
        outbound: &dyn ToolCallOutbound,
        call_id: &str,
        tool_name: &str,
        raw_arguments: &str,
    ) -> ToolInvocation {
        debug!(call_id, tool = tool_name, "handling tool call");
        let (arguments, result) = self.resolve(call_id, tool_name, raw_arguments).await;

        send_tool_call_response(outbound, call_id, &result);

        let invocation = ToolInvocation {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            raw_arguments: raw_arguments.to_string(),
            arguments,
            result,
        };
        if invocation.result.success && invocation.result.data.is_some() {
            outbound.append_message(Message::tool_invocation(invocation.clone()));
        }
        invocation
    }

    async fn resolve(
        &self,
        call_id: &str,
        tool_name: &str,
        raw_arguments: &str,
    ) -> (Value, ToolResult) {
        let Some(tool) = self.tools.get(tool_name) else {
            warn!(call_id, tool = tool_name, "tool not found");
            return (
                Value::Null,
                ToolResult::failure(format!("Tool {tool_name} not found")),
            );
        };

        let args = match ToolArguments::parse(raw_arguments) {
            Ok(args) => args,
            Err(error) => {
                warn!(call_id, tool = tool_name, %error, "unparseable tool arguments");
                return (Value::Null, ToolResult::failure(INVALID_ARGUMENTS));
            }
        };
        if let Err(detail) = validate_arguments(args.raw(), &tool.parameters().schema) {
            warn!(call_id, tool = tool_name, %detail, "tool arguments rejected by schema");
            return (
                args.raw().clone(),
                ToolResult::failure(format!("{INVALID_ARGUMENTS}: {detail}")),
            );
        }

        let ctx = ToolExecutionContext {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
        };
        let execution = async {
            match AssertUnwindSafe(tool.execute(&args, &ctx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(ParleyError::ToolExecution {
                    tool_name: tool_name.to_string(),
                    message: "tool panicked".into(),
                }),
            }
        };
        let result = match with_timeout(self.tool_timeout, execution).await {
            Ok(result) => result,
            Err(error) => {
                warn!(call_id, tool = tool_name, %error, "tool execution failed");
                ToolResult::failure(EXECUTION_FAILED)
            }
        };
        (args.raw().clone(), result)
    }
}

/// Send a function-call result and the follow-up `response.create`.
///
/// Returns `false` (after logging) when the frames could not be delivered,
/// e.g. because the data channel is closed.
pub fn send_tool_call_response(
    outbound: &dyn ToolCallOutbound,
    call_id: &str,
    result: &ToolResult,
) -> bool {
    let output = match ClientEvent::function_call_output(call_id, result) {
        Ok(frame) => frame,
        Err(error) => {
            warn!(call_id, %error, "failed to encode tool result");
            return false;
        }
    };
    match outbound.send_frames(&[output, ClientEvent::response_create()]) {
        Ok(()) => true,
        Err(error) => {
            warn!(call_id, %error, "dropping tool result, data channel unavailable");
            false
        }
    }
}
