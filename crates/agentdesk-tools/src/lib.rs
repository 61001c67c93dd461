//! Agentdesk Tools - typed callable functions agents may invoke
//!
//! A tool is a self-contained type implementing the Tool trait. Desks build
//! one ToolRegistry at startup; agents name the subset they may call.

pub mod registry;

pub use registry::{Invocation, Tool, ToolContext, ToolOutcome, ToolRegistry, ToolResult};
