//! Agentdesk Gateway - WebSocket server and terminal chat over a desk

pub mod auth;
pub mod chat;
pub mod rpc;
pub mod server;
pub mod ws;

pub use auth::ResolvedAuth;
pub use server::{app, start_gateway, GatewayState};
