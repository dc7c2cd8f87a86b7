//! a2a-bridge: the Agent Bridge (B, spec.md §4.3) — a stateless HTTP client
//! to the inner agent, plus SALUTE telemetry polling.

pub mod client;

pub use client::AgentBridge;
