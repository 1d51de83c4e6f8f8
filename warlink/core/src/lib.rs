//! Warlink Core - Persistent Streaming Client for the War-Room Agent
//!
//! This crate maintains a long-lived connection to a remote backend agent:
//! it keeps one WebSocket alive across failures, reassembles streamed
//! response tokens into complete messages, and multiplexes telemetry,
//! heartbeats, and system logs over the same channel. It is completely
//! independent of any UI; a terminal console, a daemon, or a test harness
//! can all drive it the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Consumer                             │
//! │     send() / set_profile() / close()      callbacks, watch   │
//! └───────────────┬──────────────────────────────▲───────────────┘
//!                 │ commands                     │ LinkState
//! ┌───────────────▼──────────────────────────────┴───────────────┐
//! │                     AgentLink actor task                     │
//! │  ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌──────────┐  │
//! │  │ reconnect │  │ heartbeat  │  │   token   │  │ activity │  │
//! │  │  backoff  │  │   pings    │  │accumulator│  │ reports  │  │
//! │  └───────────┘  └────────────┘  └───────────┘  └──────────┘  │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │ one WebSocket, JSON frames
//!                     ┌───────────▼───────────┐
//!                     │   war-room backend    │
//!                     └───────────────────────┘
//! ```
//!
//! Next to the link sit plain HTTP collaborators: the backend's one-shot
//! command and health endpoints, and the voice transcription service.
//!
//! # Key Types
//!
//! - [`AgentLink`]: Handle to the persistent connection
//! - [`LinkState`]: Observable snapshot (phase, flags, streamed text, GPU)
//! - [`InboundFrame`]: Classified inbound wire frame
//! - [`WarlinkConfig`]: Layered configuration (file, env, CLI)
//! - [`BackendClient`] / [`WhisperClient`]: HTTP collaborators
//! - [`HealthMonitor`]: Background health poller
//! - [`Transcript`]: Capped conversation history for surfaces
//!
//! # Quick Start
//!
//! ```ignore
//! use warlink_core::{load_config, AgentLink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let link = AgentLink::connect(config.link);
//!
//!     link.on_message_complete(|text| println!("agent: {text}"));
//!     link.on_error(|message| eprintln!("error: {message}"));
//!
//!     // Watch streamed fragments as they accumulate
//!     let mut state = link.subscribe();
//!     tokio::spawn(async move {
//!         while state.changed().await.is_ok() {
//!             let snapshot = state.borrow().clone();
//!             if snapshot.streaming {
//!                 print!("\r{}", snapshot.streaming_text);
//!             }
//!         }
//!     });
//!
//!     link.send("status report");
//!
//!     // ... later
//!     link.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`link`]: The persistent connection manager (reconnect, heartbeat, streaming)
//! - [`protocol`]: Wire frame types and inbound classification
//! - [`config`]: TOML/env/CLI layered configuration
//! - [`api`]: HTTP collaborators (command, health, transcription)
//! - [`history`]: Conversation transcript for surfaces
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on crossterm or any other terminal
//! or UI framework. It's pure connection logic that can be used anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod history;
pub mod link;
pub mod protocol;

// Re-exports for convenience
pub use link::{AgentLink, LinkPhase, LinkState};
pub use protocol::{
    classify, ActivityEvent, ActivityReport, ControlFrame, GpuStatus, InboundFrame, OutboundFrame,
    UserMessage,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ApiConfig, ConfigError,
    ConfigOverrides, ConfigSource, LinkConfig, WarlinkConfig, WarlinkToml,
};

// HTTP collaborator exports
pub use api::{
    format_uptime, ApiError, AudioClip, BackendClient, GpuHealth, HealthMonitor, HealthSnapshot,
    SystemHealth, WhisperClient,
};

// Transcript exports
pub use history::{ChatMessage, ChatRole, MessageId, Transcript};
