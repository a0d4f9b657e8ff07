//! Parley — realtime voice sessions for Rust
//!
//! Manages a bidirectional voice conversation with an OpenAI realtime model
//! over WebRTC: microphone capture, SDP signaling, the `oai-events` data
//! channel, live transcript state, and tool calls answered in-session.
//!
//! The platform WebRTC stack plugs in through [`realtime::RtcBackend`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use parley::prelude::*;
//!
//! # async fn example(backend: Arc<dyn RtcBackend>) -> parley::error::Result<()> {
//! let config = ParleyConfig::from_env()?.realtime()?;
//! let manager = RealtimeSessionManager::builder()
//!     .config(config)
//!     .backend(backend)
//!     .build();
//!
//! manager.start_session().await?;
//! let mut live = manager.watch_live_state();
//! while live.changed().await.is_ok() {
//!     println!("{}", live.borrow().assistant_response);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod prelude;
pub mod realtime;
pub mod tools;
pub mod types;
pub mod util;
