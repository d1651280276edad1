#![forbid(unsafe_code)]

//! `autoshell`: drive a shell subprocess and frame its output into
//! messages.
//!
//! The engine spawns a POSIX shell, forwards command lines to it and turns
//! the shell's unbounded stdout and stderr byte streams into typed
//! [`Message`]s, one per completed command and stream. Output boundaries
//! are recovered by echoing a per-session sentinel after every command.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use autoshell::{Message, MessageListener, Session, ShellConfig};
//!
//! # async fn example() -> autoshell::Result<()> {
//! let listener: Arc<dyn MessageListener> =
//!     Arc::new(|message: Message| println!("{:?}: {}", message.kind, message.payload));
//!
//! let mut session = Session::new(ShellConfig::default(), Some(listener));
//! session.run(&b"echo hello\nexit\n"[..]).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod shell;

pub use config::ShellConfig;
pub use errors::{AppError, Result};
pub use models::command::Command;
pub use models::message::{Fragment, Message, MessageKind};
pub use orchestrator::listener::{JsonLinesSink, MessageListener, StdoutSink};
pub use orchestrator::session::{Session, SessionState};
