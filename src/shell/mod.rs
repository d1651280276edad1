//! Shell subprocess plumbing.
//!
//! A session owns one shell child process and three workers bound to its
//! pipes. The shell gives no signal that a command's output is complete, so
//! the feeder follows every command with two `echo` commands that print a
//! per-session sentinel on each output stream, and the drainers split the
//! raw byte streams on that sentinel.
//!
//! Submodules:
//! - `protocol`: the session signature and the literal marker strings.
//! - `framing`: pure conversion of raw reads into [`Fragment`](crate::models::message::Fragment)s.
//! - `feeder`: writes commands and markers to the shell's stdin.
//! - `drainer`: reads one output pipe until end-of-stream.
//! - `host`: spawns the shell, starts the workers and supervises exit.

pub mod drainer;
pub mod feeder;
pub mod framing;
pub mod host;
pub mod protocol;
