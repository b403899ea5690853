//! Chat application module for interactive conversations with a local model.
//!
//! This module provides the pieces of a chat front end built on top of the
//! klatsch core:
//!
//! - Streaming replies rendered as they arrive
//! - Several independent sessions with derived titles
//! - Slash commands for session control
//! - Configurable server, model, bot name, and system prompt
//!
//! # Architecture
//!
//! - [`app`]: the [`ChatApp`] context object tying registry and coordinator together
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing

mod app;
mod commands;
mod config;

pub use crate::sink::{DisplaySink, PlainTextSink};
pub use app::{ChatApp, SessionStats};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
