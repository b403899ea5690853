// Public modules
pub mod benchmark;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod ndjson;
pub mod observability;
pub mod registry;
pub mod session;
pub mod sink;
pub mod types;
pub mod utils;

// Re-exports
pub use client::Ollama;
pub use client_logger::{ClientLogger, JsonlLogger};
pub use coordinator::{Exchange, ExchangeState, StreamCoordinator};
pub use error::{Error, Result};
pub use gateway::{FragmentStream, ModelGateway, error_fragment};
pub use observability::register_biometrics;
pub use registry::SessionRegistry;
pub use session::ChatSession;
pub use sink::{DisplaySink, PlainTextSink, RecordingSink, SinkEvent};
pub use types::*;
