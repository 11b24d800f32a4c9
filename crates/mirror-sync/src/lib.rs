//! Incremental, resumable mirroring of one guild into a [`LocalStore`].
//!
//! The engine walks guild → members → text channels → messages, one remote
//! call at a time. Every store write is idempotent, so an interrupted run is
//! recovered by running again; each channel resumes a fixed number of
//! messages behind its newest mirrored message to pick up reaction changes.
//!
//! [`LocalStore`]: mirror_db::LocalStore

pub mod config;
pub mod discord;
pub mod engine;
pub mod error;
pub mod remote;
pub mod reporter;

pub use config::SyncConfig;
pub use discord::DiscordClient;
pub use engine::{ChannelOutcome, ChannelReport, SyncEngine, SyncPhase, SyncReport};
pub use error::{SyncError, SyncResult};
pub use remote::{MemoryRemote, MessagesRequest, RemoteApi};
pub use reporter::{LoggingReporter, RecordingReporter, ReporterEvent, StatusReporter};
