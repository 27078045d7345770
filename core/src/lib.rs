//! ChromaFlux core
//!
//! Finds the color-over-life and start-color vectors in Unreal asset JSON
//! exports, groups identical colors across many assets, recolors them in
//! place and writes the edited documents back through the external
//! converter.
//!
//! The entry point is [`Session`]: `load` → `regroup` → `recolor_*` →
//! `commit`. The building blocks are public for callers that want to drive
//! the stages themselves.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod backup;
pub mod color;
pub mod commit;
pub mod config;
pub mod converter;
pub mod document;
pub mod entry;
pub mod error;
pub mod extract;
pub mod fs_util;
pub mod grouping;
pub mod mutation;
pub mod pipeline;
pub mod session;

pub use backup::AssetBackup;
pub use color::ColorKey;
pub use color::ColorVector;
pub use commit::CommitReport;
pub use commit::CommitScope;
pub use config::ChromaConfig;
pub use converter::Converter;
pub use converter::ProcessConverter;
pub use document::DocumentId;
pub use document::DocumentStore;
pub use document::JsonDocument;
pub use entry::ColorEntry;
pub use entry::ColorMode;
pub use entry::EntryId;
pub use entry::EntryTable;
pub use entry::ModeSelection;
pub use error::ChromaError;
pub use error::ErrorKind;
pub use error::Result;
pub use grouping::ColorGroup;
pub use mutation::SyncPolicy;
pub use pipeline::Progress;
pub use session::LoadReport;
pub use session::Session;

