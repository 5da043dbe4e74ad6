//! Engine module for catalog synchronization

pub mod arg_parser;
pub mod cli;
pub mod compare;
pub mod core;
pub mod creation;
pub mod hashing;
pub mod progress;
pub mod thumbnail;
pub mod tools;
pub mod video;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use compare::{FolderOp, compare_folder};
pub use core::Synchronizer;
pub use creation::{AssetCreator, CreatedAsset, CreationOutcome};
pub use hashing::{content_hash, hash_bytes, hash_file};
pub use thumbnail::{ThumbnailOutcome, generate_thumbnail};
pub use tools::{eligible_kind, mtime_changed};
pub use video::{FfmpegExtractor, FrameExtractor};
