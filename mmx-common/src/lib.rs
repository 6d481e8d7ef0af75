//! # MMX Common Library
//!
//! Shared code for the mmx daemon and its clients including:
//! - Tagged command/signal values (CmdValue enum)
//! - Signal kind, command id and object kind namespaces
//! - Collection expression trees
//! - Configuration loading
//! - The client-side transport trait
//! - Time formatting helpers

pub mod collection;
pub mod command;
pub mod config;
pub mod error;
pub mod signal;
pub mod time;
pub mod transport;
pub mod value;

pub use collection::{Collection, CollectionKind, CollectionNamespace};
pub use command::{CommandId, ObjectKind};
pub use error::{Error, Result};
pub use signal::{SignalEvent, SignalKind};
pub use transport::Connection;
pub use value::{CmdValue, FromCmdValue, IntoCmdValue, PlaylistChange, PlaylistChangeKind, ValueType};
