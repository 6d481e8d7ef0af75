//! # mmx daemon
//!
//! The object bus and the daemon subsystems built on it:
//! - [`object`]: reference-counted objects with signal subscriptions
//! - [`dispatch`]: typed command registration and invocation
//! - [`ipc`]: object routing and signal forwarding for clients
//! - [`main_object`], [`config_registry`], [`playlist`], [`playback`],
//!   [`collections`]: the subsystems
//! - [`daemon`]: assembly of all of the above

pub mod collections;
pub mod config_registry;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod ipc;
pub mod main_object;
pub mod object;
pub mod playback;
pub mod playlist;

pub use daemon::Daemon;
pub use dispatch::CommandDescriptor;
pub use error::{Error, Result};
pub use ipc::{LocalConnection, Router, SignalForwarder};
pub use object::{ManagedObject, ObjectRef, SignalHandler, Userdata, WeakObjectRef};
