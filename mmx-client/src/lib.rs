//! # MMX Client Library
//!
//! Client-side playlist editing over an mmx daemon connection:
//! - Cached copy of the active playlist
//! - Match sets and user position lists
//! - Multi-step playlist mutations with index bookkeeping
//! - Collection and playlist configuration helpers
//! - Display formatting

pub mod cache;
pub mod coll_utils;
pub mod error;
pub mod format;
pub mod matched;
pub mod mutator;
pub mod positions;

pub use cache::PlaylistCache;
pub use coll_utils::PlaylistOptions;
pub use error::{Error, Result};
pub use matched::MatchedIdSet;
pub use mutator::{Direction, JumpOutcome, PlaylistCommand, PlaylistMutator};
pub use positions::PlaylistPositions;
