//! Collection and playlist configuration helpers
//!
//! Thin wrappers over the collection store commands plus the attribute
//! conventions playlists use (`type`, `history`, `upcoming`, `jumplist`).

use mmx_common::{
    CmdValue, Collection, CollectionKind, CollectionNamespace, CommandId, Connection, Error as CommonError, ObjectKind,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

/// Playlist type that refills itself from its input
pub const PSHUFFLE: &str = "pshuffle";

/// Requested playlist attribute changes; `None` leaves an attribute alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistOptions {
    pub kind: Option<String>,
    pub history: Option<u32>,
    pub upcoming: Option<u32>,
    /// Name of a saved collection to use as the playlist input
    pub input: Option<String>,
    pub jumplist: Option<String>,
}

/// Fetch a saved collection
pub fn get_collection<C: Connection>(conn: &mut C, name: &str, namespace: CollectionNamespace) -> Result<Collection> {
    let value = conn.call(
        ObjectKind::Collection,
        CommandId::CollectionGet,
        vec![name.into(), namespace.as_str().into()],
    )?;
    Ok(value.as_collection()?.clone())
}

/// Whether a collection named `name` is saved in `namespace`
///
/// Only a missing collection counts as absent; other failures propagate.
pub fn collection_exists<C: Connection>(conn: &mut C, name: &str, namespace: CollectionNamespace) -> Result<bool> {
    match get_collection(conn, name, namespace) {
        Ok(_) => Ok(true),
        Err(Error::Common(CommonError::NotFound(_))) => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn playlist_exists<C: Connection>(conn: &mut C, playlist: &str) -> Result<bool> {
    collection_exists(conn, playlist, CollectionNamespace::Playlists)
}

/// Save `coll` as `name`, refusing to replace an existing one unless `force`
pub fn save_collection<C: Connection>(
    conn: &mut C,
    coll: &Collection,
    name: &str,
    namespace: CollectionNamespace,
    force: bool,
) -> Result<()> {
    if !force && collection_exists(conn, name, namespace)? {
        return Err(Error::AlreadyExists(name.to_string()));
    }

    conn.call(
        ObjectKind::Collection,
        CommandId::CollectionSave,
        vec![
            CmdValue::Collection(coll.clone()),
            name.into(),
            namespace.as_str().into(),
        ],
    )?;
    Ok(())
}

/// Set one attribute on `coll` and save it over `name`
pub fn configure_collection<C: Connection>(
    conn: &mut C,
    mut coll: Collection,
    namespace: CollectionNamespace,
    name: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    coll.set_attribute(key, value);
    save_collection(conn, &coll, name, namespace, true)
}

/// Apply playlist options to `coll`
///
/// Returns `false` and leaves `coll` untouched when neither the options nor
/// the collection carry a playlist type. An explicit input replaces all
/// operands with a reference to that collection; a pshuffle playlist with no
/// operands and no input draws from the whole library.
pub fn apply_playlist_options(coll: &mut Collection, options: &PlaylistOptions) -> bool {
    let kind = match (&options.kind, coll.attribute("type")) {
        (Some(kind), _) => kind.clone(),
        (None, Some(existing)) => existing.to_string(),
        (None, None) => return false,
    };

    coll.set_attribute("type", &kind);
    if let Some(history) = options.history {
        coll.set_int_attribute("history", i64::from(history));
    }
    if let Some(upcoming) = options.upcoming {
        coll.set_int_attribute("upcoming", i64::from(upcoming));
    }

    let input = match &options.input {
        Some(input) => Some(Collection::reference(input, CollectionNamespace::Collections)),
        None if kind == PSHUFFLE && coll.operands().is_empty() => Some(Collection::new(CollectionKind::Universe)),
        None => None,
    };
    if let Some(input) = input {
        coll.clear_operands();
        coll.add_operand(input);
    }

    if let Some(jumplist) = &options.jumplist {
        coll.set_attribute("jumplist", jumplist);
    }
    true
}

/// Apply `options` to `coll` and save it as playlist `playlist`
///
/// Returns whether anything was saved.
pub fn configure_playlist<C: Connection>(
    conn: &mut C,
    mut coll: Collection,
    playlist: &str,
    options: &PlaylistOptions,
) -> Result<bool> {
    if !apply_playlist_options(&mut coll, options) {
        return Ok(false);
    }

    save_collection(conn, &coll, playlist, CollectionNamespace::Playlists, true)?;
    info!("Configured playlist {}", playlist);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_without_type_do_nothing() {
        let mut coll = Collection::idlist(vec![1, 2]);
        let options = PlaylistOptions {
            history: Some(3),
            ..PlaylistOptions::default()
        };
        assert!(!apply_playlist_options(&mut coll, &options));
        assert_eq!(coll.attribute("history"), None);
    }

    #[test]
    fn test_existing_type_is_kept() {
        let mut coll = Collection::idlist(Vec::new());
        coll.set_attribute("type", "queue");
        let options = PlaylistOptions {
            history: Some(5),
            upcoming: Some(20),
            jumplist: Some("Next".to_string()),
            ..PlaylistOptions::default()
        };

        assert!(apply_playlist_options(&mut coll, &options));
        assert_eq!(coll.attribute("type"), Some("queue"));
        assert_eq!(coll.attribute("history"), Some("5"));
        assert_eq!(coll.attribute("upcoming"), Some("20"));
        assert_eq!(coll.attribute("jumplist"), Some("Next"));
        assert!(coll.operands().is_empty());
    }

    /// pshuffle with nothing to draw from gets the whole library
    #[test]
    fn test_pshuffle_defaults_to_universe() {
        let mut coll = Collection::idlist(Vec::new());
        let options = PlaylistOptions {
            kind: Some(PSHUFFLE.to_string()),
            ..PlaylistOptions::default()
        };

        assert!(apply_playlist_options(&mut coll, &options));
        assert_eq!(coll.operands().len(), 1);
        assert_eq!(coll.operands()[0].kind(), CollectionKind::Universe);
    }

    #[test]
    fn test_input_replaces_operands() {
        let mut coll = Collection::idlist(Vec::new());
        coll.add_operand(Collection::universe());
        coll.add_operand(Collection::idlist(vec![4]));
        let options = PlaylistOptions {
            kind: Some(PSHUFFLE.to_string()),
            input: Some("Rock".to_string()),
            ..PlaylistOptions::default()
        };

        assert!(apply_playlist_options(&mut coll, &options));
        assert_eq!(coll.operands().len(), 1);
        let input = &coll.operands()[0];
        assert_eq!(input.kind(), CollectionKind::Reference);
        assert_eq!(input.attribute("reference"), Some("Rock"));
        assert_eq!(input.attribute("namespace"), Some("Collections"));
    }
}
