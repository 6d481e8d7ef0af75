//! Playlist mutation batches run against an in-process daemon
//!
//! The daemon is driven through `LocalConnection`, so every planned step
//! goes through the same routing and marshalling a remote client would hit.

use mmx_client::coll_utils::{self, PlaylistOptions};
use mmx_client::{Direction, Error, JumpOutcome, PlaylistCache, PlaylistCommand, PlaylistMutator, PlaylistPositions};
use mmx_common::config::DaemonConfig;
use mmx_common::{
    CmdValue, Collection, CollectionNamespace, CommandId, Connection, ObjectKind, SignalEvent, SignalKind,
};
use mmx_daemon::{Daemon, LocalConnection};

struct Fixture {
    _dir: tempfile::TempDir,
    daemon: Daemon,
}

impl Fixture {
    /// Daemon with `ids` in the active playlist
    fn with_playlist(ids: &[u32]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig {
            output_plugin: "null".to_string(),
            property_file: Some(dir.path().join("properties.toml")),
            ..DaemonConfig::default()
        };
        let daemon = Daemon::start(&config).unwrap();

        let mut conn = daemon.router().connect();
        for &id in ids {
            conn.call(
                ObjectKind::Playlist,
                CommandId::PlaylistAddId,
                vec!["".into(), CmdValue::Uint32(id)],
            )
            .unwrap();
        }

        Self { _dir: dir, daemon }
    }

    fn conn(&self) -> LocalConnection {
        self.daemon.router().connect()
    }

    fn mutator(&self) -> PlaylistMutator<LocalConnection> {
        PlaylistMutator::new(self.conn(), "")
    }

    fn entries(&self) -> Vec<u32> {
        let mut cache = PlaylistCache::new();
        cache.refresh(&mut self.conn()).unwrap();
        cache.entries().to_vec()
    }
}

#[test]
fn test_cache_refresh_reads_active_playlist() {
    let fixture = Fixture::with_playlist(&[10, 20, 30]);
    let mut cache = PlaylistCache::new();
    cache.refresh(&mut fixture.conn()).unwrap();

    assert!(cache.is_valid());
    assert_eq!(cache.active_name(), "Default");
    assert_eq!(cache.entries(), &[10, 20, 30]);
}

#[test]
fn test_move_matching_through_daemon() {
    let fixture = Fixture::with_playlist(&[1, 2, 3, 4, 5]);
    let snapshot = fixture.entries();

    let applied = fixture
        .mutator()
        .move_matching(&snapshot, &Collection::idlist(vec![2, 4]), 1)
        .unwrap();

    assert_eq!(applied, 2);
    assert_eq!(fixture.entries(), vec![1, 2, 4, 3, 5]);
}

#[test]
fn test_remove_matching_and_cached() {
    let fixture = Fixture::with_playlist(&[1, 2, 1, 3, 1]);
    let snapshot = fixture.entries();
    fixture
        .mutator()
        .remove_matching(&snapshot, &Collection::idlist(vec![1]))
        .unwrap();
    assert_eq!(fixture.entries(), vec![2, 3]);

    let mut cache = PlaylistCache::new();
    cache.refresh(&mut fixture.conn()).unwrap();
    fixture
        .mutator()
        .remove_cached(&cache, &Collection::idlist(vec![3]))
        .unwrap();
    assert_eq!(fixture.entries(), vec![2]);
}

#[test]
fn test_insert_and_move_positions() {
    let fixture = Fixture::with_playlist(&[1, 2, 3]);
    let mut mutator = fixture.mutator();

    mutator.add_list(&[7, 8], 1).unwrap();
    assert_eq!(fixture.entries(), vec![1, 7, 8, 2, 3]);

    let positions = PlaylistPositions::parse("4-").unwrap();
    mutator.move_positions(&positions, 5, 0).unwrap();
    assert_eq!(fixture.entries(), vec![2, 3, 1, 7, 8]);

    mutator.remove_positions(&positions, 5).unwrap();
    assert_eq!(fixture.entries(), vec![2, 3, 1]);
}

#[test]
fn test_remove_ordered_through_daemon() {
    let fixture = Fixture::with_playlist(&[5, 7, 6, 5]);
    let snapshot = fixture.entries();
    fixture
        .mutator()
        .remove_ordered(&snapshot, &Collection::idlist(vec![5, 7]))
        .unwrap();
    // 6 uses up the rest of the list, so the second 5 stays
    assert_eq!(fixture.entries(), vec![6, 5]);
}

/// Jump sends set-next then tickle, and the daemon lands on the match
#[test]
fn test_jump_moves_playback() {
    let fixture = Fixture::with_playlist(&[11, 12, 13, 14]);
    let cache = PlaylistCache::from_parts("Default", fixture.entries(), Some(0));

    let outcome = fixture
        .mutator()
        .jump(&cache, &Collection::idlist(vec![13]), Direction::Forward)
        .unwrap();
    assert_eq!(outcome, JumpOutcome::Jumped { position: 2 });
    assert_eq!(fixture.daemon.playlist().current_id(), Some(13));

    let outcome = fixture
        .mutator()
        .jump(&cache, &Collection::idlist(vec![99]), Direction::Backward)
        .unwrap();
    assert_eq!(outcome, JumpOutcome::NoMatch);
    assert_eq!(fixture.daemon.playlist().current_id(), Some(13));
}

/// A stale snapshot fails part way; earlier steps stay applied
#[test]
fn test_stale_snapshot_reports_partial_batch() {
    let fixture = Fixture::with_playlist(&[1, 2, 3]);
    let stale = [1, 9, 2, 3, 9];

    let err = fixture
        .mutator()
        .remove_matching(&stale, &Collection::idlist(vec![1, 9]))
        .unwrap_err();

    match err {
        Error::Batch {
            step,
            command,
            applied,
            ..
        } => {
            assert_eq!(step, 2);
            assert_eq!(applied, 2);
            assert_eq!(command, PlaylistCommand::RemoveAt { pos: 2 });
        }
        other => panic!("expected a batch error, got {:?}", other),
    }
    assert_eq!(fixture.entries(), vec![3]);
}

/// A failing query stops the operation before anything is sent
#[test]
fn test_query_failure_sends_nothing() {
    let fixture = Fixture::with_playlist(&[1, 2, 3]);
    let snapshot = fixture.entries();
    let missing = Collection::reference("Nope", CollectionNamespace::Collections);

    let err = fixture.mutator().remove_matching(&snapshot, &missing).unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert_eq!(fixture.entries(), vec![1, 2, 3]);
}

#[test]
fn test_save_collection_guard_and_playlist_config() {
    let fixture = Fixture::with_playlist(&[]);
    let mut conn = fixture.conn();
    let coll = Collection::idlist(vec![1, 2]);

    coll_utils::save_collection(&mut conn, &coll, "Mine", CollectionNamespace::Collections, false).unwrap();
    let err = coll_utils::save_collection(&mut conn, &coll, "Mine", CollectionNamespace::Collections, false)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(name) if name == "Mine"));
    coll_utils::save_collection(&mut conn, &coll, "Mine", CollectionNamespace::Collections, true).unwrap();

    assert!(!coll_utils::playlist_exists(&mut conn, "Party").unwrap());
    let options = PlaylistOptions {
        kind: Some("pshuffle".to_string()),
        input: Some("Mine".to_string()),
        ..PlaylistOptions::default()
    };
    assert!(coll_utils::configure_playlist(&mut conn, Collection::idlist(Vec::new()), "Party", &options).unwrap());
    assert!(coll_utils::playlist_exists(&mut conn, "Party").unwrap());

    let saved = coll_utils::get_collection(&mut conn, "Party", CollectionNamespace::Playlists).unwrap();
    assert_eq!(saved.attribute("type"), Some("pshuffle"));
    assert_eq!(saved.operands()[0].attribute("reference"), Some("Mine"));
}

/// Cached removal edits the playlist the cache came from, whatever the
/// mutator was created for
#[test]
fn test_remove_cached_targets_cached_playlist() {
    let fixture = Fixture::with_playlist(&[1, 2, 3]);
    let mut conn = fixture.conn();
    conn.call(ObjectKind::Playlist, CommandId::PlaylistCreate, vec!["Other".into()])
        .unwrap();
    for id in [7, 8, 9] {
        conn.call(
            ObjectKind::Playlist,
            CommandId::PlaylistAddId,
            vec!["Other".into(), CmdValue::Uint32(id)],
        )
        .unwrap();
    }

    let mut cache = PlaylistCache::new();
    cache.refresh(&mut conn).unwrap();
    PlaylistMutator::new(fixture.conn(), "Other")
        .remove_cached(&cache, &Collection::idlist(vec![3]))
        .unwrap();

    assert_eq!(fixture.daemon.playlist().entries("Default").unwrap(), vec![1, 2]);
    assert_eq!(fixture.daemon.playlist().entries("Other").unwrap(), vec![7, 8, 9]);
}

/// An invalidated cache is refused until refreshed
#[test]
fn test_stale_cache_rejected() {
    let fixture = Fixture::with_playlist(&[11, 12, 13]);
    let mut cache = PlaylistCache::new();
    cache.refresh(&mut fixture.conn()).unwrap();
    cache.apply_event(&SignalEvent::new(
        ObjectKind::Playlist,
        SignalKind::PlaylistLoaded,
        "Default".into(),
    ));

    let err = fixture
        .mutator()
        .jump(&cache, &Collection::idlist(vec![13]), Direction::Forward)
        .unwrap_err();
    assert!(matches!(err, Error::StaleCache));
    let err = fixture
        .mutator()
        .remove_cached(&cache, &Collection::idlist(vec![13]))
        .unwrap_err();
    assert!(matches!(err, Error::StaleCache));
    assert_eq!(fixture.daemon.playlist().current_id(), Some(11));
    assert_eq!(fixture.entries(), vec![11, 12, 13]);

    cache.refresh(&mut fixture.conn()).unwrap();
    let outcome = fixture
        .mutator()
        .jump(&cache, &Collection::idlist(vec![13]), Direction::Forward)
        .unwrap();
    assert_eq!(outcome, JumpOutcome::Jumped { position: 2 });
}
