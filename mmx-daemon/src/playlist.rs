//! Playlist store
//!
//! Holds every named playlist, which one is active, the current position in
//! the active playlist and the pending "next" position set by clients. All
//! edits arrive as single-step commands (insert, move, remove) and are applied
//! in the order received; there is no batching on this side.
//!
//! An empty playlist name in any command refers to the active playlist.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmx_common::{CommandId, Error, ObjectKind, PlaylistChange, PlaylistChangeKind, Result, SignalKind};
use tracing::{debug, info};

use crate::dispatch::CommandDescriptor;
use crate::object::{ManagedObject, ObjectRef};

/// Playlist created at startup and active until another is loaded
pub const DEFAULT_PLAYLIST: &str = "Default";

#[derive(Debug)]
struct PlaylistState {
    playlists: BTreeMap<String, Vec<u32>>,
    active: String,
    /// Only meaningful while the active playlist is non-empty
    current: Option<usize>,
    pending_next: Option<usize>,
}

fn to_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Where index `i` ends up after the entry at `from` is moved to `to`
fn index_after_move(i: usize, from: usize, to: usize) -> usize {
    if i == from {
        to
    } else if from < i && i <= to {
        i - 1
    } else if to <= i && i < from {
        i + 1
    } else {
        i
    }
}

impl PlaylistState {
    fn new() -> Self {
        let mut playlists = BTreeMap::new();
        playlists.insert(DEFAULT_PLAYLIST.to_string(), Vec::new());
        Self {
            playlists,
            active: DEFAULT_PLAYLIST.to_string(),
            current: None,
            pending_next: None,
        }
    }

    fn resolve(&self, name: &str) -> String {
        if name.is_empty() {
            self.active.clone()
        } else {
            name.to_string()
        }
    }

    fn entries(&self, name: &str) -> Result<&Vec<u32>> {
        self.playlists
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("playlist {}", name)))
    }

    fn entries_mut(&mut self, name: &str) -> Result<&mut Vec<u32>> {
        self.playlists
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("playlist {}", name)))
    }

    fn active_len(&self) -> usize {
        self.playlists.get(&self.active).map_or(0, Vec::len)
    }

    fn current_id(&self) -> Option<u32> {
        let entries = self.playlists.get(&self.active)?;
        entries.get(self.current?).copied()
    }

    /// Point at the first entry once the active playlist stops being empty
    fn start_if_first(&mut self, name: &str) -> Option<usize> {
        if name != self.active || self.current.is_some() || self.active_len() != 1 {
            return None;
        }
        self.current = Some(0);
        self.current
    }
}

fn lock(state: &Mutex<PlaylistState>) -> MutexGuard<'_, PlaylistState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_index(index: u32, len: usize, what: &str) -> Result<usize> {
    let index = index as usize;
    if index >= len {
        return Err(Error::command(format!(
            "{} {} out of range (playlist length {})",
            what, index, len
        )));
    }
    Ok(index)
}

/// Playlist store object and direct accessors for other subsystems
#[derive(Clone)]
pub struct PlaylistStore {
    object: ObjectRef,
    state: Arc<Mutex<PlaylistState>>,
}

impl PlaylistStore {
    pub fn new() -> Self {
        let object = ObjectRef::new(ObjectKind::Playlist);
        let state = Arc::new(Mutex::new(PlaylistState::new()));
        register_commands(&object, &state);
        Self { object, state }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn active(&self) -> String {
        lock(&self.state).active.clone()
    }

    /// Ids of playlist `name` (empty name for the active one)
    pub fn entries(&self, name: &str) -> Result<Vec<u32>> {
        let state = lock(&self.state);
        let name = state.resolve(name);
        state.entries(&name).cloned()
    }

    pub fn current_position(&self) -> Option<usize> {
        lock(&self.state).current
    }

    pub fn current_id(&self) -> Option<u32> {
        lock(&self.state).current_id()
    }

    /// Move the current position to the pending next entry
    ///
    /// Without a pending jump the position advances by one. Returns the id
    /// now current, or `None` when the end of the playlist was reached.
    pub fn advance(&self) -> Option<u32> {
        let (position, id) = {
            let mut state = lock(&self.state);
            let len = state.active_len();
            let next = match state.pending_next.take() {
                Some(pending) => Some(pending),
                None => state.current.map(|c| c + 1),
            };

            match next.filter(|n| *n < len) {
                Some(n) => {
                    state.current = Some(n);
                    (n, state.current_id())
                }
                None => return None,
            }
        };

        debug!("Playlist advanced to position {}", position);
        self.object.emit_value(SignalKind::PlaylistCurrentPos, to_u32(position));
        id
    }
}

impl Default for PlaylistStore {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_change(object: &ManagedObject, change: PlaylistChange) {
    object.emit_value(SignalKind::PlaylistChanged, change);
}

fn emit_position(object: &ManagedObject, position: Option<usize>) {
    if let Some(position) = position {
        object.emit_value(SignalKind::PlaylistCurrentPos, to_u32(position));
    }
}

fn register_commands(object: &ObjectRef, state: &Arc<Mutex<PlaylistState>>) {
    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new1(
        CommandId::PlaylistCreate,
        move |_, name: String| {
            if name.is_empty() {
                return Err(Error::InvalidInput("playlist name must not be empty".to_string()));
            }
            let mut state = lock(&s);
            if state.playlists.contains_key(&name) {
                return Err(Error::command(format!("playlist {} already exists", name)));
            }
            state.playlists.insert(name.clone(), Vec::new());
            info!("Created playlist {}", name);
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new2(
        CommandId::PlaylistRename,
        move |obj, old: String, new: String| {
            if new.is_empty() {
                return Err(Error::InvalidInput("playlist name must not be empty".to_string()));
            }
            let activated = {
                let mut state = lock(&s);
                let old = state.resolve(&old);
                if state.playlists.contains_key(&new) {
                    return Err(Error::command(format!("playlist {} already exists", new)));
                }
                let entries = state
                    .playlists
                    .remove(&old)
                    .ok_or_else(|| Error::NotFound(format!("playlist {}", old)))?;
                state.playlists.insert(new.clone(), entries);
                info!("Renamed playlist {} to {}", old, new);

                if state.active == old {
                    state.active = new.clone();
                    true
                } else {
                    false
                }
            };

            if activated {
                obj.emit_value(SignalKind::PlaylistLoaded, new);
            }
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new1(
        CommandId::PlaylistDestroy,
        move |_, name: String| {
            let mut state = lock(&s);
            let name = state.resolve(&name);
            if name == state.active {
                return Err(Error::command(format!("cannot remove active playlist {}", name)));
            }
            state
                .playlists
                .remove(&name)
                .ok_or_else(|| Error::NotFound(format!("playlist {}", name)))?;
            info!("Removed playlist {}", name);
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new1(
        CommandId::PlaylistLoad,
        move |obj, name: String| {
            let position = {
                let mut state = lock(&s);
                let len = state.entries(&name)?.len();
                state.active = name.clone();
                state.current = if len > 0 { Some(0) } else { None };
                state.pending_next = None;
                state.current
            };

            info!("Loaded playlist {}", name);
            obj.emit_value(SignalKind::PlaylistLoaded, name);
            emit_position(obj, position);
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(CommandId::PlaylistList, move |_| {
        Ok(lock(&s).playlists.keys().cloned().collect::<Vec<String>>())
    }));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(
        CommandId::PlaylistCurrentActive,
        move |_| Ok(lock(&s).active.clone()),
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new2(
        CommandId::PlaylistAddId,
        move |obj, name: String, id: u32| {
            let (change, position) = {
                let mut state = lock(&s);
                let name = state.resolve(&name);
                let entries = state.entries_mut(&name)?;
                entries.push(id);
                let index = entries.len() - 1;
                let position = state.start_if_first(&name);

                let change = PlaylistChange {
                    kind: PlaylistChangeKind::Add,
                    id: Some(id),
                    position: Some(to_u32(index)),
                    new_position: None,
                    playlist: name,
                };
                (change, position)
            };
            emit_change(obj, change);
            emit_position(obj, position);
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new3(
        CommandId::PlaylistInsertId,
        move |obj, name: String, pos: u32, id: u32| {
            let (change, position) = {
                let mut state = lock(&s);
                let name = state.resolve(&name);
                let entries = state.entries_mut(&name)?;
                // Inserting at the length appends
                let index = check_index(pos, entries.len() + 1, "insert position")?;
                entries.insert(index, id);

                let mut position = None;
                if name == state.active {
                    if let Some(current) = state.current.filter(|c| *c >= index) {
                        state.current = Some(current + 1);
                        position = state.current;
                    }
                    if let Some(pending) = state.pending_next.filter(|p| *p >= index) {
                        state.pending_next = Some(pending + 1);
                    }
                }
                let position = position.or_else(|| state.start_if_first(&name));

                let change = PlaylistChange {
                    kind: PlaylistChangeKind::Insert,
                    id: Some(id),
                    position: Some(pos),
                    new_position: None,
                    playlist: name,
                };
                (change, position)
            };
            emit_change(obj, change);
            emit_position(obj, position);
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new2(
        CommandId::PlaylistRemoveEntry,
        move |obj, name: String, pos: u32| {
            let (change, position) = {
                let mut state = lock(&s);
                let name = state.resolve(&name);
                let entries = state.entries_mut(&name)?;
                let index = check_index(pos, entries.len(), "position")?;
                let id = entries.remove(index);
                let remaining = entries.len();

                let mut position = None;
                if name == state.active {
                    state.current = match state.current {
                        Some(c) if c > index => Some(c - 1),
                        Some(c) if c == index && remaining == 0 => None,
                        Some(c) if c == index => Some(c.min(remaining - 1)),
                        other => other,
                    };
                    if state.current.is_some() {
                        position = state.current;
                    }
                    state.pending_next = match state.pending_next {
                        Some(p) if p == index => None,
                        Some(p) if p > index => Some(p - 1),
                        other => other,
                    };
                }

                let change = PlaylistChange {
                    kind: PlaylistChangeKind::Remove,
                    id: Some(id),
                    position: Some(pos),
                    new_position: None,
                    playlist: name,
                };
                (change, position)
            };
            emit_change(obj, change);
            emit_position(obj, position);
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new3(
        CommandId::PlaylistMoveEntry,
        move |obj, name: String, from: u32, to: u32| {
            let (change, position) = {
                let mut state = lock(&s);
                let name = state.resolve(&name);
                let entries = state.entries_mut(&name)?;
                let len = entries.len();
                let from_index = check_index(from, len, "source position")?;
                let to_index = check_index(to, len, "destination position")?;

                let id = entries.remove(from_index);
                entries.insert(to_index, id);

                let mut position = None;
                if name == state.active {
                    let before = state.current;
                    state.current = before.map(|c| index_after_move(c, from_index, to_index));
                    if state.current != before {
                        position = state.current;
                    }
                    state.pending_next = state
                        .pending_next
                        .map(|p| index_after_move(p, from_index, to_index));
                }

                let change = PlaylistChange {
                    kind: PlaylistChangeKind::Move,
                    id: Some(id),
                    position: Some(from),
                    new_position: Some(to),
                    playlist: name,
                };
                (change, position)
            };
            emit_change(obj, change);
            emit_position(obj, position);
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new1(
        CommandId::PlaylistClear,
        move |obj, name: String| {
            let name = {
                let mut state = lock(&s);
                let name = state.resolve(&name);
                state.entries_mut(&name)?.clear();
                if name == state.active {
                    state.current = None;
                    state.pending_next = None;
                }
                name
            };
            emit_change(obj, PlaylistChange::whole(PlaylistChangeKind::Clear, name));
            Ok(())
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new1(
        CommandId::PlaylistListEntries,
        move |_, name: String| {
            let state = lock(&s);
            let name = state.resolve(&name);
            state.entries(&name).cloned()
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(
        CommandId::PlaylistCurrentPos,
        move |_| {
            let position = lock(&s).current.map_or(-1, |c| i32::try_from(c).unwrap_or(i32::MAX));
            Ok(position)
        },
    ));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new1(
        CommandId::PlaylistSetNext,
        move |_, pos: u32| {
            let mut state = lock(&s);
            let index = check_index(pos, state.active_len(), "position")?;
            state.pending_next = Some(index);
            debug!("Next entry set to position {}", index);
            Ok(pos)
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmx_common::CmdValue;

    fn add(store: &PlaylistStore, name: &str, ids: &[u32]) {
        for id in ids {
            store
                .object()
                .invoke(CommandId::PlaylistAddId, vec![name.into(), CmdValue::Uint32(*id)])
                .unwrap();
        }
    }

    fn signals(store: &PlaylistStore, kind: SignalKind) -> Arc<Mutex<Vec<CmdValue>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store
            .object()
            .connect_fn(kind, move |_, payload| sink.lock().unwrap().push(payload.clone()));
        seen
    }

    #[test]
    fn test_default_playlist_is_active() {
        let store = PlaylistStore::new();
        assert_eq!(store.active(), DEFAULT_PLAYLIST);
        assert!(store.entries("").unwrap().is_empty());
        assert_eq!(store.current_position(), None);
    }

    #[test]
    fn test_add_emits_change_record() {
        let store = PlaylistStore::new();
        let changes = signals(&store, SignalKind::PlaylistChanged);

        add(&store, "", &[10, 20]);

        assert_eq!(store.entries(DEFAULT_PLAYLIST).unwrap(), vec![10, 20]);
        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        let last = changes[1].as_playlist_change().unwrap();
        assert_eq!(last.kind, PlaylistChangeKind::Add);
        assert_eq!(last.playlist, DEFAULT_PLAYLIST);
        assert_eq!(last.id, Some(20));
        assert_eq!(last.position, Some(1));
    }

    /// The first entry added to the empty active playlist becomes current
    #[test]
    fn test_first_add_sets_current() {
        let store = PlaylistStore::new();
        let positions = signals(&store, SignalKind::PlaylistCurrentPos);

        add(&store, "", &[10, 20]);
        assert_eq!(store.current_position(), Some(0));
        assert_eq!(*positions.lock().unwrap(), vec![CmdValue::Uint32(0)]);
        assert_eq!(store.advance(), Some(20));

        // Other playlists never touch the current position
        let other = PlaylistStore::new();
        other
            .object()
            .invoke(CommandId::PlaylistCreate, vec!["Jazz".into()])
            .unwrap();
        add(&other, "Jazz", &[5]);
        assert_eq!(other.current_position(), None);

        // Same for an insert into the empty active playlist
        other
            .object()
            .invoke(
                CommandId::PlaylistInsertId,
                vec!["".into(), CmdValue::Uint32(0), CmdValue::Uint32(7)],
            )
            .unwrap();
        assert_eq!(other.current_id(), Some(7));
    }

    #[test]
    fn test_insert_at_length_appends() {
        let store = PlaylistStore::new();
        add(&store, "", &[1, 2]);
        store
            .object()
            .invoke(
                CommandId::PlaylistInsertId,
                vec!["".into(), CmdValue::Uint32(2), CmdValue::Uint32(3)],
            )
            .unwrap();
        assert_eq!(store.entries("").unwrap(), vec![1, 2, 3]);
    }

    /// Out-of-range indices are rejected and leave the playlist untouched
    #[test]
    fn test_out_of_range_index_rejected() {
        let store = PlaylistStore::new();
        add(&store, "", &[1, 2]);

        let err = store
            .object()
            .invoke(
                CommandId::PlaylistMoveEntry,
                vec!["".into(), CmdValue::Uint32(0), CmdValue::Uint32(5)],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));

        let err = store
            .object()
            .invoke(CommandId::PlaylistRemoveEntry, vec!["".into(), CmdValue::Uint32(2)])
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(store.entries("").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_move_entry() {
        let store = PlaylistStore::new();
        add(&store, "", &[1, 2, 3, 4, 5]);
        store
            .object()
            .invoke(
                CommandId::PlaylistMoveEntry,
                vec!["".into(), CmdValue::Uint32(3), CmdValue::Uint32(1)],
            )
            .unwrap();
        assert_eq!(store.entries("").unwrap(), vec![1, 4, 2, 3, 5]);
    }

    /// The current position follows the entry it points at across edits
    #[test]
    fn test_current_position_tracks_edits() {
        let store = PlaylistStore::new();
        add(&store, "", &[1, 2, 3, 4]);
        store
            .object()
            .invoke(CommandId::PlaylistLoad, vec![DEFAULT_PLAYLIST.into()])
            .unwrap();
        store.object().invoke(CommandId::PlaylistSetNext, vec![CmdValue::Uint32(2)]).unwrap();
        assert_eq!(store.advance(), Some(3));

        // Remove before current: shifts left
        store
            .object()
            .invoke(CommandId::PlaylistRemoveEntry, vec!["".into(), CmdValue::Uint32(0)])
            .unwrap();
        assert_eq!(store.current_position(), Some(1));
        assert_eq!(store.current_id(), Some(3));

        // Move current entry to the end
        store
            .object()
            .invoke(
                CommandId::PlaylistMoveEntry,
                vec!["".into(), CmdValue::Uint32(1), CmdValue::Uint32(2)],
            )
            .unwrap();
        assert_eq!(store.current_position(), Some(2));
        assert_eq!(store.current_id(), Some(3));

        store.object().invoke(CommandId::PlaylistClear, vec!["".into()]).unwrap();
        assert_eq!(store.current_position(), None);
        assert_eq!(
            store.object().invoke(CommandId::PlaylistCurrentPos, Vec::new()).unwrap(),
            CmdValue::Int32(-1)
        );
    }

    #[test]
    fn test_advance_without_pending_steps_forward() {
        let store = PlaylistStore::new();
        add(&store, "", &[7, 8]);
        store
            .object()
            .invoke(CommandId::PlaylistLoad, vec![DEFAULT_PLAYLIST.into()])
            .unwrap();
        assert_eq!(store.current_id(), Some(7));
        assert_eq!(store.advance(), Some(8));
        assert_eq!(store.advance(), None);
        assert_eq!(store.current_id(), Some(8));
    }

    #[test]
    fn test_set_next_out_of_range() {
        let store = PlaylistStore::new();
        add(&store, "", &[1]);
        let err = store
            .object()
            .invoke(CommandId::PlaylistSetNext, vec![CmdValue::Uint32(1)])
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }

    #[test]
    fn test_named_playlist_lifecycle() {
        let store = PlaylistStore::new();
        let loaded = signals(&store, SignalKind::PlaylistLoaded);
        let obj = store.object();

        obj.invoke(CommandId::PlaylistCreate, vec!["Jazz".into()]).unwrap();
        assert!(obj.invoke(CommandId::PlaylistCreate, vec!["Jazz".into()]).is_err());
        add(&store, "Jazz", &[5]);

        obj.invoke(CommandId::PlaylistLoad, vec!["Jazz".into()]).unwrap();
        assert_eq!(store.active(), "Jazz");
        assert_eq!(store.entries("").unwrap(), vec![5]);

        // The active playlist cannot be destroyed
        assert!(obj.invoke(CommandId::PlaylistDestroy, vec!["Jazz".into()]).is_err());

        obj.invoke(CommandId::PlaylistRename, vec!["Jazz".into(), "Bebop".into()])
            .unwrap();
        assert_eq!(
            obj.invoke(CommandId::PlaylistCurrentActive, Vec::new()).unwrap(),
            CmdValue::String("Bebop".to_string())
        );

        obj.invoke(CommandId::PlaylistDestroy, vec![DEFAULT_PLAYLIST.into()])
            .unwrap();
        assert_eq!(
            obj.invoke(CommandId::PlaylistList, Vec::new()).unwrap(),
            CmdValue::StringList(vec!["Bebop".to_string()])
        );

        assert_eq!(
            *loaded.lock().unwrap(),
            vec![CmdValue::from("Jazz"), CmdValue::from("Bebop")]
        );
    }

    #[test]
    fn test_unknown_playlist_not_found() {
        let store = PlaylistStore::new();
        let err = store
            .object()
            .invoke(CommandId::PlaylistListEntries, vec!["nope".into()])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_index_after_move() {
        // Moving 1 -> 3 in [a b c d e]
        assert_eq!(index_after_move(1, 1, 3), 3);
        assert_eq!(index_after_move(2, 1, 3), 1);
        assert_eq!(index_after_move(3, 1, 3), 2);
        assert_eq!(index_after_move(4, 1, 3), 4);
        // Moving 3 -> 1
        assert_eq!(index_after_move(1, 3, 1), 2);
        assert_eq!(index_after_move(0, 3, 1), 0);
    }
}
