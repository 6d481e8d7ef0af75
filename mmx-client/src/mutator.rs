//! Playlist mutation batches
//!
//! The daemon only understands single-step edits: insert one id, move one
//! entry, remove one entry, set the next position. Higher level operations
//! (remove everything matching a query, move matches to a position, ...)
//! are planned here as a sequence of such steps against a client-side
//! snapshot, with the index of every step adjusted for the steps before it.
//!
//! Planning is pure (`plan_*`) and can be checked without a daemon.
//! [`PlaylistMutator`] runs the query, plans, and sends the steps in order.
//! Steps are not transactional: when one fails, the earlier ones stay
//! applied and the error says how far the batch got.

use std::fmt;

use mmx_common::{CmdValue, Collection, CommandId, Connection, ObjectKind};
use tracing::{debug, warn};

use crate::cache::PlaylistCache;
use crate::matched::MatchedIdSet;
use crate::positions::PlaylistPositions;
use crate::{Error, Result};

/// One single-step playlist edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistCommand {
    InsertAt { pos: usize, id: u32 },
    Move { from: usize, to: usize },
    RemoveAt { pos: usize },
    SetNext { pos: usize },
    Tickle,
}

impl fmt::Display for PlaylistCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaylistCommand::InsertAt { pos, id } => write!(f, "insert-at({}, {})", pos, id),
            PlaylistCommand::Move { from, to } => write!(f, "move({}, {})", from, to),
            PlaylistCommand::RemoveAt { pos } => write!(f, "remove-at({})", pos),
            PlaylistCommand::SetNext { pos } => write!(f, "set-next({})", pos),
            PlaylistCommand::Tickle => write!(f, "tickle"),
        }
    }
}

fn wire_index(index: usize) -> mmx_common::Result<CmdValue> {
    u32::try_from(index)
        .map(CmdValue::Uint32)
        .map_err(|_| mmx_common::Error::InvalidInput(format!("position {} out of range", index)))
}

impl PlaylistCommand {
    /// Target object, command id and arguments for this step on `playlist`
    fn request(&self, playlist: &str) -> mmx_common::Result<(ObjectKind, CommandId, Vec<CmdValue>)> {
        let name = || CmdValue::String(playlist.to_string());
        Ok(match *self {
            PlaylistCommand::InsertAt { pos, id } => (
                ObjectKind::Playlist,
                CommandId::PlaylistInsertId,
                vec![name(), wire_index(pos)?, CmdValue::Uint32(id)],
            ),
            PlaylistCommand::Move { from, to } => (
                ObjectKind::Playlist,
                CommandId::PlaylistMoveEntry,
                vec![name(), wire_index(from)?, wire_index(to)?],
            ),
            PlaylistCommand::RemoveAt { pos } => (
                ObjectKind::Playlist,
                CommandId::PlaylistRemoveEntry,
                vec![name(), wire_index(pos)?],
            ),
            PlaylistCommand::SetNext { pos } => (
                ObjectKind::Playlist,
                CommandId::PlaylistSetNext,
                vec![wire_index(pos)?],
            ),
            PlaylistCommand::Tickle => (ObjectKind::Playback, CommandId::Tickle, Vec::new()),
        })
    }
}

/// Search direction for [`plan_jump`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Result of a jump request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpOutcome {
    /// set-next and tickle were sent
    Jumped { position: usize },
    /// No other entry in the playlist matched; nothing was sent
    NoMatch,
}

/// Insert `ids` in order starting at `pos`
pub fn plan_insert(ids: &[u32], pos: usize) -> Vec<PlaylistCommand> {
    ids.iter()
        .enumerate()
        .map(|(i, &id)| PlaylistCommand::InsertAt { pos: pos + i, id })
        .collect()
}

/// Remove explicit positions, highest first so lower ones never shift
pub fn plan_remove_positions(positions: &PlaylistPositions, len: usize) -> Vec<PlaylistCommand> {
    positions
        .descending(len)
        .into_iter()
        .map(|pos| PlaylistCommand::RemoveAt { pos })
        .collect()
}

/// Remove every matching entry in one ascending pass
///
/// Each removal shifts the rest of the playlist left by one, so the index
/// sent is the raw index minus the removals already issued.
pub fn plan_remove_matching(playlist: &[u32], matched: &MatchedIdSet) -> Vec<PlaylistCommand> {
    let mut removed = 0;
    let mut commands = Vec::new();

    for (index, &id) in playlist.iter().enumerate() {
        if matched.contains(id) {
            commands.push(PlaylistCommand::RemoveAt { pos: index - removed });
            removed += 1;
        }
    }

    commands
}

/// Remove every matching entry walking the snapshot from the end
///
/// Raw indices are sent unchanged: removing from the tail never moves an
/// entry that is still to be visited.
pub fn plan_remove_cached(playlist: &[u32], matched: &MatchedIdSet) -> Vec<PlaylistCommand> {
    playlist
        .iter()
        .enumerate()
        .rev()
        .filter(|&(_, &id)| matched.contains(id))
        .map(|(pos, _)| PlaylistCommand::RemoveAt { pos })
        .collect()
}

/// Remove entries matched, in order, against `ordered`
///
/// A single cursor walks `ordered` alongside the playlist. For each playlist
/// slot the cursor scans forward, consuming every entry it passes. On a hit
/// the slot is removed and the matching entry is consumed too. A slot with no
/// hit exhausts `ordered`, so every later slot is left untouched.
pub fn plan_remove_ordered(playlist: &[u32], ordered: &[u32]) -> Vec<PlaylistCommand> {
    let mut remaining = ordered.iter();
    let mut removed = 0;
    let mut commands = Vec::new();

    for (index, &id) in playlist.iter().enumerate() {
        if remaining.any(|&m| m == id) {
            commands.push(PlaylistCommand::RemoveAt { pos: index - removed });
            removed += 1;
        }
    }

    commands
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MovePhase {
    /// Scanning entries before the target; matches are stacked just before it
    Forward { moved: usize },
    /// Scanning from the target on; matches are appended after the block
    Backward { moved: usize },
}

/// Gather matching entries into one block at `pos`, keeping their order
///
/// Entries before `pos` are pulled to `pos - 1`; every earlier pull shifted
/// the source left by one. Entries at or after `pos` are unshifted by the
/// forward moves and go to `pos + n` for the n-th of them. A target past the
/// end is treated as the end.
pub fn plan_move_matching(playlist: &[u32], matched: &MatchedIdSet, pos: usize) -> Vec<PlaylistCommand> {
    let pos = pos.min(playlist.len());
    let mut phase = MovePhase::Forward { moved: 0 };
    let mut commands = Vec::new();

    for (curr, &id) in playlist.iter().enumerate() {
        if curr == pos {
            phase = MovePhase::Backward { moved: 0 };
        }
        if !matched.contains(id) {
            continue;
        }

        match &mut phase {
            MovePhase::Forward { moved } => {
                commands.push(PlaylistCommand::Move {
                    from: curr - *moved,
                    to: pos - 1,
                });
                *moved += 1;
            }
            MovePhase::Backward { moved } => {
                commands.push(PlaylistCommand::Move {
                    from: curr,
                    to: pos + *moved,
                });
                *moved += 1;
            }
        }
    }

    commands
}

/// Gather explicit positions into one block at `pos`
///
/// Positions are visited highest first. Those at or after `pos` are moved
/// to `pos`; each such move shifts the lower, unvisited ones right by one.
/// Those before `pos` then fill in backwards from `pos - 1`.
pub fn plan_move_positions(positions: &PlaylistPositions, len: usize, pos: usize) -> Vec<PlaylistCommand> {
    let pos = pos.min(len);
    let mut backward = 0;
    let mut forward = 0;
    let mut commands = Vec::new();

    for curr in positions.descending(len) {
        if curr >= pos {
            commands.push(PlaylistCommand::Move {
                from: curr + backward,
                to: pos,
            });
            backward += 1;
        } else {
            commands.push(PlaylistCommand::Move {
                from: curr,
                to: pos - 1 - forward,
            });
            forward += 1;
        }
    }

    commands
}

/// Next matching position after `current`, wrapping around
///
/// The start slot itself is never a candidate. `None` when nothing else
/// matches or the playlist is empty.
pub fn plan_jump(
    playlist: &[u32],
    current: Option<usize>,
    direction: Direction,
    matched: &MatchedIdSet,
) -> Option<usize> {
    let len = playlist.len();
    if len == 0 {
        return None;
    }

    let start = current.map_or(0, |c| c % len);
    let step = match direction {
        Direction::Forward => 1,
        Direction::Backward => len - 1,
    };

    let mut index = (start + step) % len;
    while index != start {
        if matched.contains(playlist[index]) {
            return Some(index);
        }
        index = (index + step) % len;
    }
    None
}

fn ensure_fresh(cache: &PlaylistCache) -> Result<()> {
    if cache.is_valid() {
        Ok(())
    } else {
        Err(Error::StaleCache)
    }
}

fn run_batch<C: Connection>(conn: &mut C, playlist: &str, commands: &[PlaylistCommand]) -> Result<usize> {
    for (step, command) in commands.iter().enumerate() {
        let result = command
            .request(playlist)
            .and_then(|(object, id, args)| conn.call(object, id, args));

        if let Err(source) = result {
            warn!("Batch step {} ({}) failed after {} applied: {}", step, command, step, source);
            return Err(Error::Batch {
                step,
                command: *command,
                applied: step,
                source,
            });
        }
    }

    debug!("Applied {} step(s) to playlist {:?}", commands.len(), playlist);
    Ok(commands.len())
}

/// Runs planned batches against a daemon connection
pub struct PlaylistMutator<C: Connection> {
    conn: C,
    playlist: String,
}

impl<C: Connection> PlaylistMutator<C> {
    /// Mutator for `playlist`; an empty name targets the active playlist
    pub fn new(conn: C, playlist: impl Into<String>) -> Self {
        Self {
            conn,
            playlist: playlist.into(),
        }
    }

    pub fn playlist(&self) -> &str {
        &self.playlist
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Evaluate `query` into ordered media ids
    pub fn query_ids(&mut self, query: &Collection) -> Result<Vec<u32>> {
        self.conn
            .call(
                ObjectKind::Collection,
                CommandId::CollectionQueryIds,
                vec![CmdValue::Collection(query.clone())],
            )
            .and_then(|ids| ids.to_id_list())
            .map_err(Error::Query)
    }

    /// Send `commands` in order, stopping at the first failure
    ///
    /// Returns the number of steps applied.
    pub fn apply(&mut self, commands: &[PlaylistCommand]) -> Result<usize> {
        run_batch(&mut self.conn, &self.playlist, commands)
    }

    /// Insert `ids` starting at `pos`; returns how many were added
    pub fn add_list(&mut self, ids: &[u32], pos: usize) -> Result<usize> {
        self.apply(&plan_insert(ids, pos))
    }

    /// Remove the entries at `positions` of a playlist of length `len`
    pub fn remove_positions(&mut self, positions: &PlaylistPositions, len: usize) -> Result<usize> {
        self.apply(&plan_remove_positions(positions, len))
    }

    /// Move the entries at `positions` into one block at `pos`
    pub fn move_positions(&mut self, positions: &PlaylistPositions, len: usize, pos: usize) -> Result<usize> {
        self.apply(&plan_move_positions(positions, len, pos))
    }

    /// Remove every entry of `playlist` matched by `query`
    pub fn remove_matching(&mut self, playlist: &[u32], query: &Collection) -> Result<usize> {
        let matched = MatchedIdSet::build(self.query_ids(query)?);
        self.apply(&plan_remove_matching(playlist, &matched))
    }

    /// Remove every entry of the cached active playlist matched by `query`
    ///
    /// The steps always target the playlist the cache was taken from, not
    /// the one this mutator was created for.
    pub fn remove_cached(&mut self, cache: &PlaylistCache, query: &Collection) -> Result<usize> {
        ensure_fresh(cache)?;
        let matched = MatchedIdSet::build(self.query_ids(query)?);
        let commands = plan_remove_cached(cache.entries(), &matched);
        run_batch(&mut self.conn, cache.active_name(), &commands)
    }

    /// Remove entries of `playlist` matched in order by the ids `query` returns
    pub fn remove_ordered(&mut self, playlist: &[u32], query: &Collection) -> Result<usize> {
        let ordered = self.query_ids(query)?;
        self.apply(&plan_remove_ordered(playlist, &ordered))
    }

    /// Move every entry of `playlist` matched by `query` into one block at `pos`
    pub fn move_matching(&mut self, playlist: &[u32], query: &Collection, pos: usize) -> Result<usize> {
        let matched = MatchedIdSet::build(self.query_ids(query)?);
        self.apply(&plan_move_matching(playlist, &matched, pos))
    }

    /// Jump to the next entry in `direction` matched by `query`
    pub fn jump(&mut self, cache: &PlaylistCache, query: &Collection, direction: Direction) -> Result<JumpOutcome> {
        ensure_fresh(cache)?;
        let matched = MatchedIdSet::build(self.query_ids(query)?);
        match plan_jump(cache.entries(), cache.current_position(), direction, &matched) {
            Some(position) => {
                self.apply(&[
                    PlaylistCommand::SetNext { pos: position },
                    PlaylistCommand::Tickle,
                ])?;
                Ok(JumpOutcome::Jumped { position })
            }
            None => {
                debug!("No media matching the pattern in the playlist");
                Ok(JumpOutcome::NoMatch)
            }
        }
    }
}
