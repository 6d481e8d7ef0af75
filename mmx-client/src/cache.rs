//! Client-side copy of the active playlist
//!
//! Mutation batches compute their indices from this snapshot. It is trusted
//! until a change notification for the active playlist arrives, after which
//! it must be refreshed before the next batch.

use mmx_common::{CmdValue, CommandId, Connection, ObjectKind, SignalEvent, SignalKind};
use tracing::debug;

use crate::Result;

/// Snapshot of the active playlist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistCache {
    active_name: String,
    entries: Vec<u32>,
    current: Option<usize>,
    valid: bool,
}

impl PlaylistCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache built from known contents, marked valid
    pub fn from_parts(active_name: impl Into<String>, entries: Vec<u32>, current: Option<usize>) -> Self {
        Self {
            active_name: active_name.into(),
            entries,
            current,
            valid: true,
        }
    }

    /// Reload name, entries and current position from the daemon
    pub fn refresh<C: Connection>(&mut self, conn: &mut C) -> Result<()> {
        let name = conn.call(ObjectKind::Playlist, CommandId::PlaylistCurrentActive, Vec::new())?;
        let entries = conn.call(
            ObjectKind::Playlist,
            CommandId::PlaylistListEntries,
            vec![CmdValue::String(String::new())],
        )?;
        let position = conn.call(ObjectKind::Playlist, CommandId::PlaylistCurrentPos, Vec::new())?;

        self.active_name = name.as_str()?.to_string();
        self.entries = entries.to_id_list()?;
        self.current = usize::try_from(position.as_i32()?).ok();
        self.valid = true;

        debug!(
            "Playlist cache refreshed: {} ({} entries)",
            self.active_name,
            self.entries.len()
        );
        Ok(())
    }

    /// Track a forwarded signal
    ///
    /// Position updates are applied directly; content changes to the active
    /// playlist and playlist switches invalidate the snapshot.
    pub fn apply_event(&mut self, event: &SignalEvent) {
        match event.kind {
            SignalKind::PlaylistCurrentPos => {
                if let Ok(position) = event.payload.as_u32() {
                    self.current = Some(position as usize);
                }
            }
            SignalKind::PlaylistChanged => {
                let affects_active = event
                    .payload
                    .as_playlist_change()
                    .map_or(true, |change| change.playlist == self.active_name);
                if affects_active {
                    self.invalidate();
                }
            }
            SignalKind::PlaylistLoaded => self.invalidate(),
            _ => {}
        }
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn active_name(&self) -> &str {
        &self.active_name
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    pub fn current_position(&self) -> Option<usize> {
        self.current
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
