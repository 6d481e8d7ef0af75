//! Playback control object
//!
//! Tracks transport state and per-channel output volume. There is no audio
//! path; the object exists so clients and the playlist store have something
//! to start, stop and tickle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmx_common::value::CmdDict;
use mmx_common::{CmdValue, CommandId, Error, ObjectKind, SignalKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dispatch::CommandDescriptor;
use crate::object::{ManagedObject, ObjectRef};
use crate::playlist::PlaylistStore;

/// Transport state, carried on the wire as its `u32` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum PlaybackStatus {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackStatus {
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PlaybackStatus::Stopped),
            1 => Some(PlaybackStatus::Playing),
            2 => Some(PlaybackStatus::Paused),
            _ => None,
        }
    }
}

/// Volume channels known to the output
pub const CHANNELS: [&str; 2] = ["left", "right"];

/// Highest accepted volume
pub const MAX_VOLUME: u32 = 100;

#[derive(Debug)]
struct PlaybackState {
    status: PlaybackStatus,
    volume: BTreeMap<String, u32>,
}

fn lock(state: &Mutex<PlaybackState>) -> MutexGuard<'_, PlaybackState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn volume_dict(volume: &BTreeMap<String, u32>) -> CmdDict {
    volume
        .iter()
        .map(|(channel, value)| (channel.clone(), CmdValue::Uint32(*value)))
        .collect()
}

/// Playback object
#[derive(Clone)]
pub struct Playback {
    object: ObjectRef,
    state: Arc<Mutex<PlaybackState>>,
}

impl Playback {
    pub fn new(playlist: PlaylistStore, initial_volume: u32) -> Self {
        let object = ObjectRef::new(ObjectKind::Playback);
        let volume = CHANNELS
            .iter()
            .map(|c| (c.to_string(), initial_volume.min(MAX_VOLUME)))
            .collect();
        let state = Arc::new(Mutex::new(PlaybackState {
            status: PlaybackStatus::Stopped,
            volume,
        }));
        register_commands(&object, &state, playlist);
        Self { object, state }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.state).status
    }

    pub fn volume(&self, channel: &str) -> Option<u32> {
        lock(&self.state).volume.get(channel).copied()
    }
}

fn set_status(state: &Mutex<PlaybackState>, object: &ManagedObject, status: PlaybackStatus) {
    let changed = {
        let mut state = lock(state);
        let changed = state.status != status;
        state.status = status;
        changed
    };

    if changed {
        info!("Playback status: {:?}", status);
        object.emit_value(SignalKind::PlaybackStatus, status as u32);
    }
}

fn register_commands(object: &ObjectRef, state: &Arc<Mutex<PlaybackState>>, playlist: PlaylistStore) {
    let s = Arc::clone(state);
    let pl = playlist.clone();
    object.register_command(CommandDescriptor::new0(CommandId::Start, move |obj| {
        set_status(&s, obj, PlaybackStatus::Playing);
        if let Some(id) = pl.current_id() {
            obj.emit_value(SignalKind::PlaybackCurrentId, id);
        }
        Ok(())
    }));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(CommandId::Stop, move |obj| {
        set_status(&s, obj, PlaybackStatus::Stopped);
        Ok(())
    }));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(CommandId::Pause, move |obj| {
        set_status(&s, obj, PlaybackStatus::Paused);
        Ok(())
    }));

    // Jump to whatever the playlist considers next
    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(CommandId::Tickle, move |obj| {
        match playlist.advance() {
            Some(id) => {
                debug!("Tickle: now at media id {}", id);
                if lock(&s).status == PlaybackStatus::Playing {
                    obj.emit_value(SignalKind::PlaybackCurrentId, id);
                }
            }
            None => {
                debug!("Tickle: end of playlist");
                set_status(&s, obj, PlaybackStatus::Stopped);
            }
        }
        Ok(())
    }));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(CommandId::PlaybackStatus, move |_| {
        Ok(lock(&s).status as u32)
    }));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new0(CommandId::VolumeGet, move |_| {
        Ok(volume_dict(&lock(&s).volume))
    }));

    let s = Arc::clone(state);
    object.register_command(CommandDescriptor::new2(
        CommandId::VolumeSet,
        move |obj, channel: String, value: u32| {
            if value > MAX_VOLUME {
                return Err(Error::InvalidInput(format!(
                    "volume {} above maximum {}",
                    value, MAX_VOLUME
                )));
            }

            let changed = {
                let mut state = lock(&s);
                let slot = state
                    .volume
                    .get_mut(&channel)
                    .ok_or_else(|| Error::command(format!("unknown volume channel {}", channel)))?;
                if *slot == value {
                    None
                } else {
                    *slot = value;
                    Some(volume_dict(&state.volume))
                }
            };

            if let Some(volume) = changed {
                obj.emit_value(SignalKind::OutputVolumeChanged, volume);
            }
            Ok(())
        },
    ));
}
