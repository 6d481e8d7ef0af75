//! Signal kinds and signal events
//!
//! Signals are the notification half of the object bus: an object emits a
//! `SignalKind` with one tagged `CmdValue` payload and every handler connected
//! to that kind on that object is invoked. Events forwarded to remote clients
//! are wrapped in a `SignalEvent` carrying the emitting object's kind.

use crate::command::ObjectKind;
use crate::value::{CmdValue, ValueType};
use serde::{Deserialize, Serialize};

/// Event categories an object can emit
///
/// Discriminants are fixed; new kinds are appended, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum SignalKind {
    /// Reserved: emitted exactly once while an object is being torn down
    ObjectDestroyed = 0,
    /// Daemon is shutting down (payload: uptime seconds, uint32)
    Quit = 1,
    /// Playback status changed (payload: status code, uint32)
    PlaybackStatus = 2,
    /// Currently playing media id changed (uint32)
    PlaybackCurrentId = 3,
    /// Playtime tick (uint32 milliseconds)
    PlaybackPlaytime = 4,
    /// Output volume changed (dict channel -> uint32)
    OutputVolumeChanged = 5,
    /// Playlist contents changed (playlist-change record)
    PlaylistChanged = 6,
    /// Current position in the active playlist changed (uint32)
    PlaylistCurrentPos = 7,
    /// A different playlist became active (string)
    PlaylistLoaded = 8,
    /// A configuration value changed (dict key -> string)
    ConfigValueChanged = 9,
    /// Media library entry added (uint32)
    MedialibEntryAdded = 10,
    /// Media library entry changed (uint32)
    MedialibEntryChanged = 11,
    /// A saved collection changed (dict)
    CollectionChanged = 12,
}

impl SignalKind {
    /// Every signal kind, in discriminant order
    pub const ALL: &'static [SignalKind] = &[
        SignalKind::ObjectDestroyed,
        SignalKind::Quit,
        SignalKind::PlaybackStatus,
        SignalKind::PlaybackCurrentId,
        SignalKind::PlaybackPlaytime,
        SignalKind::OutputVolumeChanged,
        SignalKind::PlaylistChanged,
        SignalKind::PlaylistCurrentPos,
        SignalKind::PlaylistLoaded,
        SignalKind::ConfigValueChanged,
        SignalKind::MedialibEntryAdded,
        SignalKind::MedialibEntryChanged,
        SignalKind::CollectionChanged,
    ];

    /// Decode a signal kind from its wire discriminant
    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| *kind as u32 == raw)
    }

    /// Payload tag receivers should expect for this kind
    pub fn payload_type(&self) -> ValueType {
        match self {
            SignalKind::ObjectDestroyed => ValueType::None,
            SignalKind::Quit
            | SignalKind::PlaybackStatus
            | SignalKind::PlaybackCurrentId
            | SignalKind::PlaybackPlaytime
            | SignalKind::PlaylistCurrentPos
            | SignalKind::MedialibEntryAdded
            | SignalKind::MedialibEntryChanged => ValueType::Uint32,
            SignalKind::PlaylistLoaded => ValueType::String,
            SignalKind::OutputVolumeChanged
            | SignalKind::ConfigValueChanged
            | SignalKind::CollectionChanged => ValueType::Dict,
            SignalKind::PlaylistChanged => ValueType::PlaylistChanged,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A signal as seen by remote subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// Kind of the object that emitted the signal
    pub object: ObjectKind,
    /// Signal kind
    pub kind: SignalKind,
    /// Tagged payload
    pub payload: CmdValue,
    /// When the signal was emitted
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SignalEvent {
    pub fn new(object: ObjectKind, kind: SignalKind, payload: CmdValue) -> Self {
        Self {
            object,
            kind,
            payload,
            timestamp: crate::time::now(),
        }
    }

    /// Get event kind as string for filtering
    pub fn event_type(&self) -> String {
        self.kind.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_kind_round_trip_through_discriminant() {
        for kind in SignalKind::ALL {
            assert_eq!(SignalKind::from_u32(*kind as u32), Some(*kind));
        }
        assert_eq!(SignalKind::from_u32(1000), None);
    }

    #[test]
    fn test_object_destroyed_is_reserved_zero() {
        assert_eq!(SignalKind::ObjectDestroyed as u32, 0);
        assert_eq!(SignalKind::ObjectDestroyed.payload_type(), ValueType::None);
    }

    #[test]
    fn test_signal_event_serialization() {
        let event = SignalEvent::new(
            ObjectKind::Playlist,
            SignalKind::PlaylistCurrentPos,
            CmdValue::Uint32(4),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: SignalEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.event_type(), "PlaylistCurrentPos");
    }
}
