//! Command id and object kind namespaces
//!
//! Both enums are part of the wire contract: discriminants are fixed and new
//! values are only ever appended, never renumbered or reused.

use serde::{Deserialize, Serialize};

/// Object categories known to the daemon
///
/// Every ManagedObject carries one of these as its type tag, and the IPC
/// router uses it to address inbound command invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum ObjectKind {
    Main = 0,
    Playlist = 1,
    Config = 2,
    Playback = 3,
    Collection = 4,
    Medialib = 5,
    Visualization = 6,
    /// Objects owned by external plugins (output, transport, decoder)
    Plugin = 7,
}

impl ObjectKind {
    /// Decode an object kind from its wire discriminant
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => ObjectKind::Main,
            1 => ObjectKind::Playlist,
            2 => ObjectKind::Config,
            3 => ObjectKind::Playback,
            4 => ObjectKind::Collection,
            5 => ObjectKind::Medialib,
            6 => ObjectKind::Visualization,
            7 => ObjectKind::Plugin,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Main => "main",
            ObjectKind::Playlist => "playlist",
            ObjectKind::Config => "config",
            ObjectKind::Playback => "playback",
            ObjectKind::Collection => "collection",
            ObjectKind::Medialib => "medialib",
            ObjectKind::Visualization => "visualization",
            ObjectKind::Plugin => "plugin",
        };
        write!(f, "{}", name)
    }
}

/// Operations an object can handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum CommandId {
    // Main object
    Hello = 0,
    Quit = 1,
    Status = 2,
    PluginList = 3,

    // Playback
    Start = 16,
    Stop = 17,
    Pause = 18,
    Tickle = 19,
    PlaybackStatus = 20,
    VolumeGet = 21,
    VolumeSet = 22,

    // Playlist
    PlaylistCreate = 32,
    PlaylistRename = 33,
    PlaylistDestroy = 34,
    PlaylistLoad = 35,
    PlaylistList = 36,
    PlaylistAddId = 37,
    PlaylistInsertId = 38,
    PlaylistRemoveEntry = 39,
    PlaylistMoveEntry = 40,
    PlaylistClear = 41,
    PlaylistListEntries = 42,
    PlaylistCurrentPos = 43,
    PlaylistSetNext = 44,
    PlaylistCurrentActive = 45,

    // Config
    ConfigRegister = 64,
    ConfigGet = 65,
    ConfigSet = 66,
    ConfigList = 67,

    // Collections
    CollectionSave = 80,
    CollectionGet = 81,
    CollectionList = 82,
    CollectionRemove = 83,
    CollectionQueryIds = 84,
}

impl CommandId {
    /// Every command id, in discriminant order
    pub const ALL: &'static [CommandId] = &[
        CommandId::Hello,
        CommandId::Quit,
        CommandId::Status,
        CommandId::PluginList,
        CommandId::Start,
        CommandId::Stop,
        CommandId::Pause,
        CommandId::Tickle,
        CommandId::PlaybackStatus,
        CommandId::VolumeGet,
        CommandId::VolumeSet,
        CommandId::PlaylistCreate,
        CommandId::PlaylistRename,
        CommandId::PlaylistDestroy,
        CommandId::PlaylistLoad,
        CommandId::PlaylistList,
        CommandId::PlaylistAddId,
        CommandId::PlaylistInsertId,
        CommandId::PlaylistRemoveEntry,
        CommandId::PlaylistMoveEntry,
        CommandId::PlaylistClear,
        CommandId::PlaylistListEntries,
        CommandId::PlaylistCurrentPos,
        CommandId::PlaylistSetNext,
        CommandId::PlaylistCurrentActive,
        CommandId::ConfigRegister,
        CommandId::ConfigGet,
        CommandId::ConfigSet,
        CommandId::ConfigList,
        CommandId::CollectionSave,
        CommandId::CollectionGet,
        CommandId::CollectionList,
        CommandId::CollectionRemove,
        CommandId::CollectionQueryIds,
    ];

    /// Decode a command id from its wire discriminant
    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| *id as u32 == raw)
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
