//! Tagged values carried by commands and signals
//!
//! A `CmdValue` is the single payload type for command arguments, command
//! results and signal emissions. The variant *is* the tag: a reader asks for
//! the type it expects and gets a `TypeMismatch` error at the boundary if the
//! writer used a different one. Nothing is ever reinterpreted.

use crate::collection::Collection;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// String-keyed mapping payload
pub type CmdDict = BTreeMap<String, CmdValue>;

/// Declared type of a command argument, command result or signal payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    None,
    Int32,
    Uint32,
    String,
    IntList,
    UintList,
    StringList,
    Dict,
    DictList,
    PlaylistChanged,
    Collection,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::None => "none",
            ValueType::Int32 => "int32",
            ValueType::Uint32 => "uint32",
            ValueType::String => "string",
            ValueType::IntList => "intlist",
            ValueType::UintList => "uintlist",
            ValueType::StringList => "stringlist",
            ValueType::Dict => "dict",
            ValueType::DictList => "dictlist",
            ValueType::PlaylistChanged => "playlist-changed",
            ValueType::Collection => "collection",
        };
        write!(f, "{}", name)
    }
}

/// What happened to a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistChangeKind {
    Add,
    Insert,
    Remove,
    Move,
    Clear,
    Shuffle,
    Sort,
    Update,
}

/// Playlist change record carried by the `PlaylistChanged` signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistChange {
    /// Kind of change
    pub kind: PlaylistChangeKind,
    /// Name of the playlist that changed
    pub playlist: String,
    /// Media id affected (add/insert/remove/move)
    pub id: Option<u32>,
    /// Position affected (source position for moves)
    pub position: Option<u32>,
    /// Destination position for moves
    pub new_position: Option<u32>,
}

impl PlaylistChange {
    /// Change record without id or positions (clear, shuffle, sort, update)
    pub fn whole(kind: PlaylistChangeKind, playlist: impl Into<String>) -> Self {
        Self {
            kind,
            playlist: playlist.into(),
            id: None,
            position: None,
            new_position: None,
        }
    }
}

/// Tagged command/signal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CmdValue {
    None,
    Int32(i32),
    Uint32(u32),
    String(String),
    IntList(Vec<i32>),
    UintList(Vec<u32>),
    StringList(Vec<String>),
    Dict(CmdDict),
    DictList(Vec<CmdDict>),
    PlaylistChanged(PlaylistChange),
    Collection(Collection),
}

impl CmdValue {
    /// Tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            CmdValue::None => ValueType::None,
            CmdValue::Int32(_) => ValueType::Int32,
            CmdValue::Uint32(_) => ValueType::Uint32,
            CmdValue::String(_) => ValueType::String,
            CmdValue::IntList(_) => ValueType::IntList,
            CmdValue::UintList(_) => ValueType::UintList,
            CmdValue::StringList(_) => ValueType::StringList,
            CmdValue::Dict(_) => ValueType::Dict,
            CmdValue::DictList(_) => ValueType::DictList,
            CmdValue::PlaylistChanged(_) => ValueType::PlaylistChanged,
            CmdValue::Collection(_) => ValueType::Collection,
        }
    }

    /// Build a value from anything with a declared tag
    pub fn from_typed<T: IntoCmdValue>(value: T) -> Self {
        value.into_cmd_value()
    }

    /// Read this value as `T`, failing if the tag differs
    pub fn into_typed<T: FromCmdValue>(self) -> Result<T> {
        T::from_cmd_value(self)
    }

    fn mismatch(&self, expected: ValueType) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.value_type(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CmdValue::None)
    }

    pub fn as_i32(&self) -> Result<i32> {
        match self {
            CmdValue::Int32(v) => Ok(*v),
            other => Err(other.mismatch(ValueType::Int32)),
        }
    }

    pub fn as_u32(&self) -> Result<u32> {
        match self {
            CmdValue::Uint32(v) => Ok(*v),
            other => Err(other.mismatch(ValueType::Uint32)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            CmdValue::String(v) => Ok(v),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    pub fn as_uint_list(&self) -> Result<&[u32]> {
        match self {
            CmdValue::UintList(v) => Ok(v),
            other => Err(other.mismatch(ValueType::UintList)),
        }
    }

    pub fn as_string_list(&self) -> Result<&[String]> {
        match self {
            CmdValue::StringList(v) => Ok(v),
            other => Err(other.mismatch(ValueType::StringList)),
        }
    }

    pub fn as_dict(&self) -> Result<&CmdDict> {
        match self {
            CmdValue::Dict(v) => Ok(v),
            other => Err(other.mismatch(ValueType::Dict)),
        }
    }

    pub fn as_playlist_change(&self) -> Result<&PlaylistChange> {
        match self {
            CmdValue::PlaylistChanged(v) => Ok(v),
            other => Err(other.mismatch(ValueType::PlaylistChanged)),
        }
    }

    pub fn as_collection(&self) -> Result<&Collection> {
        match self {
            CmdValue::Collection(v) => Ok(v),
            other => Err(other.mismatch(ValueType::Collection)),
        }
    }

    /// Read a list of media ids
    ///
    /// Query results arrive as signed `IntList` while playlist listings are
    /// `UintList`; both are accepted. Negative ids are rejected.
    pub fn to_id_list(&self) -> Result<Vec<u32>> {
        match self {
            CmdValue::UintList(v) => Ok(v.clone()),
            CmdValue::IntList(v) => v
                .iter()
                .map(|id| {
                    u32::try_from(*id)
                        .map_err(|_| Error::InvalidInput(format!("negative media id {}", id)))
                })
                .collect(),
            other => Err(other.mismatch(ValueType::UintList)),
        }
    }
}

/// Types that can be written into a `CmdValue` under a fixed tag
pub trait IntoCmdValue {
    const VALUE_TYPE: ValueType;

    fn into_cmd_value(self) -> CmdValue;
}

/// Types that can be read out of a `CmdValue` carrying a fixed tag
pub trait FromCmdValue: Sized {
    const VALUE_TYPE: ValueType;

    fn from_cmd_value(value: CmdValue) -> Result<Self>;
}

macro_rules! typed_value {
    ($ty:ty, $variant:ident) => {
        impl IntoCmdValue for $ty {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            fn into_cmd_value(self) -> CmdValue {
                CmdValue::$variant(self)
            }
        }

        impl FromCmdValue for $ty {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            fn from_cmd_value(value: CmdValue) -> Result<Self> {
                match value {
                    CmdValue::$variant(v) => Ok(v),
                    other => Err(Error::TypeMismatch {
                        expected: ValueType::$variant,
                        found: other.value_type(),
                    }),
                }
            }
        }

        impl From<$ty> for CmdValue {
            fn from(value: $ty) -> Self {
                CmdValue::$variant(value)
            }
        }
    };
}

typed_value!(i32, Int32);
typed_value!(u32, Uint32);
typed_value!(String, String);
typed_value!(Vec<i32>, IntList);
typed_value!(Vec<u32>, UintList);
typed_value!(Vec<String>, StringList);
typed_value!(CmdDict, Dict);
typed_value!(Vec<CmdDict>, DictList);
typed_value!(PlaylistChange, PlaylistChanged);
typed_value!(Collection, Collection);

impl IntoCmdValue for () {
    const VALUE_TYPE: ValueType = ValueType::None;

    fn into_cmd_value(self) -> CmdValue {
        CmdValue::None
    }
}

impl FromCmdValue for () {
    const VALUE_TYPE: ValueType = ValueType::None;

    fn from_cmd_value(value: CmdValue) -> Result<Self> {
        match value {
            CmdValue::None => Ok(()),
            other => Err(Error::TypeMismatch {
                expected: ValueType::None,
                found: other.value_type(),
            }),
        }
    }
}

impl IntoCmdValue for &str {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn into_cmd_value(self) -> CmdValue {
        CmdValue::String(self.to_string())
    }
}

impl From<&str> for CmdValue {
    fn from(value: &str) -> Self {
        CmdValue::String(value.to_string())
    }
}

impl From<()> for CmdValue {
    fn from(_: ()) -> Self {
        CmdValue::None
    }
}
