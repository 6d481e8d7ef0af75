//! Client-side transport contract
//!
//! The byte-level IPC protocol lives elsewhere; everything above it only
//! needs a synchronous call that delivers one command to one daemon object
//! and returns its tagged result. Implementations must preserve the order in
//! which calls are issued on a connection.

use crate::command::{CommandId, ObjectKind};
use crate::value::CmdValue;
use crate::Result;

/// A connection to the daemon that can invoke commands
pub trait Connection {
    /// Invoke `command` on the daemon object `object` and wait for its result
    fn call(&mut self, object: ObjectKind, command: CommandId, args: Vec<CmdValue>) -> Result<CmdValue>;
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn call(&mut self, object: ObjectKind, command: CommandId, args: Vec<CmdValue>) -> Result<CmdValue> {
        (**self).call(object, command, args)
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn call(&mut self, object: ObjectKind, command: CommandId, args: Vec<CmdValue>) -> Result<CmdValue> {
        (**self).call(object, command, args)
    }
}
