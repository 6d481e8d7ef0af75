//! Command dispatch
//!
//! Objects expose commands by registering a [`CommandDescriptor`] per
//! [`CommandId`]. A descriptor records the argument and return tags so
//! arguments are checked before the handler runs and results are checked
//! before they leave the object.

use std::fmt;
use std::sync::{Arc, PoisonError};

use mmx_common::{CmdValue, CommandId, Error, FromCmdValue, IntoCmdValue, Result, ValueType};
use tracing::{trace, warn};

use crate::object::ManagedObject;

type CommandFn = dyn Fn(&ManagedObject, Vec<CmdValue>) -> Result<CmdValue> + Send + Sync;

/// A registered command handler and its signature
pub struct CommandDescriptor {
    id: CommandId,
    arg_types: Vec<ValueType>,
    return_type: ValueType,
    func: Box<CommandFn>,
}

fn next_arg<A: FromCmdValue>(args: &mut std::vec::IntoIter<CmdValue>) -> Result<A> {
    let value = args
        .next()
        .ok_or_else(|| Error::Internal("argument list shorter than its signature".to_string()))?;
    A::from_cmd_value(value)
}

impl CommandDescriptor {
    /// Descriptor with an explicit signature over raw values
    pub fn raw<F>(id: CommandId, arg_types: Vec<ValueType>, return_type: ValueType, f: F) -> Self
    where
        F: Fn(&ManagedObject, Vec<CmdValue>) -> Result<CmdValue> + Send + Sync + 'static,
    {
        Self {
            id,
            arg_types,
            return_type,
            func: Box::new(f),
        }
    }

    pub fn new0<R, F>(id: CommandId, f: F) -> Self
    where
        R: IntoCmdValue,
        F: Fn(&ManagedObject) -> Result<R> + Send + Sync + 'static,
    {
        Self::raw(id, Vec::new(), R::VALUE_TYPE, move |object, _| {
            f(object).map(IntoCmdValue::into_cmd_value)
        })
    }

    pub fn new1<A, R, F>(id: CommandId, f: F) -> Self
    where
        A: FromCmdValue,
        R: IntoCmdValue,
        F: Fn(&ManagedObject, A) -> Result<R> + Send + Sync + 'static,
    {
        Self::raw(id, vec![A::VALUE_TYPE], R::VALUE_TYPE, move |object, args| {
            let mut args = args.into_iter();
            let a = next_arg(&mut args)?;
            f(object, a).map(IntoCmdValue::into_cmd_value)
        })
    }

    pub fn new2<A, B, R, F>(id: CommandId, f: F) -> Self
    where
        A: FromCmdValue,
        B: FromCmdValue,
        R: IntoCmdValue,
        F: Fn(&ManagedObject, A, B) -> Result<R> + Send + Sync + 'static,
    {
        Self::raw(
            id,
            vec![A::VALUE_TYPE, B::VALUE_TYPE],
            R::VALUE_TYPE,
            move |object, args| {
                let mut args = args.into_iter();
                let a = next_arg(&mut args)?;
                let b = next_arg(&mut args)?;
                f(object, a, b).map(IntoCmdValue::into_cmd_value)
            },
        )
    }

    pub fn new3<A, B, C, R, F>(id: CommandId, f: F) -> Self
    where
        A: FromCmdValue,
        B: FromCmdValue,
        C: FromCmdValue,
        R: IntoCmdValue,
        F: Fn(&ManagedObject, A, B, C) -> Result<R> + Send + Sync + 'static,
    {
        Self::raw(
            id,
            vec![A::VALUE_TYPE, B::VALUE_TYPE, C::VALUE_TYPE],
            R::VALUE_TYPE,
            move |object, args| {
                let mut args = args.into_iter();
                let a = next_arg(&mut args)?;
                let b = next_arg(&mut args)?;
                let c = next_arg(&mut args)?;
                f(object, a, b, c).map(IntoCmdValue::into_cmd_value)
            },
        )
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn arg_types(&self) -> &[ValueType] {
        &self.arg_types
    }

    pub fn return_type(&self) -> ValueType {
        self.return_type
    }

    fn call(&self, object: &ManagedObject, args: Vec<CmdValue>) -> Result<CmdValue> {
        if args.len() != self.arg_types.len() {
            return Err(Error::ArgumentCount {
                command: self.id,
                expected: self.arg_types.len(),
                found: args.len(),
            });
        }

        for (expected, arg) in self.arg_types.iter().zip(&args) {
            let found = arg.value_type();
            if *expected != found {
                return Err(Error::TypeMismatch {
                    expected: *expected,
                    found,
                });
            }
        }

        let result = (self.func)(object, args)?;

        if result.value_type() != self.return_type {
            return Err(Error::Internal(format!(
                "{} returned {}, declared {}",
                self.id,
                result.value_type(),
                self.return_type
            )));
        }

        Ok(result)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("id", &self.id)
            .field("arg_types", &self.arg_types)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

impl ManagedObject {
    /// Register `descriptor` under its command id, replacing any previous one
    pub fn register_command(&self, descriptor: CommandDescriptor) {
        let id = descriptor.id();
        let previous = self
            .commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(descriptor));

        if previous.is_some() {
            trace!("{}: replaced handler for {}", self.kind(), id);
        }
    }

    pub fn has_command(&self, id: CommandId) -> bool {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Run command `id` with `args`
    ///
    /// An id with no registered descriptor fails with
    /// [`Error::Unimplemented`]. Arguments are checked against the declared
    /// signature before the handler is called.
    pub fn invoke(&self, id: CommandId, args: Vec<CmdValue>) -> Result<CmdValue> {
        let descriptor = self
            .commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();

        let Some(descriptor) = descriptor else {
            warn!("{}: no handler for command {}", self.kind(), id);
            return Err(Error::Unimplemented(id));
        };

        trace!("{}: invoke {} with {} args", self.kind(), id, args.len());
        descriptor.call(self, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;
    use mmx_common::ObjectKind;

    fn echo_object() -> ObjectRef {
        let object = ObjectRef::new(ObjectKind::Main);
        object.register_command(CommandDescriptor::new2(
            CommandId::Hello,
            |_, protocol: u32, client: String| Ok(format!("{}:{}", client, protocol)),
        ));
        object
    }

    /// Invoking an unregistered command id is reported, not crashed on
    #[test]
    fn test_unknown_command_is_unimplemented() {
        let object = echo_object();
        let err = object.invoke(CommandId::PluginList, Vec::new()).unwrap_err();
        assert_eq!(err, Error::Unimplemented(CommandId::PluginList));
    }

    #[test]
    fn test_typed_arguments_are_unpacked() {
        let object = echo_object();
        let result = object
            .invoke(CommandId::Hello, vec![CmdValue::Uint32(1), CmdValue::from("cli")])
            .unwrap();
        assert_eq!(result, CmdValue::String("cli:1".to_string()));
    }

    #[test]
    fn test_argument_count_is_checked() {
        let object = echo_object();
        let err = object.invoke(CommandId::Hello, vec![CmdValue::Uint32(1)]).unwrap_err();
        assert_eq!(
            err,
            Error::ArgumentCount {
                command: CommandId::Hello,
                expected: 2,
                found: 1
            }
        );
    }

    /// A mismatched tag fails at the boundary instead of being reinterpreted
    #[test]
    fn test_argument_tag_is_checked() {
        let object = echo_object();
        let err = object
            .invoke(CommandId::Hello, vec![CmdValue::Int32(1), CmdValue::from("cli")])
            .unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: ValueType::Uint32,
                found: ValueType::Int32
            }
        );
    }

    /// Raw handlers returning a value of the wrong tag are rejected
    #[test]
    fn test_return_tag_is_checked() {
        let object = ObjectRef::new(ObjectKind::Main);
        object.register_command(CommandDescriptor::raw(
            CommandId::Status,
            Vec::new(),
            ValueType::Dict,
            |_, _| Ok(CmdValue::Uint32(3)),
        ));
        assert!(matches!(
            object.invoke(CommandId::Status, Vec::new()),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_register_overwrites() {
        let object = ObjectRef::new(ObjectKind::Main);
        object.register_command(CommandDescriptor::new0(CommandId::Status, |_| Ok(1u32)));
        object.register_command(CommandDescriptor::new0(CommandId::Status, |_| Ok(2u32)));
        assert_eq!(object.invoke(CommandId::Status, Vec::new()).unwrap(), CmdValue::Uint32(2));
    }

    /// A handler may register commands on its own object while running
    #[test]
    fn test_handler_can_register_commands() {
        let object = ObjectRef::new(ObjectKind::Plugin);
        object.register_command(CommandDescriptor::new0(CommandId::Start, |obj| {
            obj.register_command(CommandDescriptor::new0(CommandId::Stop, |_| Ok(())));
            Ok(())
        }));

        assert!(!object.has_command(CommandId::Stop));
        object.invoke(CommandId::Start, Vec::new()).unwrap();
        assert!(object.has_command(CommandId::Stop));
        assert_eq!(object.invoke(CommandId::Stop, Vec::new()).unwrap(), CmdValue::None);
    }

    #[test]
    fn test_descriptor_signature() {
        let descriptor = CommandDescriptor::new3(
            CommandId::PlaylistInsertId,
            |_, _name: String, _pos: u32, _id: u32| Ok(()),
        );
        assert_eq!(descriptor.id(), CommandId::PlaylistInsertId);
        assert_eq!(
            descriptor.arg_types(),
            &[ValueType::String, ValueType::Uint32, ValueType::Uint32]
        );
        assert_eq!(descriptor.return_type(), ValueType::None);
    }
}
