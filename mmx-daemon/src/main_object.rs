//! The main object: handshake, status and shutdown

use chrono::{DateTime, Utc};
use mmx_common::time::{now, uptime_seconds};
use mmx_common::value::CmdDict;
use mmx_common::{CmdValue, CommandId, ObjectKind, SignalKind};
use tracing::{debug, info};

use crate::dispatch::CommandDescriptor;
use crate::object::{ManagedObject, ObjectRef};

/// Protocol version reported to clients
pub const PROTOCOL_VERSION: u32 = 1;

/// Create the main object
///
/// `on_destroy` runs when the last reference is released, after
/// `ObjectDestroyed` has been emitted; the daemon uses it to stop playback
/// and persist configuration.
pub fn create<F>(on_destroy: F) -> ObjectRef
where
    F: FnOnce(&ManagedObject) + Send + 'static,
{
    let started = now();
    let object = ObjectRef::with_destroy(ObjectKind::Main, on_destroy);
    register_commands(&object, started);
    object
}

fn register_commands(object: &ObjectRef, started: DateTime<Utc>) {
    object.register_command(CommandDescriptor::new2(
        CommandId::Hello,
        |_, protocol: u32, client: String| {
            debug!("Client {} says hello (protocol {})", client, protocol);
            Ok(PROTOCOL_VERSION)
        },
    ));

    object.register_command(CommandDescriptor::new0(CommandId::Status, move |_| {
        let mut status = CmdDict::new();
        status.insert(
            "version".to_string(),
            CmdValue::String(env!("CARGO_PKG_VERSION").to_string()),
        );
        status.insert("uptime".to_string(), CmdValue::Uint32(uptime_seconds(started)));
        Ok(status)
    }));

    object.register_command(CommandDescriptor::new0(CommandId::Quit, move |obj| {
        let uptime = uptime_seconds(started);
        info!("Quit requested after {} seconds", uptime);
        obj.emit_value(SignalKind::Quit, uptime);
        Ok(())
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_hello_returns_protocol_version() {
        let main = create(|_| {});
        let reply = main
            .invoke(CommandId::Hello, vec![CmdValue::Uint32(1), "test-client".into()])
            .unwrap();
        assert_eq!(reply, CmdValue::Uint32(PROTOCOL_VERSION));
    }

    #[test]
    fn test_status_reports_version_and_uptime() {
        let main = create(|_| {});
        let status = main.invoke(CommandId::Status, Vec::new()).unwrap();
        let status = status.as_dict().unwrap();
        assert_eq!(
            status.get("version"),
            Some(&CmdValue::String(env!("CARGO_PKG_VERSION").to_string()))
        );
        assert!(status.get("uptime").unwrap().as_u32().is_ok());
    }

    #[test]
    fn test_quit_emits_uptime() {
        let main = create(|_| {});
        let quit = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&quit);
        main.connect_fn(SignalKind::Quit, move |_, payload| {
            assert!(payload.as_u32().is_ok());
            flag.store(true, Ordering::SeqCst);
        });

        main.invoke(CommandId::Quit, Vec::new()).unwrap();
        assert!(quit.load(Ordering::SeqCst));
    }

    #[test]
    fn test_destroy_callback_runs_on_release() {
        let destroyed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&destroyed);
        let main = create(move |obj| {
            assert_eq!(obj.kind(), ObjectKind::Main);
            flag.store(true, Ordering::SeqCst);
        });
        drop(main);
        assert!(destroyed.load(Ordering::SeqCst));
    }
}
