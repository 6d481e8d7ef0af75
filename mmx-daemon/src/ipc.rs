//! In-process IPC plumbing
//!
//! [`Router`] maps object kinds to live objects and routes command
//! invocations to them. [`SignalForwarder`] subscribes to object signals and
//! republishes them as [`SignalEvent`]s on a broadcast channel for remote
//! subscribers. The byte-level transport sits on top of both and is not part
//! of this crate.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use mmx_common::{CmdValue, CommandId, Connection, Error, ObjectKind, Result, SignalEvent, SignalKind};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::object::{ManagedObject, ObjectRef, SignalHandler};

/// Registry of the objects clients can talk to
#[derive(Default)]
pub struct Router {
    objects: RwLock<HashMap<ObjectKind, ObjectRef>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `object` reachable under its kind, returning any object it replaces
    pub fn register(&self, object: ObjectRef) -> Option<ObjectRef> {
        let kind = object.kind();
        debug!("Router: registered {}", kind);
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, object)
    }

    /// Remove the object registered under `kind`; the caller gets its reference
    pub fn unregister(&self, kind: ObjectKind) -> Option<ObjectRef> {
        debug!("Router: unregistered {}", kind);
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind)
    }

    pub fn get(&self, kind: ObjectKind) -> Option<ObjectRef> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// Deliver one command to the object registered under `kind`
    ///
    /// The router lock is released before the command runs.
    pub fn dispatch(&self, kind: ObjectKind, command: CommandId, args: Vec<CmdValue>) -> Result<CmdValue> {
        let object = self
            .get(kind)
            .ok_or_else(|| Error::NotFound(format!("object {}", kind)))?;
        trace!("Router: {} -> {}", command, kind);
        object.invoke(command, args)
    }

    /// A client connection that calls straight into this router
    pub fn connect(self: &Arc<Self>) -> LocalConnection {
        LocalConnection {
            router: Arc::clone(self),
        }
    }
}

/// In-process [`Connection`]; calls complete in issue order
#[derive(Clone)]
pub struct LocalConnection {
    router: Arc<Router>,
}

impl Connection for LocalConnection {
    fn call(&mut self, object: ObjectKind, command: CommandId, args: Vec<CmdValue>) -> Result<CmdValue> {
        self.router.dispatch(object, command, args)
    }
}

/// Republishes object signals on a broadcast channel
///
/// Emission is synchronous, so events from one object arrive in emission
/// order. Events sent while nobody is subscribed are dropped.
#[derive(Clone)]
pub struct SignalForwarder {
    tx: broadcast::Sender<SignalEvent>,
    capacity: usize,
}

impl SignalForwarder {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Forward `kinds` emitted by `object`
    ///
    /// Returns the connected handlers, in `kinds` order, so they can be
    /// disconnected later.
    pub fn forward(&self, object: &ManagedObject, kinds: &[SignalKind]) -> Vec<SignalHandler> {
        kinds
            .iter()
            .map(|&kind| {
                let tx = self.tx.clone();
                let handler = SignalHandler::from_fn(move |obj, payload| {
                    let _ = tx.send(SignalEvent::new(obj.kind(), kind, payload.clone()));
                });
                object.connect(kind, handler.clone(), None);
                handler
            })
            .collect()
    }

    /// Receive every event forwarded after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CommandDescriptor;

    fn router_with_main() -> Arc<Router> {
        let router = Arc::new(Router::new());
        let main = ObjectRef::new(ObjectKind::Main);
        main.register_command(CommandDescriptor::new0(CommandId::Status, |_| Ok(7u32)));
        router.register(main);
        router
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let router = router_with_main();
        assert_eq!(
            router.dispatch(ObjectKind::Main, CommandId::Status, Vec::new()).unwrap(),
            CmdValue::Uint32(7)
        );
    }

    #[test]
    fn test_dispatch_to_missing_object() {
        let router = router_with_main();
        let err = router
            .dispatch(ObjectKind::Medialib, CommandId::Status, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_local_connection() {
        let router = router_with_main();
        let mut conn = router.connect();
        assert_eq!(
            conn.call(ObjectKind::Main, CommandId::Status, Vec::new()).unwrap(),
            CmdValue::Uint32(7)
        );
        assert_eq!(
            conn.call(ObjectKind::Main, CommandId::Quit, Vec::new()).unwrap_err(),
            Error::Unimplemented(CommandId::Quit)
        );
    }

    /// The router holds a reference; unregistering hands it back
    #[test]
    fn test_register_holds_reference() {
        let router = Router::new();
        let object = ObjectRef::new(ObjectKind::Playback);
        router.register(object.clone());
        assert_eq!(object.ref_count(), 2);

        let back = router.unregister(ObjectKind::Playback).unwrap();
        assert!(back.ptr_eq(&object));
        drop(back);
        assert_eq!(object.ref_count(), 1);
    }

    #[tokio::test]
    async fn test_forwarder_preserves_emission_order() {
        let forwarder = SignalForwarder::new(16);
        let mut rx = forwarder.subscribe();

        let object = ObjectRef::new(ObjectKind::Playlist);
        let handlers = forwarder.forward(&object, &[SignalKind::PlaylistCurrentPos, SignalKind::PlaylistLoaded]);
        assert_eq!(handlers.len(), 2);

        object.emit_value(SignalKind::PlaylistCurrentPos, 3u32);
        object.emit_value(SignalKind::PlaylistLoaded, "Jazz");
        object.emit_value(SignalKind::PlaylistCurrentPos, 0u32);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.object, ObjectKind::Playlist);
        assert_eq!(first.kind, SignalKind::PlaylistCurrentPos);
        assert_eq!(first.payload, CmdValue::Uint32(3));
        assert_eq!(rx.recv().await.unwrap().event_type(), "PlaylistLoaded");
        assert_eq!(rx.recv().await.unwrap().payload, CmdValue::Uint32(0));
    }

    #[tokio::test]
    async fn test_forwarder_disconnect() {
        let forwarder = SignalForwarder::new(4);
        let mut rx = forwarder.subscribe();
        let object = ObjectRef::new(ObjectKind::Config);

        let handlers = forwarder.forward(&object, &[SignalKind::ConfigValueChanged]);
        assert!(object.disconnect(SignalKind::ConfigValueChanged, &handlers[0]));
        object.emit(SignalKind::ConfigValueChanged, &CmdValue::None);

        assert!(rx.try_recv().is_err());
    }

    /// Emitting with no subscribers is not an error
    #[test]
    fn test_forwarder_is_lossy() {
        let forwarder = SignalForwarder::new(4);
        let object = ObjectRef::new(ObjectKind::Main);
        forwarder.forward(&object, &[SignalKind::Quit]);

        assert_eq!(forwarder.subscriber_count(), 0);
        assert_eq!(object.emit_value(SignalKind::Quit, 1u32), 1);
        assert_eq!(forwarder.capacity(), 4);
    }
}
