//! Reference-counted bus objects
//!
//! Every daemon subsystem (main, playlist, config, playback, collections and
//! any output plugin) is a [`ManagedObject`]: a typed entity that other parts
//! of the daemon can subscribe to (signals) and call into (commands, see
//! [`crate::dispatch`]).
//!
//! Ownership is carried by [`ObjectRef`]. Cloning an `ObjectRef` takes a
//! reference, dropping one releases it. When the last reference goes away the
//! object is torn down in a fixed order:
//!
//! 1. `ObjectDestroyed` is emitted while the object is still fully usable
//! 2. the type-specific destroy callback runs
//! 3. the subscription table is cleared
//! 4. the table mutex is released
//! 5. the allocation is freed
//!
//! Handlers only ever receive `&ManagedObject`, never an owning handle, so
//! nothing reachable from a handler can resurrect or double-free an object.
//!
//! # Signal ordering
//!
//! `connect` prepends, and `emit` walks the list front to back, so the most
//! recently connected handler fires first.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use mmx_common::{CmdValue, IntoCmdValue, ObjectKind, SignalKind};
use tracing::{debug, trace, warn};

use crate::dispatch::CommandDescriptor;

/// Opaque per-subscription data handed back to the handler on every emit
pub type Userdata = Arc<dyn Any + Send + Sync>;

type HandlerFn = dyn Fn(&ManagedObject, &CmdValue, Option<&(dyn Any + Send + Sync)>) + Send + Sync;

type DestroyFn = Box<dyn FnOnce(&ManagedObject) + Send>;

/// A signal handler
///
/// Handlers are compared by identity: two `SignalHandler`s are the same
/// handler when one was cloned from the other.
#[derive(Clone)]
pub struct SignalHandler(Arc<HandlerFn>);

impl SignalHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ManagedObject, &CmdValue, Option<&(dyn Any + Send + Sync)>) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Handler that ignores userdata
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ManagedObject, &CmdValue) + Send + Sync + 'static,
    {
        Self::new(move |object, payload, _| f(object, payload))
    }

    pub fn same_handler(&self, other: &SignalHandler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self, object: &ManagedObject, payload: &CmdValue, userdata: Option<&(dyn Any + Send + Sync)>) {
        (self.0)(object, payload, userdata)
    }
}

impl fmt::Debug for SignalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignalHandler({:p})", Arc::as_ptr(&self.0))
    }
}

#[derive(Clone)]
struct Subscription {
    handler: SignalHandler,
    userdata: Option<Userdata>,
}

/// A typed bus object with signals and commands
pub struct ManagedObject {
    kind: ObjectKind,
    signals: Mutex<HashMap<SignalKind, VecDeque<Subscription>>>,
    pub(crate) commands: RwLock<HashMap<mmx_common::CommandId, Arc<CommandDescriptor>>>,
    destroy: Mutex<Option<DestroyFn>>,
}

impl ManagedObject {
    fn new(kind: ObjectKind, destroy: Option<DestroyFn>) -> Self {
        Self {
            kind,
            signals: Mutex::new(HashMap::new()),
            commands: RwLock::new(HashMap::new()),
            destroy: Mutex::new(destroy),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn lock_signals(&self) -> MutexGuard<'_, HashMap<SignalKind, VecDeque<Subscription>>> {
        // Handlers never run under this lock, so a poisoned table is still consistent
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe `handler` to `signal`
    ///
    /// The entry goes to the front of the list. The same handler may be
    /// connected any number of times; each connection is independent.
    pub fn connect(&self, signal: SignalKind, handler: SignalHandler, userdata: Option<Userdata>) {
        trace!("{}: connect {:?} to {}", self.kind, handler, signal);
        self.lock_signals()
            .entry(signal)
            .or_default()
            .push_front(Subscription { handler, userdata });
    }

    /// Subscribe a closure and return its handler for a later `disconnect`
    pub fn connect_fn<F>(&self, signal: SignalKind, f: F) -> SignalHandler
    where
        F: Fn(&ManagedObject, &CmdValue) + Send + Sync + 'static,
    {
        let handler = SignalHandler::from_fn(f);
        self.connect(signal, handler.clone(), None);
        handler
    }

    /// Remove the first subscription to `signal` whose handler is `handler`
    ///
    /// Userdata is not compared. Returns whether an entry was removed.
    pub fn disconnect(&self, signal: SignalKind, handler: &SignalHandler) -> bool {
        let mut table = self.lock_signals();
        let Some(list) = table.get_mut(&signal) else {
            return false;
        };

        match list.iter().position(|sub| sub.handler.same_handler(handler)) {
            Some(index) => {
                list.remove(index);
                if list.is_empty() {
                    table.remove(&signal);
                }
                trace!("{}: disconnected {:?} from {}", self.kind, handler, signal);
                true
            }
            None => false,
        }
    }

    /// Number of subscriptions currently connected to `signal`
    pub fn subscriber_count(&self, signal: SignalKind) -> usize {
        self.lock_signals().get(&signal).map_or(0, VecDeque::len)
    }

    /// Invoke every handler connected to `signal` with `payload`
    ///
    /// The subscription list is copied under the lock and the lock released
    /// before any handler runs, so handlers may connect, disconnect or drop
    /// references freely. Changes made during an emit take effect on the next
    /// one. Returns the number of handlers invoked.
    pub fn emit(&self, signal: SignalKind, payload: &CmdValue) -> usize {
        let snapshot: Vec<Subscription> = match self.lock_signals().get(&signal) {
            Some(list) => list.iter().cloned().collect(),
            None => return 0,
        };

        for sub in &snapshot {
            sub.handler.call(self, payload, sub.userdata.as_deref());
        }

        snapshot.len()
    }

    /// Emit `signal` carrying a single typed value
    pub fn emit_value<T: IntoCmdValue>(&self, signal: SignalKind, value: T) -> usize {
        if T::VALUE_TYPE != signal.payload_type() {
            warn!(
                "{}: emitting {} with {} payload, receivers expect {}",
                self.kind,
                signal,
                T::VALUE_TYPE,
                signal.payload_type()
            );
        }
        self.emit(signal, &value.into_cmd_value())
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl Drop for ManagedObject {
    fn drop(&mut self) {
        debug!("Free object {}", self.kind);

        self.emit(SignalKind::ObjectDestroyed, &CmdValue::None);

        let destroy = self.destroy.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(destroy) = destroy {
            destroy(self);
        }

        self.signals.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
        self.commands.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Owning handle to a [`ManagedObject`]
///
/// `clone()` is ref, `drop()` is unref. Both are atomic and may happen on any
/// thread.
#[derive(Clone)]
pub struct ObjectRef(Arc<ManagedObject>);

impl ObjectRef {
    /// Create an object with no destroy callback, holding one reference
    pub fn new(kind: ObjectKind) -> Self {
        Self(Arc::new(ManagedObject::new(kind, None)))
    }

    /// Create an object whose `destroy` callback runs on final release
    pub fn with_destroy<F>(kind: ObjectKind, destroy: F) -> Self
    where
        F: FnOnce(&ManagedObject) + Send + 'static,
    {
        Self(Arc::new(ManagedObject::new(kind, Some(Box::new(destroy)))))
    }

    /// Number of live references
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Non-owning handle that does not keep the object alive
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for ObjectRef {
    type Target = ManagedObject;

    fn deref(&self) -> &ManagedObject {
        &self.0
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}, refs={})", self.0.kind, self.ref_count())
    }
}

/// Weak handle; `upgrade` fails once teardown has started
#[derive(Clone, Debug)]
pub struct WeakObjectRef(Weak<ManagedObject>);

impl WeakObjectRef {
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}
