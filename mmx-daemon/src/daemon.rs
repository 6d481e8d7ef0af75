//! Daemon assembly
//!
//! Builds every subsystem object, registers it with the router, wires the
//! cross-object callbacks and forwards client-visible signals.

use std::path::PathBuf;
use std::sync::Arc;

use mmx_common::config::DaemonConfig;
use mmx_common::{CmdValue, CommandId, ObjectKind, SignalKind};
use tracing::{debug, info, warn};

use crate::collections::{CollectionStore, IdUniverseEngine, QueryEngine};
use crate::config_registry::{ConfigRegistry, VOLUME_PROXY_KEY};
use crate::ipc::{Router, SignalForwarder};
use crate::main_object;
use crate::object::ObjectRef;
use crate::playback::{Playback, CHANNELS};
use crate::playlist::PlaylistStore;
use crate::Result;

/// Buffered events per forwarder subscriber
pub const EVENT_CAPACITY: usize = 1000;

/// Volume used when the output has no stored value
pub const DEFAULT_VOLUME: u32 = 75;

/// A running daemon
pub struct Daemon {
    router: Arc<Router>,
    forwarder: SignalForwarder,
    main: ObjectRef,
    config: ConfigRegistry,
    playlist: PlaylistStore,
    playback: Playback,
    collections: CollectionStore,
}

impl Daemon {
    /// Start with the default query engine
    pub fn start(config: &DaemonConfig) -> Result<Self> {
        Self::with_engine(config, Arc::new(IdUniverseEngine::default()))
    }

    pub fn with_engine(config: &DaemonConfig, engine: Arc<dyn QueryEngine>) -> Result<Self> {
        let registry = ConfigRegistry::new();
        let property_file = config.property_file_or_default();
        if let Some(path) = &property_file {
            registry.load(path)?;
        }

        registry.register("core.ipcsocket", &config.ipc_socket)?;
        registry.register("output.plugin", &config.output_plugin)?;
        let volume_key = format!("output.{}.volume", config.output_plugin);
        let stored = registry.register(&volume_key, &DEFAULT_VOLUME.to_string())?;
        let initial_volume = stored.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid stored volume {:?}", stored);
            DEFAULT_VOLUME
        });
        registry.install_volume_proxy(&config.output_plugin)?;

        let playlist = PlaylistStore::new();
        let playback = Playback::new(playlist.clone(), initial_volume);
        let collections = CollectionStore::new(engine);

        let playback_object = playback.object().clone();
        registry.on_change(VOLUME_PROXY_KEY, move |_, _, value| {
            let Ok(volume) = value.parse::<u32>() else {
                warn!("Ignoring non-numeric volume {:?}", value);
                return;
            };
            for channel in CHANNELS {
                let args = vec![CmdValue::from(channel), CmdValue::Uint32(volume)];
                if let Err(e) = playback_object.invoke(CommandId::VolumeSet, args) {
                    warn!("Failed to apply volume to {}: {}", channel, e);
                }
            }
        })?;

        let main = main_object::create(shutdown_hook(
            playback.object().clone(),
            registry.clone(),
            property_file,
        ));

        let router = Arc::new(Router::new());
        let forwarder = SignalForwarder::new(EVENT_CAPACITY);
        for object in [
            &main,
            registry.object(),
            playlist.object(),
            playback.object(),
            collections.object(),
        ] {
            forward_signals(&forwarder, object);
            router.register(object.clone());
        }

        info!("Daemon started");
        Ok(Self {
            router,
            forwarder,
            main,
            config: registry,
            playlist,
            playback,
            collections,
        })
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn forwarder(&self) -> &SignalForwarder {
        &self.forwarder
    }

    pub fn main(&self) -> &ObjectRef {
        &self.main
    }

    pub fn config(&self) -> &ConfigRegistry {
        &self.config
    }

    pub fn playlist(&self) -> &PlaylistStore {
        &self.playlist
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn collections(&self) -> &CollectionStore {
        &self.collections
    }

    /// Release every object
    ///
    /// The main object goes first; its destroy hook stops playback and saves
    /// the config properties.
    pub fn shutdown(self) {
        self.router.unregister(ObjectKind::Main);
        let Self { main, .. } = self;
        if main.ref_count() > 1 {
            debug!("Main object has {} outstanding references", main.ref_count() - 1);
        }
        drop(main);
        info!("Daemon stopped");
    }
}

fn forward_signals(forwarder: &SignalForwarder, object: &ObjectRef) {
    let kinds: &[SignalKind] = match object.kind() {
        ObjectKind::Main => &[SignalKind::Quit],
        ObjectKind::Config => &[SignalKind::ConfigValueChanged],
        ObjectKind::Playlist => &[
            SignalKind::PlaylistChanged,
            SignalKind::PlaylistCurrentPos,
            SignalKind::PlaylistLoaded,
        ],
        ObjectKind::Playback => &[
            SignalKind::PlaybackStatus,
            SignalKind::PlaybackCurrentId,
            SignalKind::OutputVolumeChanged,
        ],
        ObjectKind::Collection => &[SignalKind::CollectionChanged],
        _ => &[],
    };
    forwarder.forward(object, kinds);
}

fn shutdown_hook(
    playback: ObjectRef,
    config: ConfigRegistry,
    property_file: Option<PathBuf>,
) -> impl FnOnce(&crate::object::ManagedObject) + Send + 'static {
    move |_| {
        if let Err(e) = playback.invoke(CommandId::Stop, Vec::new()) {
            warn!("Failed to stop playback: {}", e);
        }
        match property_file {
            Some(path) => {
                if let Err(e) = config.save(&path) {
                    warn!("Failed to save config properties: {}", e);
                }
            }
            None => warn!("No property file location, config not saved"),
        }
    }
}
