//! Runtime configuration properties
//!
//! Properties are string key/value pairs registered by subsystems and
//! clients. A registration supplies a default; if the key already has a
//! value (from a previous registration or the property file) that value is
//! kept. Changing a value notifies `ConfigValueChanged` subscribers and the
//! property's own change callbacks. Setting a property to the value it
//! already has is not a change and notifies nobody.
//!
//! Properties persist as a flat TOML table of strings.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmx_common::value::CmdDict;
use mmx_common::{CmdValue, CommandId, Error, ObjectKind, Result, SignalKind};
use tracing::{debug, info, warn};

use crate::dispatch::CommandDescriptor;
use crate::object::{ManagedObject, ObjectRef};

/// Key clients use to read and set the output volume
pub const VOLUME_PROXY_KEY: &str = "output.volume";

/// Called with the key and new value after a property changes
pub type PropertyCallback = Arc<dyn Fn(&ConfigContext<'_>, &str, &str) + Send + Sync>;

struct Property {
    value: String,
    callbacks: Vec<PropertyCallback>,
}

impl Property {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            callbacks: Vec::new(),
        }
    }
}

type Properties = Mutex<BTreeMap<String, Property>>;

fn lock(properties: &Properties) -> MutexGuard<'_, BTreeMap<String, Property>> {
    properties.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Property access from inside command handlers and change callbacks
pub struct ConfigContext<'a> {
    properties: &'a Properties,
    object: &'a ManagedObject,
}

impl ConfigContext<'_> {
    pub fn get(&self, key: &str) -> Option<String> {
        lock(self.properties).get(key).map(|p| p.value.clone())
    }

    /// Set `key` to `value`; returns whether the stored value changed
    pub fn set(&self, key: &str, value: &str) -> Result<bool> {
        let callbacks = {
            let mut properties = lock(self.properties);
            let property = properties
                .get_mut(key)
                .ok_or_else(|| Error::NotFound(format!("config property {}", key)))?;
            if property.value == value {
                return Ok(false);
            }
            property.value = value.to_string();
            property.callbacks.clone()
        };

        info!("Config value {} = {}", key, value);

        let mut change = CmdDict::new();
        change.insert(key.to_string(), CmdValue::String(value.to_string()));
        self.object.emit_value(SignalKind::ConfigValueChanged, change);

        for callback in &callbacks {
            callback(self, key, value);
        }
        Ok(true)
    }

    fn register(&self, key: &str, default: &str) -> Result<String> {
        if key.is_empty() {
            return Err(Error::InvalidInput("config key must not be empty".to_string()));
        }
        let mut properties = lock(self.properties);
        let property = properties.entry(key.to_string()).or_insert_with(|| {
            debug!("Registered config property {} (default {})", key, default);
            Property::new(default)
        });
        Ok(property.value.clone())
    }

    fn list(&self) -> BTreeMap<String, String> {
        lock(self.properties)
            .iter()
            .map(|(k, p)| (k.clone(), p.value.clone()))
            .collect()
    }
}

/// Config registry object
#[derive(Clone)]
pub struct ConfigRegistry {
    object: ObjectRef,
    properties: Arc<Properties>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        let object = ObjectRef::new(ObjectKind::Config);
        let properties = Arc::new(Mutex::new(BTreeMap::new()));
        register_commands(&object, &properties);
        Self { object, properties }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    fn context(&self) -> ConfigContext<'_> {
        ConfigContext {
            properties: &self.properties,
            object: &self.object,
        }
    }

    /// Register `key`, returning its current value
    pub fn register(&self, key: &str, default: &str) -> Result<String> {
        self.context().register(key, default)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.context().get(key)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<bool> {
        self.context().set(key, value)
    }

    pub fn list(&self) -> BTreeMap<String, String> {
        self.context().list()
    }

    /// Run `callback` whenever `key` changes
    pub fn on_change<F>(&self, key: &str, callback: F) -> Result<()>
    where
        F: Fn(&ConfigContext<'_>, &str, &str) + Send + Sync + 'static,
    {
        lock(&self.properties)
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("config property {}", key)))?
            .callbacks
            .push(Arc::new(callback));
        Ok(())
    }

    /// Mirror `output.<plugin>.volume` as `output.volume`, in both directions
    ///
    /// Does nothing when the plugin has not registered a volume property.
    pub fn install_volume_proxy(&self, output_plugin: &str) -> Result<()> {
        let source = format!("output.{}.volume", output_plugin);
        let Some(volume) = self.get(&source) else {
            debug!("Output {} has no volume property, no proxy installed", output_plugin);
            return Ok(());
        };

        self.register(VOLUME_PROXY_KEY, &volume)?;

        self.on_change(&source, |ctx, _, value| {
            if let Err(e) = ctx.set(VOLUME_PROXY_KEY, value) {
                warn!("Failed to update {}: {}", VOLUME_PROXY_KEY, e);
            }
        })?;

        let target = source.clone();
        self.on_change(VOLUME_PROXY_KEY, move |ctx, _, value| {
            if let Err(e) = ctx.set(&target, value) {
                warn!("Failed to update {}: {}", target, e);
            }
        })?;

        self.set(VOLUME_PROXY_KEY, &volume)?;
        info!("Volume proxy {} <-> {}", VOLUME_PROXY_KEY, source);
        Ok(())
    }

    /// Load persisted values from `path`
    ///
    /// A missing file is not an error. Values for already registered keys go
    /// through `set` and notify as usual; unknown keys are kept until someone
    /// registers them. Returns the number of values read.
    pub fn load(&self, path: &Path) -> crate::Result<usize> {
        if !path.exists() {
            info!("No property file at {:?}, starting with defaults", path);
            return Ok(0);
        }

        let text = std::fs::read_to_string(path)?;
        let values: BTreeMap<String, String> = toml::from_str(&text)
            .map_err(|e| crate::Error::Config(format!("Failed to parse {:?}: {}", path, e)))?;

        let ctx = self.context();
        for (key, value) in &values {
            if ctx.get(key).is_some() {
                ctx.set(key, value)?;
            } else {
                lock(&self.properties).insert(key.clone(), Property::new(value));
            }
        }

        info!("Loaded {} config values from {:?}", values.len(), path);
        Ok(values.len())
    }

    /// Write every property to `path`
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let text = toml::to_string(&self.list())
            .map_err(|e| crate::Error::Config(format!("Failed to serialize properties: {}", e)))?;
        std::fs::write(path, text)?;

        info!("Saved config properties to {:?}", path);
        Ok(())
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn register_commands(object: &ObjectRef, properties: &Arc<Properties>) {
    let p = Arc::clone(properties);
    object.register_command(CommandDescriptor::new2(
        CommandId::ConfigRegister,
        move |obj, key: String, default: String| {
            ConfigContext { properties: &p, object: obj }.register(&key, &default)
        },
    ));

    let p = Arc::clone(properties);
    object.register_command(CommandDescriptor::new1(
        CommandId::ConfigGet,
        move |obj, key: String| {
            ConfigContext { properties: &p, object: obj }
                .get(&key)
                .ok_or_else(|| Error::NotFound(format!("config property {}", key)))
        },
    ));

    let p = Arc::clone(properties);
    object.register_command(CommandDescriptor::new2(
        CommandId::ConfigSet,
        move |obj, key: String, value: String| {
            ConfigContext { properties: &p, object: obj }.set(&key, &value)?;
            Ok(())
        },
    ));

    let p = Arc::clone(properties);
    object.register_command(CommandDescriptor::new0(CommandId::ConfigList, move |obj| {
        let values = ConfigContext { properties: &p, object: obj }.list();
        Ok(values
            .into_iter()
            .map(|(k, v)| (k, CmdValue::String(v)))
            .collect::<CmdDict>())
    }));
}
