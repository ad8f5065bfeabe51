//! Interface to the accessory host framework.
//!
//! The host persists accessory identity across restarts, exposes
//! services and characteristics to the smart-home controller, and calls
//! back into a [`CharacteristicHandler`] whenever a characteristic is
//! read or written. This crate only drives it through [`AccessoryHost`].

use crate::types::{AccessoryId, Category, InputSourceType, ReceiverDescriptor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Namespace under which accessory identities are derived
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6e61_696d_2d61_7564_696f_2d62_7269_6467);

/// Service addressed on an accessory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceRef {
    Information,
    Television,
    TelevisionSpeaker,
    SmartSpeaker,
    /// One input source, addressed by its display name
    InputSource(String),
}

impl ServiceRef {
    /// Input name if this is an input source service
    pub fn input_name(&self) -> Option<&str> {
        match self {
            ServiceRef::InputSource(name) => Some(name),
            _ => None,
        }
    }
}

/// Characteristics this bridge reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Active,
    ActiveIdentifier,
    ConfiguredName,
    CurrentMediaState,
    TargetMediaState,
    Mute,
    Volume,
    Identifier,
}

/// Value carried by a characteristic
#[derive(Debug, Clone, PartialEq)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl CharacteristicValue {
    /// Truthiness as the host framework applies it (`Active` arrives as 0/1)
    pub fn as_bool(&self) -> bool {
        match self {
            CharacteristicValue::Bool(b) => *b,
            CharacteristicValue::Int(i) => *i != 0,
            CharacteristicValue::Text(s) => s == "1" || s == "true",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CharacteristicValue::Bool(b) => Some(*b as i64),
            CharacteristicValue::Int(i) => Some(*i),
            CharacteristicValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<bool> for CharacteristicValue {
    fn from(value: bool) -> Self {
        CharacteristicValue::Bool(value)
    }
}

impl From<i64> for CharacteristicValue {
    fn from(value: i64) -> Self {
        CharacteristicValue::Int(value)
    }
}

impl From<u32> for CharacteristicValue {
    fn from(value: u32) -> Self {
        CharacteristicValue::Int(value as i64)
    }
}

impl From<String> for CharacteristicValue {
    fn from(value: String) -> Self {
        CharacteristicValue::Text(value)
    }
}

/// Data the host persists alongside an accessory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessoryContext {
    #[serde(default)]
    pub receiver: Option<Arc<ReceiverDescriptor>>,
}

/// Accessory record as known to the host
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformAccessory {
    pub display_name: String,
    pub uuid: AccessoryId,
    pub category: Category,
    pub context: AccessoryContext,
}

impl PlatformAccessory {
    pub fn new(display_name: impl Into<String>, uuid: AccessoryId, category: Category) -> Self {
        Self {
            display_name: display_name.into(),
            uuid,
            category,
            context: AccessoryContext::default(),
        }
    }
}

/// Manufacturer/model/serial shown on the information service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInformation {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

/// Input source service published on a receiver accessory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    pub identifier: u32,
    pub name: String,
    pub source_type: InputSourceType,
}

/// Callbacks the host invokes when a characteristic is read or written
///
/// Both hooks must return without waiting on the network.
pub trait CharacteristicHandler: Send + Sync {
    /// Current value, or `None` if the characteristic is not handled
    fn on_get(&self, service: &ServiceRef, characteristic: Characteristic) -> Option<CharacteristicValue>;

    fn on_set(&self, service: &ServiceRef, characteristic: Characteristic, value: CharacteristicValue);
}

/// Operations this bridge needs from the host framework
pub trait AccessoryHost: Send + Sync {
    /// Publish accessories that carry their own bridge (television-like)
    fn publish_external_accessories(&self, accessories: &[PlatformAccessory]);

    /// Persist updated context of already-registered accessories
    fn update_platform_accessories(&self, accessories: &[PlatformAccessory]);

    fn set_information(&self, accessory: AccessoryId, information: &AccessoryInformation);

    /// Expose `services` on the accessory and route their hooks to `handler`
    fn bind(&self, accessory: AccessoryId, services: &[ServiceRef], handler: Arc<dyn CharacteristicHandler>);

    /// Push an out-of-band value change
    fn update_characteristic(
        &self,
        accessory: AccessoryId,
        service: &ServiceRef,
        characteristic: Characteristic,
        value: CharacteristicValue,
    );

    /// Services currently exposed on the accessory
    fn services(&self, accessory: AccessoryId) -> Vec<ServiceRef>;

    fn add_input_source(&self, accessory: AccessoryId, source: &InputSource);

    fn remove_service(&self, accessory: AccessoryId, service: &ServiceRef);
}

/// Host handle and constants, supplied once at platform construction
#[derive(Clone)]
pub struct HapContext {
    host: Arc<dyn AccessoryHost>,
    namespace: Uuid,
}

impl HapContext {
    pub fn new(host: Arc<dyn AccessoryHost>) -> Self {
        Self {
            host,
            namespace: ACCESSORY_NAMESPACE,
        }
    }

    pub fn host(&self) -> &Arc<dyn AccessoryHost> {
        &self.host
    }

    /// Derive the accessory identity for a name.
    ///
    /// Renaming a device changes its identity.
    pub fn generate_uuid(&self, name: &str) -> AccessoryId {
        Uuid::new_v5(&self.namespace, name.as_bytes())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Log sink for asserting on emitted events
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        /// Route this thread's events here until the guard is dropped
        pub fn install(&self) -> tracing::subscriber::DefaultGuard {
            let sink = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || sink.clone())
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Host double that records every call
    #[derive(Default)]
    pub(crate) struct RecordingHost {
        pub published: Mutex<Vec<Vec<AccessoryId>>>,
        pub context_updates: Mutex<Vec<AccessoryId>>,
        pub information: Mutex<HashMap<AccessoryId, AccessoryInformation>>,
        pub handlers: Mutex<HashMap<AccessoryId, Arc<dyn CharacteristicHandler>>>,
        pub services: Mutex<HashMap<AccessoryId, Vec<ServiceRef>>>,
        pub updates: Mutex<Vec<(AccessoryId, ServiceRef, Characteristic, CharacteristicValue)>>,
    }

    impl RecordingHost {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn updates_for(&self, characteristic: Characteristic) -> Vec<CharacteristicValue> {
            self.updates
                .lock()
                .iter()
                .filter(|(_, _, c, _)| *c == characteristic)
                .map(|(_, _, _, v)| v.clone())
                .collect()
        }

        pub fn input_names(&self, accessory: AccessoryId) -> Vec<String> {
            self.services
                .lock()
                .get(&accessory)
                .map(|services| {
                    services
                        .iter()
                        .filter_map(|s| s.input_name().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        }

        /// Wait until at least `count` updates of `characteristic` were pushed
        pub async fn wait_for_updates(&self, characteristic: Characteristic, count: usize) -> Vec<CharacteristicValue> {
            for _ in 0..200 {
                let updates = self.updates_for(characteristic);
                if updates.len() >= count {
                    return updates;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            self.updates_for(characteristic)
        }
    }

    impl AccessoryHost for RecordingHost {
        fn publish_external_accessories(&self, accessories: &[PlatformAccessory]) {
            self.published
                .lock()
                .push(accessories.iter().map(|a| a.uuid).collect());
        }

        fn update_platform_accessories(&self, accessories: &[PlatformAccessory]) {
            self.context_updates
                .lock()
                .extend(accessories.iter().map(|a| a.uuid));
        }

        fn set_information(&self, accessory: AccessoryId, information: &AccessoryInformation) {
            self.information.lock().insert(accessory, information.clone());
        }

        fn bind(&self, accessory: AccessoryId, services: &[ServiceRef], handler: Arc<dyn CharacteristicHandler>) {
            self.handlers.lock().insert(accessory, handler);
            let mut all = self.services.lock();
            let exposed = all.entry(accessory).or_default();
            for service in services {
                if !exposed.contains(service) {
                    exposed.push(service.clone());
                }
            }
        }

        fn update_characteristic(
            &self,
            accessory: AccessoryId,
            service: &ServiceRef,
            characteristic: Characteristic,
            value: CharacteristicValue,
        ) {
            self.updates
                .lock()
                .push((accessory, service.clone(), characteristic, value));
        }

        fn services(&self, accessory: AccessoryId) -> Vec<ServiceRef> {
            self.services.lock().get(&accessory).cloned().unwrap_or_default()
        }

        fn add_input_source(&self, accessory: AccessoryId, source: &InputSource) {
            self.services
                .lock()
                .entry(accessory)
                .or_default()
                .push(ServiceRef::InputSource(source.name.clone()));
        }

        fn remove_service(&self, accessory: AccessoryId, service: &ServiceRef) {
            if let Some(services) = self.services.lock().get_mut(&accessory) {
                services.retain(|s| s != service);
            }
        }
    }
}
