//! Accessory controllers.
//!
//! One [`AccessoryController`] drives one published accessory. It answers
//! the host's get hooks from its cache, refreshes that cache from the
//! receiver in the background, and applies set hooks optimistically
//! before sending them. Each property is a [`RemoteProperty`], so a slow
//! device reply never overwrites a newer user request.

use crate::client::NaimClient;
use crate::error::{NaimError, Result};
use crate::host::{
    AccessoryHost, AccessoryInformation, Characteristic, CharacteristicHandler, CharacteristicValue,
    HapContext, InputSource, PlatformAccessory, ServiceRef,
};
use crate::property::{Fallback, RemoteProperty};
use crate::protocol::{
    build_input_list, commands, decode_flag, decode_media_state, decode_power, decode_volume, encode_flag,
    encode_power, keys, paths, RawInput,
};
use crate::types::{
    AccessoryId, Capability, InputDescriptor, MediaState, ReceiverDescriptor, ReceiverState, Role, VolumeLevel,
};
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MANUFACTURER: &str = "Naim Audio";
const DEFAULT_MODEL: &str = "Default-Model";
const DEFAULT_SERIAL: &str = "Default-Serial";

/// Controller bound to one accessory
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct AccessoryController {
    inner: Arc<Inner>,
}

struct Inner {
    id: AccessoryId,
    role: Role,
    name: String,
    api_port: u16,
    request_timeout: Duration,
    endpoint: RwLock<Endpoint>,
    host: Arc<dyn AccessoryHost>,
    power: Arc<RemoteProperty<bool>>,
    media: Arc<RemoteProperty<MediaState>>,
    mute: Arc<RemoteProperty<bool>>,
    volume: Arc<RemoteProperty<VolumeLevel>>,
    /// Resource path of the selected input
    active_input: Arc<RemoteProperty<Option<String>>>,
    inputs: Mutex<Vec<InputDescriptor>>,
}

/// Where the receiver is currently reached
struct Endpoint {
    receiver: Arc<ReceiverDescriptor>,
    client: NaimClient,
}

impl AccessoryController {
    /// Bind a controller to `accessory` and expose its role's services.
    ///
    /// # Errors
    ///
    /// Returns `NaimError::MissingReceiver` if the accessory's context
    /// carries no receiver.
    pub fn attach(
        hap: &HapContext,
        accessory: &PlatformAccessory,
        role: Role,
        api_port: u16,
        request_timeout: Duration,
    ) -> Result<Self> {
        let receiver = accessory
            .context
            .receiver
            .clone()
            .ok_or_else(|| NaimError::MissingReceiver(accessory.display_name.clone()))?;

        let client = NaimClient::for_receiver(&receiver, api_port, request_timeout)?;
        let controller = Self {
            inner: Arc::new(Inner {
                id: accessory.uuid,
                role,
                name: accessory.display_name.clone(),
                api_port,
                request_timeout,
                endpoint: RwLock::new(Endpoint { receiver, client }),
                host: Arc::clone(hap.host()),
                power: RemoteProperty::new(false, Fallback::Value(false)),
                media: RemoteProperty::new(MediaState::Stop, Fallback::Cached),
                mute: RemoteProperty::new(false, Fallback::Value(false)),
                volume: RemoteProperty::new(0, Fallback::Cached),
                active_input: RemoteProperty::new(None, Fallback::Cached),
                inputs: Mutex::new(Vec::new()),
            }),
        };

        let host = &controller.inner.host;
        host.set_information(controller.id(), &controller.information());
        host.bind(controller.id(), &controller.services(), Arc::new(controller.clone()));

        tracing::debug!(
            "{}: attached as {:?} to {}",
            controller.name(),
            role,
            controller.client().base_url()
        );
        Ok(controller)
    }

    pub fn id(&self) -> AccessoryId {
        self.inner.id
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Receiver as last discovered
    pub fn receiver(&self) -> Arc<ReceiverDescriptor> {
        Arc::clone(&self.inner.endpoint.read().receiver)
    }

    fn client(&self) -> NaimClient {
        self.inner.endpoint.read().client.clone()
    }

    /// Point the controller at a rediscovered receiver.
    ///
    /// Requests issued from now on use the new address; the cache is kept.
    ///
    /// # Errors
    ///
    /// Returns `NaimError::Transport` if a client for the new address
    /// cannot be built. The old endpoint stays in use.
    pub fn retarget(&self, receiver: Arc<ReceiverDescriptor>) -> Result<()> {
        if *self.inner.endpoint.read().receiver == *receiver {
            return Ok(());
        }
        let client = NaimClient::for_receiver(&receiver, self.inner.api_port, self.inner.request_timeout)?;
        tracing::info!("{}: now reached at {}", self.name(), client.base_url());
        *self.inner.endpoint.write() = Endpoint { receiver, client };
        Ok(())
    }

    /// Inputs as of the last refresh
    pub fn inputs(&self) -> Vec<InputDescriptor> {
        self.inner.inputs.lock().clone()
    }

    /// Snapshot of the cache
    pub fn state(&self) -> ReceiverState {
        ReceiverState {
            power_on: self.inner.power.get(),
            current_media_state: self.inner.media.get(),
            mute: self.inner.mute.get(),
            volume: self.inner.volume.get(),
            current_input_index: self.input_index(self.inner.active_input.get().as_deref()),
        }
    }

    fn services(&self) -> Vec<ServiceRef> {
        match self.inner.role {
            Role::Receiver => vec![
                ServiceRef::Information,
                ServiceRef::Television,
                ServiceRef::TelevisionSpeaker,
            ],
            Role::Speaker => vec![ServiceRef::Information, ServiceRef::SmartSpeaker],
        }
    }

    fn primary_service(&self) -> ServiceRef {
        match self.inner.role {
            Role::Receiver => ServiceRef::Television,
            Role::Speaker => ServiceRef::SmartSpeaker,
        }
    }

    fn audio_service(&self) -> ServiceRef {
        match self.inner.role {
            Role::Receiver => ServiceRef::TelevisionSpeaker,
            Role::Speaker => ServiceRef::SmartSpeaker,
        }
    }

    fn information(&self) -> AccessoryInformation {
        let receiver = self.receiver();
        AccessoryInformation {
            manufacturer: receiver
                .manufacturer
                .clone()
                .unwrap_or_else(|| DEFAULT_MANUFACTURER.to_string()),
            model: receiver
                .model_name
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            serial_number: receiver
                .serial_number
                .clone()
                .unwrap_or_else(|| DEFAULT_SERIAL.to_string()),
        }
    }

    /// Fill in the serial number from the device when discovery did not provide one
    pub async fn sync_information(&self) {
        if self.receiver().serial_number.is_some() {
            return;
        }

        match self
            .client()
            .get_text(paths::SYSTEM, keys::HARDWARE_SERIAL)
            .await
        {
            Ok(Some(serial)) if !serial.trim().is_empty() => {
                let mut information = self.information();
                information.serial_number = serial.trim().to_string();
                self.inner.host.set_information(self.id(), &information);
            }
            Ok(_) => tracing::debug!("{}: no hardware serial reported", self.name()),
            Err(_) => {}
        }
    }

    fn input_index(&self, path: Option<&str>) -> Option<u32> {
        let path = path?;
        self.inner
            .inputs
            .lock()
            .iter()
            .find(|input| input.path == path)
            .map(|input| input.identifier)
    }

    fn active_identifier(&self) -> CharacteristicValue {
        self.input_index(self.inner.active_input.get().as_deref())
            .unwrap_or(0)
            .into()
    }

    fn push(&self, characteristic: Characteristic, value: CharacteristicValue) {
        let service = match characteristic {
            Characteristic::Mute | Characteristic::Volume => self.audio_service(),
            _ => self.primary_service(),
        };
        self.inner
            .host
            .update_characteristic(self.id(), &service, characteristic, value);
    }

    fn capability(characteristic: Characteristic) -> Option<Capability> {
        match characteristic {
            Characteristic::Active => Some(Capability::Power),
            Characteristic::CurrentMediaState | Characteristic::TargetMediaState => {
                Some(Capability::PlaybackControl)
            }
            Characteristic::Mute => Some(Capability::MuteControl),
            Characteristic::Volume => Some(Capability::VolumeControl),
            Characteristic::ActiveIdentifier => Some(Capability::InputSelection),
            Characteristic::ConfiguredName | Characteristic::Identifier => None,
        }
    }

    fn supports(&self, characteristic: Characteristic) -> bool {
        Self::capability(characteristic).is_some_and(|c| self.inner.role.supports(c))
    }

    /// Cached value of a network-backed characteristic
    fn cached(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        if !self.supports(characteristic) {
            return None;
        }
        let inner = &self.inner;
        Some(match characteristic {
            Characteristic::Active => inner.power.get().into(),
            Characteristic::CurrentMediaState | Characteristic::TargetMediaState => {
                inner.media.get().code().into()
            }
            Characteristic::Mute => inner.mute.get().into(),
            Characteristic::Volume => inner.volume.get().into(),
            Characteristic::ActiveIdentifier => self.active_identifier(),
            Characteristic::ConfiguredName | Characteristic::Identifier => return None,
        })
    }

    /// Issue a device read now. The returned future settles the cache and
    /// pushes the outcome to the host.
    fn start_refresh(&self, characteristic: Characteristic) -> Option<BoxFuture<'static, Option<CharacteristicValue>>> {
        if !self.supports(characteristic) {
            return None;
        }
        let this = self.clone();
        let client = self.client();

        let settled: BoxFuture<'static, Option<CharacteristicValue>> = match characteristic {
            Characteristic::Active => {
                let read = self.inner.power.refresh(async move {
                    Ok(decode_power(client.get_text(paths::POWER, keys::SYSTEM).await?.as_deref()))
                });
                read.map(|v| v.map(CharacteristicValue::from)).boxed()
            }
            Characteristic::CurrentMediaState | Characteristic::TargetMediaState => {
                let read = self.inner.media.refresh(async move {
                    Ok(decode_media_state(
                        client
                            .get_text(paths::NOW_PLAYING, keys::TRANSPORT_STATE)
                            .await?
                            .as_deref(),
                    ))
                });
                read.map(|v| v.map(|state| CharacteristicValue::from(state.code()))).boxed()
            }
            Characteristic::Mute => {
                let read = self.inner.mute.refresh(async move {
                    Ok(decode_flag(client.get_text(paths::ROOM_LEVELS, keys::MUTE).await?.as_deref()))
                });
                read.map(|v| v.map(CharacteristicValue::from)).boxed()
            }
            Characteristic::Volume => {
                let read = self.inner.volume.refresh(async move {
                    let level = client
                        .get_text(paths::ROOM_LEVELS, keys::VOLUME)
                        .await?
                        .ok_or_else(|| NaimError::InvalidResponse("no volume reported".to_string()))?;
                    Ok(decode_volume(Some(level.as_str())))
                });
                read.map(|v| v.map(CharacteristicValue::from)).boxed()
            }
            Characteristic::ActiveIdentifier => {
                let read = self.inner.active_input.refresh(async move {
                    client.get_text(paths::NOW_PLAYING, keys::SOURCE).await
                });
                let this = this.clone();
                read.map(move |v| v.map(|_| this.active_identifier())).boxed()
            }
            Characteristic::ConfiguredName | Characteristic::Identifier => return None,
        };

        // The device only reports the current transport state
        let reported = match characteristic {
            Characteristic::TargetMediaState => Characteristic::CurrentMediaState,
            other => other,
        };
        Some(
            async move {
                let value = settled.await?;
                this.push(reported, value.clone());
                Some(value)
            }
            .boxed(),
        )
    }

    /// Read `characteristic` from the device, update the cache and push the result.
    ///
    /// Returns `None` if the characteristic is not handled by this role or
    /// a newer write made the reply stale.
    pub async fn refresh(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        self.start_refresh(characteristic)?.await
    }

    /// Apply a write to the cache now. The returned future sends it and
    /// pushes a correction if the device refuses.
    fn start_write(&self, characteristic: Characteristic, value: CharacteristicValue) -> Option<BoxFuture<'static, ()>> {
        if !self.supports(characteristic) {
            tracing::debug!("{}: {:?} is read-only or unsupported", self.name(), characteristic);
            return None;
        }
        let this = self.clone();
        let client = self.client();

        let reverted: BoxFuture<'static, Option<CharacteristicValue>> = match characteristic {
            Characteristic::Active => {
                let on = value.as_bool();
                tracing::info!("{}: set power {}", self.name(), if on { "on" } else { "off" });
                self.inner
                    .power
                    .store(on, move |on| async move {
                        client.put(paths::POWER, keys::SYSTEM, encode_power(on), false).await
                    })
                    .map(|v| v.map(CharacteristicValue::from))
                    .boxed()
            }
            Characteristic::TargetMediaState | Characteristic::CurrentMediaState => {
                let guess = self.inner.media.get().toggled();
                let write = self.inner.media.store(guess, move |_| async move {
                    client
                        .put(paths::NOW_PLAYING, keys::CMD, commands::PLAY_PAUSE, true)
                        .await
                });
                self.push(Characteristic::CurrentMediaState, guess.code().into());
                return Some(
                    async move {
                        if let Some(previous) = write.await {
                            this.push(Characteristic::CurrentMediaState, previous.code().into());
                        }
                    }
                    .boxed(),
                );
            }
            Characteristic::Mute => {
                let mute = value.as_bool();
                self.inner
                    .mute
                    .store(mute, move |mute| async move {
                        client.put(paths::ROOM_LEVELS, keys::MUTE, encode_flag(mute), false).await
                    })
                    .map(|v| v.map(CharacteristicValue::from))
                    .boxed()
            }
            Characteristic::Volume => {
                let Some(level) = value.as_int() else {
                    tracing::warn!("{}: ignoring non-numeric volume {:?}", self.name(), value);
                    return None;
                };
                let level = level.clamp(0, 100) as VolumeLevel;
                self.inner
                    .volume
                    .store(level, move |level| async move {
                        client
                            .put(paths::ROOM_LEVELS, keys::VOLUME, &level.to_string(), false)
                            .await
                    })
                    .map(|v| v.map(CharacteristicValue::from))
                    .boxed()
            }
            Characteristic::ActiveIdentifier => {
                let index = value.as_int();
                let path = index.and_then(|index| {
                    self.inner
                        .inputs
                        .lock()
                        .iter()
                        .find(|input| i64::from(input.identifier) == index)
                        .map(|input| input.path.clone())
                });
                let Some(path) = path.filter(|path| !path.is_empty()) else {
                    tracing::warn!("{}: no selectable input with identifier {:?}", self.name(), index);
                    self.push(Characteristic::ActiveIdentifier, self.active_identifier());
                    return None;
                };

                let reverting = this.clone();
                self.inner
                    .active_input
                    .store(Some(path), move |path| async move {
                        let path = path.unwrap_or_default();
                        client.put(&path, keys::CMD, commands::SELECT, true).await
                    })
                    .map(move |v| v.map(|_| reverting.active_identifier()))
                    .boxed()
            }
            Characteristic::ConfiguredName | Characteristic::Identifier => return None,
        };

        Some(
            async move {
                if let Some(previous) = reverted.await {
                    this.push(characteristic, previous);
                }
            }
            .boxed(),
        )
    }

    /// Write `characteristic` to the device, optimistically.
    pub async fn set(&self, characteristic: Characteristic, value: CharacteristicValue) {
        if let Some(write) = self.start_write(characteristic, value) {
            write.await;
        }
    }

    /// Rebuild the input list from the device and sync the input services.
    ///
    /// Returns the number of exposed inputs. Roles without input
    /// selection do nothing.
    pub async fn refresh_inputs(&self) -> Result<usize> {
        if !self.inner.role.supports(Capability::InputSelection) {
            return Ok(0);
        }

        let raw: Vec<RawInput> = self
            .client()
            .get_as(paths::INPUTS, keys::CHILDREN)
            .await?
            .unwrap_or_default();
        let inputs = build_input_list(raw);

        let host = &self.inner.host;
        let id = self.id();
        let exposed: Vec<String> = host
            .services(id)
            .iter()
            .filter_map(|service| service.input_name().map(str::to_string))
            .collect();

        for stale in exposed.iter().filter(|name| !inputs.iter().any(|i| &i.name == *name)) {
            tracing::debug!("{}: removing input {}", self.name(), stale);
            host.remove_service(id, &ServiceRef::InputSource(stale.clone()));
        }

        let mut published = HashSet::new();
        for input in &inputs {
            if !published.insert(input.name.as_str()) {
                tracing::warn!("{}: duplicate input name {}, not exposed twice", self.name(), input.name);
                continue;
            }
            if exposed.contains(&input.name) {
                host.update_characteristic(
                    id,
                    &ServiceRef::InputSource(input.name.clone()),
                    Characteristic::Identifier,
                    input.identifier.into(),
                );
            } else {
                host.add_input_source(
                    id,
                    &InputSource {
                        identifier: input.identifier,
                        name: input.name.clone(),
                        source_type: input.source_type,
                    },
                );
            }
        }

        let count = published.len();
        *self.inner.inputs.lock() = inputs;
        tracing::info!("{}: {} inputs available", self.name(), count);

        if self.inner.active_input.get().is_some() {
            self.push(Characteristic::ActiveIdentifier, self.active_identifier());
        }
        Ok(count)
    }

    fn input_characteristic(&self, name: &str, characteristic: Characteristic) -> Option<CharacteristicValue> {
        let inputs = self.inner.inputs.lock();
        let input = inputs.iter().find(|input| input.name == name)?;
        match characteristic {
            Characteristic::Identifier => Some(input.identifier.into()),
            Characteristic::ConfiguredName => Some(input.name.clone().into()),
            _ => None,
        }
    }
}

impl CharacteristicHandler for AccessoryController {
    fn on_get(&self, service: &ServiceRef, characteristic: Characteristic) -> Option<CharacteristicValue> {
        if let Some(name) = service.input_name() {
            return self.input_characteristic(name, characteristic);
        }
        if characteristic == Characteristic::ConfiguredName {
            return Some(self.inner.name.clone().into());
        }

        let value = self.cached(characteristic)?;
        if let Some(refresh) = self.start_refresh(characteristic) {
            tokio::spawn(refresh);
        }
        Some(value)
    }

    fn on_set(&self, service: &ServiceRef, characteristic: Characteristic, value: CharacteristicValue) {
        if service.input_name().is_some() {
            return;
        }
        if let Some(write) = self.start_write(characteristic, value) {
            tokio::spawn(write);
        }
    }
}
