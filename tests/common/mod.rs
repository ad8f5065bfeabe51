use naim_bridge::{
    AccessoryHost, AccessoryId, AccessoryInformation, Characteristic, CharacteristicHandler,
    CharacteristicValue, InputSource, PlatformAccessory, ServiceRef,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// In-memory accessory host
#[derive(Default)]
pub struct MemoryHost {
    pub published: Mutex<Vec<Vec<PlatformAccessory>>>,
    pub information: Mutex<HashMap<AccessoryId, AccessoryInformation>>,
    pub handlers: Mutex<HashMap<AccessoryId, Arc<dyn CharacteristicHandler>>>,
    pub services: Mutex<HashMap<AccessoryId, Vec<ServiceRef>>>,
    pub updates: Mutex<Vec<(AccessoryId, Characteristic, CharacteristicValue)>>,
}

impl MemoryHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published_accessories(&self) -> Vec<PlatformAccessory> {
        self.published.lock().iter().flatten().cloned().collect()
    }

    pub fn handler(&self, accessory: AccessoryId) -> Option<Arc<dyn CharacteristicHandler>> {
        self.handlers.lock().get(&accessory).cloned()
    }

    pub fn input_names(&self, accessory: AccessoryId) -> Vec<String> {
        self.services(accessory)
            .iter()
            .filter_map(|s| s.input_name().map(str::to_string))
            .collect()
    }

    /// Poll until the accessory exposes `count` input services
    pub async fn wait_for_inputs(&self, accessory: AccessoryId, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let names = self.input_names(accessory);
            if names.len() >= count {
                return names;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.input_names(accessory)
    }

    /// Poll until the accessory exposes exactly `expected`
    pub async fn wait_for_input_names(&self, accessory: AccessoryId, expected: &[&str]) -> Vec<String> {
        for _ in 0..200 {
            let names = self.input_names(accessory);
            if names == expected {
                return names;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.input_names(accessory)
    }
}

impl AccessoryHost for MemoryHost {
    fn publish_external_accessories(&self, accessories: &[PlatformAccessory]) {
        self.published.lock().push(accessories.to_vec());
    }

    fn update_platform_accessories(&self, _accessories: &[PlatformAccessory]) {}

    fn set_information(&self, accessory: AccessoryId, information: &AccessoryInformation) {
        self.information.lock().insert(accessory, information.clone());
    }

    fn bind(&self, accessory: AccessoryId, services: &[ServiceRef], handler: Arc<dyn CharacteristicHandler>) {
        self.handlers.lock().insert(accessory, handler);
        self.services
            .lock()
            .entry(accessory)
            .or_default()
            .extend(services.iter().cloned());
    }

    fn update_characteristic(
        &self,
        accessory: AccessoryId,
        _service: &ServiceRef,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) {
        self.updates.lock().push((accessory, characteristic, value));
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

/// Descriptor document of a receiver named `name`
pub fn descriptor(name: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:2</deviceType>
    <friendlyName>{}</friendlyName>
    <manufacturer>Naim Audio Ltd.</manufacturer>
    <manufacturerURL>http://www.naimaudio.com/</manufacturerURL>
    <modelName>Mu-so 2nd Generation</modelName>
    <modelNumber>20-004-0044</modelNumber>
    <serialNumber>2201234</serialNumber>
    <UDN>uuid:3f8b4b8e-1d2c-4a43-9a1e-0002a1b2c3d4</UDN>
  </device>
</root>"#,
        name
    )
}

/// Port of a mockito server
pub fn port(server: &mockito::ServerGuard) -> u16 {
    server
        .host_with_port()
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .expect("mockito server port")
}
