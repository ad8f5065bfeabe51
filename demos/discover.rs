use naim_bridge::{
    AccessoryHost, AccessoryId, AccessoryInformation, Characteristic, CharacteristicHandler,
    CharacteristicValue, InputSource, NaimPlatform, PlatformAccessory, PlatformConfig, ServiceRef,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Host stand-in that logs what a real accessory host would be asked to do
#[derive(Default)]
struct LoggingHost {
    services: Mutex<HashMap<AccessoryId, Vec<ServiceRef>>>,
}

impl AccessoryHost for LoggingHost {
    fn publish_external_accessories(&self, accessories: &[PlatformAccessory]) {
        for accessory in accessories {
            tracing::info!(
                "publish {} ({}) category {}",
                accessory.display_name,
                accessory.uuid,
                accessory.category.code()
            );
        }
    }

    fn update_platform_accessories(&self, accessories: &[PlatformAccessory]) {
        for accessory in accessories {
            tracing::info!("update context of {}", accessory.display_name);
        }
    }

    fn set_information(&self, accessory: AccessoryId, information: &AccessoryInformation) {
        tracing::info!(
            "{}: {} {} (serial {})",
            accessory,
            information.manufacturer,
            information.model,
            information.serial_number
        );
    }

    fn bind(&self, accessory: AccessoryId, services: &[ServiceRef], _handler: Arc<dyn CharacteristicHandler>) {
        self.services
            .lock()
            .entry(accessory)
            .or_default()
            .extend(services.iter().cloned());
    }

    fn update_characteristic(
        &self,
        accessory: AccessoryId,
        service: &ServiceRef,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) {
        tracing::info!("{} {:?}.{:?} = {:?}", accessory, service, characteristic, value);
    }

    fn services(&self, accessory: AccessoryId) -> Vec<ServiceRef> {
        self.services
            .lock()
            .get(&accessory)
            .cloned()
            .unwrap_or_default()
    }

    fn add_input_source(&self, accessory: AccessoryId, source: &InputSource) {
        tracing::info!(
            "{}: input #{} {} ({:?})",
            accessory,
            source.identifier,
            source.name,
            source.source_type
        );
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut platform = NaimPlatform::new(PlatformConfig::default(), Arc::new(LoggingHost::default()));
    let found = platform.did_finish_launching().await?;
    println!("Found {} receiver(s)", found);

    // Give the input and serial lookups a moment
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    for controller in platform.controllers() {
        for characteristic in [Characteristic::Active, Characteristic::Volume, Characteristic::Mute] {
            controller.refresh(characteristic).await;
        }
        let state = controller.state();
        println!(
            "{} ({:?}) at {}: power {}, volume {}, mute {}, {} input(s)",
            controller.name(),
            controller.role(),
            controller.receiver().ip_address,
            state.power_on,
            state.volume,
            state.mute,
            controller.inputs().len()
        );
    }

    Ok(())
}
