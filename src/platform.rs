use crate::config::PlatformConfig;
use crate::controller::AccessoryController;
use crate::descriptor::DescriptorResolver;
use crate::discovery::{Discovery, SearchHit};
use crate::error::Result;
use crate::host::{AccessoryHost, HapContext, PlatformAccessory};
use crate::reconciler::Reconciler;
use futures_util::stream::Stream;
use std::sync::Arc;

/// Name the plugin registers under
pub const PLUGIN_NAME: &str = "homebridge-naim-audio";

/// Platform identifier used in the host's configuration
pub const PLATFORM_NAME: &str = "NaimAudioPlatform";

/// Dynamic platform plugin
///
/// The host hands back cached accessories through
/// [`configure_accessory`](Self::configure_accessory), then calls
/// [`did_finish_launching`](Self::did_finish_launching) once, which runs
/// discovery and attaches a controller to every accessory.
pub struct NaimPlatform {
    config: PlatformConfig,
    hap: HapContext,
    reconciler: Reconciler,
    discovery: Discovery,
    controllers: Vec<AccessoryController>,
}

impl NaimPlatform {
    pub fn new(config: PlatformConfig, host: Arc<dyn AccessoryHost>) -> Self {
        let hap = HapContext::new(host);
        let reconciler = Reconciler::new(hap.clone(), config.api_port, config.request_timeout());
        let resolver = Arc::new(DescriptorResolver::new(
            config.brand_marker.clone(),
            config.request_timeout(),
        ));
        let discovery = Discovery::new(resolver, config.discovery_window());

        tracing::debug!("Finished initializing platform: {}", config.name);
        Self {
            config,
            hap,
            reconciler,
            discovery,
            controllers: Vec::new(),
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn hap(&self) -> &HapContext {
        &self.hap
    }

    pub fn controllers(&self) -> &[AccessoryController] {
        &self.controllers
    }

    /// Called by the host for every accessory restored from its cache
    pub fn configure_accessory(&mut self, accessory: PlatformAccessory) {
        tracing::info!("Loading accessory from cache: {}", accessory.display_name);
        self.reconciler.restore(accessory);
    }

    /// Run one discovery window on the network.
    ///
    /// Returns the number of receivers found.
    ///
    /// # Errors
    ///
    /// Returns an error only if the search itself cannot be started.
    pub async fn did_finish_launching(&mut self) -> Result<usize> {
        tracing::info!("Start discovering Naim Audio devices with uPnP");

        let search_target = self.config.search_target.clone();
        let reconciler = &mut self.reconciler;
        let mut attached = Vec::new();

        let result = self
            .discovery
            .run(&search_target, |receiver| {
                attached.extend(reconciler.process_receiver(receiver).controllers);
            })
            .await;

        if let Err(e) = &result {
            tracing::error!("An error occured during discovering: {}", e);
        }
        self.finish_pass(attached);
        result
    }

    /// Run one discovery window over responses from another source
    pub async fn discover_from<S>(&mut self, hits: S) -> usize
    where
        S: Stream<Item = SearchHit>,
    {
        let reconciler = &mut self.reconciler;
        let mut attached = Vec::new();

        let found = self
            .discovery
            .run_with(hits, |receiver| {
                attached.extend(reconciler.process_receiver(receiver).controllers);
            })
            .await;

        self.finish_pass(attached);
        found
    }

    /// Attach what is left and rebuild the inputs of every controller
    fn finish_pass(&mut self, mut attached: Vec<AccessoryController>) {
        attached.extend(self.reconciler.attach_unmatched());
        self.controllers.extend(attached);

        for controller in &self.controllers {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller.sync_information().await;
                if let Err(e) = controller.refresh_inputs().await {
                    tracing::warn!("{}: unable to load inputs: {}", controller.name(), e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{CapturedLogs, RecordingHost};
    use crate::types::{Category, ReceiverDescriptor};
    use futures_util::stream;

    #[tokio::test(start_paused = true)]
    async fn test_empty_network_publishes_nothing() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let host = RecordingHost::new();
        let mut platform = NaimPlatform::new(PlatformConfig::default(), host.clone());

        let found = platform.discover_from(stream::pending::<SearchHit>()).await;

        assert_eq!(found, 0);
        assert!(host.published.lock().is_empty());
        assert!(platform.controllers().is_empty());
        assert!(logs.contents().contains("No Naim Audio device found on your network!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_accessory_is_controlled_without_discovery() {
        let host = RecordingHost::new();
        let mut platform = NaimPlatform::new(PlatformConfig::default(), host.clone());

        let id = platform.hap().generate_uuid("Ampli");
        let mut accessory = PlatformAccessory::new("Ampli", id, Category::AudioReceiver);
        accessory.context.receiver = Some(Arc::new(ReceiverDescriptor {
            name: "Ampli".into(),
            ip_address: "127.0.0.1".into(),
            manufacturer: Some("Naim Audio".into()),
            manufacturer_url: None,
            model_name: None,
            model_number: None,
            serial_number: Some("461540".into()),
            uuid: None,
        }));
        platform.configure_accessory(accessory);

        platform.discover_from(stream::empty::<SearchHit>()).await;

        assert_eq!(platform.controllers().len(), 1);
        assert_eq!(platform.controllers()[0].id(), id);
        assert!(host.published.lock().is_empty());
    }
}
