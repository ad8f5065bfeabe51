use crate::controller::AccessoryController;
use crate::host::{HapContext, PlatformAccessory};
use crate::types::{AccessoryId, Category, ReceiverDescriptor, Role};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Accessories known to the host
///
/// Restored entries come from the host's cache at startup; created
/// entries were published during this run. Nothing is ever removed.
#[derive(Debug, Default)]
pub struct AccessoryRegistry {
    restored: Vec<PlatformAccessory>,
    created: Vec<PlatformAccessory>,
}

impl AccessoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accessory handed back by the host
    pub fn restore(&mut self, accessory: PlatformAccessory) {
        match self.restored.iter_mut().find(|a| a.uuid == accessory.uuid) {
            Some(existing) => *existing = accessory,
            None => self.restored.push(accessory),
        }
    }

    pub fn restored(&self) -> &[PlatformAccessory] {
        &self.restored
    }

    pub fn created(&self) -> &[PlatformAccessory] {
        &self.created
    }

    pub fn find_restored(&self, id: AccessoryId) -> Option<&PlatformAccessory> {
        self.restored.iter().find(|a| a.uuid == id)
    }

    fn find_restored_mut(&mut self, id: AccessoryId) -> Option<&mut PlatformAccessory> {
        self.restored.iter_mut().find(|a| a.uuid == id)
    }

    fn find_mut(&mut self, id: AccessoryId) -> Option<&mut PlatformAccessory> {
        self.restored
            .iter_mut()
            .chain(self.created.iter_mut())
            .find(|a| a.uuid == id)
    }

    /// Whether the host already knows this identity
    pub fn contains(&self, id: AccessoryId) -> bool {
        self.find_restored(id).is_some() || self.created.iter().any(|a| a.uuid == id)
    }

    fn record_created(&mut self, accessories: Vec<PlatformAccessory>) {
        self.created.extend(accessories);
    }
}

/// Outcome of reconciling one receiver
#[derive(Default)]
pub struct Reconciled {
    /// Restored accessories that were reused
    pub reused: Vec<AccessoryId>,
    /// Accessories published in this call, as one batch
    pub published: Vec<AccessoryId>,
    /// Controllers attached in this call
    pub controllers: Vec<AccessoryController>,
}

/// Matches discovered receivers against known accessories
pub struct Reconciler {
    hap: HapContext,
    api_port: u16,
    request_timeout: Duration,
    registry: AccessoryRegistry,
    attached: HashMap<AccessoryId, AccessoryController>,
}

impl Reconciler {
    pub fn new(hap: HapContext, api_port: u16, request_timeout: Duration) -> Self {
        Self {
            hap,
            api_port,
            request_timeout,
            registry: AccessoryRegistry::new(),
            attached: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &AccessoryRegistry {
        &self.registry
    }

    pub fn restore(&mut self, accessory: PlatformAccessory) {
        self.registry.restore(accessory);
    }

    /// Reuse or create the accessories of every role for `receiver`.
    ///
    /// Restored accessories are never published again. New ones are
    /// published together in a single call. Identities that already have
    /// a controller get their context and address refreshed instead.
    pub fn process_receiver(&mut self, receiver: Arc<ReceiverDescriptor>) -> Reconciled {
        let mut reconciled = Reconciled::default();
        let mut created = Vec::new();

        for role in Role::ALL {
            let name = role.accessory_name(&receiver.name);
            let id = self.hap.generate_uuid(&name);

            if let Some(controller) = self.attached.get(&id) {
                tracing::debug!("{}: already attached", name);
                if let Some(known) = self.registry.find_mut(id) {
                    refresh_context(&self.hap, known, &receiver);
                }
                if let Err(e) = controller.retarget(Arc::clone(&receiver)) {
                    e.report();
                }
                continue;
            }

            let accessory = match self.registry.find_restored_mut(id) {
                Some(restored) => {
                    tracing::info!("Restoring existing accessory from cache: {}", restored.display_name);
                    refresh_context(&self.hap, restored, &receiver);
                    reconciled.reused.push(id);
                    restored.clone()
                }
                None => {
                    tracing::info!("Adding new accessory: {}", name);
                    let mut accessory = PlatformAccessory::new(name, id, role.category());
                    accessory.context.receiver = Some(Arc::clone(&receiver));
                    created.push(accessory.clone());
                    accessory
                }
            };

            if let Some(controller) = self.attach(&accessory, role) {
                reconciled.controllers.push(controller);
            }
        }

        if !created.is_empty() {
            self.hap.host().publish_external_accessories(&created);
            reconciled.published = created.iter().map(|a| a.uuid).collect();
            self.registry.record_created(created);
        }

        reconciled
    }

    /// Attach restored accessories no receiver matched, from their persisted context
    pub fn attach_unmatched(&mut self) -> Vec<AccessoryController> {
        let unmatched: Vec<PlatformAccessory> = self
            .registry
            .restored()
            .iter()
            .filter(|a| !self.attached.contains_key(&a.uuid))
            .cloned()
            .collect();

        unmatched
            .iter()
            .filter_map(|accessory| {
                tracing::info!("{}: not discovered, using last known address", accessory.display_name);
                self.attach(accessory, role_for(accessory.category))
            })
            .collect()
    }

    fn attach(&mut self, accessory: &PlatformAccessory, role: Role) -> Option<AccessoryController> {
        match AccessoryController::attach(&self.hap, accessory, role, self.api_port, self.request_timeout) {
            Ok(controller) => {
                self.attached.insert(accessory.uuid, controller.clone());
                Some(controller)
            }
            Err(e) => {
                e.report();
                None
            }
        }
    }
}

/// Store `receiver` in the accessory's context and persist it if it changed
fn refresh_context(hap: &HapContext, accessory: &mut PlatformAccessory, receiver: &Arc<ReceiverDescriptor>) {
    if accessory.context.receiver.as_deref() != Some(receiver.as_ref()) {
        accessory.context.receiver = Some(Arc::clone(receiver));
        hap.host().update_platform_accessories(std::slice::from_ref(accessory));
    }
}

fn role_for(category: Category) -> Role {
    match category {
        Category::AudioReceiver => Role::Receiver,
        Category::Speaker => Role::Speaker,
    }
}
