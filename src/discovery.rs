use crate::descriptor::DescriptorResolver;
use crate::error::{NaimError, Result};
use crate::types::ReceiverDescriptor;
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use ssdp_client::{SearchTarget, URN};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Device type searched for by default
pub const DEFAULT_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:MediaRenderer:2";

/// Default length of the discovery window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// One response to the discovery query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Descriptor document URL
    pub location: String,
    /// Network address of the responding device
    pub sender: String,
}

impl SearchHit {
    /// Build a hit from an announced location, taking the sender from its host
    pub fn from_location(location: &str) -> Option<Self> {
        let url = url::Url::parse(location).ok()?;
        let sender = url.host_str()?.to_string();
        Some(Self {
            location: location.to_string(),
            sender,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Searching,
    Closed,
}

/// Time-boxed discovery of receivers on the local network
///
/// One run lasts for the configured window. Every response is resolved
/// concurrently; accepted receivers are handed over in completion order,
/// at most once per name.
///
/// # Example
///
/// ```no_run
/// use naim_bridge::{DescriptorResolver, Discovery};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let resolver = Arc::new(DescriptorResolver::new("Naim", Duration::from_secs(5)));
///     let mut discovery = Discovery::new(resolver, Duration::from_secs(10));
///
///     discovery
///         .run(naim_bridge::DEFAULT_SEARCH_TARGET, |receiver| {
///             println!("Found {} at {}", receiver.name, receiver.ip_address);
///         })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Discovery {
    resolver: Arc<DescriptorResolver>,
    window: Duration,
    state: DiscoveryState,
    seen: HashSet<String>,
}

impl Discovery {
    pub fn new(resolver: Arc<DescriptorResolver>, window: Duration) -> Self {
        Self {
            resolver,
            window,
            state: DiscoveryState::Idle,
            seen: HashSet::new(),
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Names of the receivers accepted in the last run
    pub fn seen(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    /// Search the network for `search_target` and report receivers.
    ///
    /// Returns the number of receivers reported.
    ///
    /// # Errors
    ///
    /// Returns `NaimError::Discovery` if the search target is not a valid
    /// URN or the multicast search cannot be started.
    pub async fn run<F>(&mut self, search_target: &str, on_receiver: F) -> Result<usize>
    where
        F: FnMut(Arc<ReceiverDescriptor>),
    {
        let urn: URN = search_target
            .parse()
            .map_err(|e| NaimError::Discovery(format!("Invalid search target {}: {}", search_target, e)))?;
        let target = SearchTarget::URN(urn);

        tracing::debug!("Searching for {} during {:?}", search_target, self.window);
        let responses = ssdp_client::search(&target, self.window, 2, None)
            .await
            .map_err(|e| NaimError::Discovery(e.to_string()))?;

        let hits = responses.filter_map(|response| async move {
            match response {
                Ok(response) => SearchHit::from_location(response.location()),
                Err(e) => {
                    tracing::debug!("SSDP response error: {}", e);
                    None
                }
            }
        });

        Ok(self.run_with(hits, on_receiver).await)
    }

    /// Run one discovery window over an already-open stream of responses.
    pub async fn run_with<S, F>(&mut self, hits: S, mut on_receiver: F) -> usize
    where
        S: Stream<Item = SearchHit>,
        F: FnMut(Arc<ReceiverDescriptor>),
    {
        self.state = DiscoveryState::Searching;
        self.seen.clear();

        let deadline = tokio::time::sleep(self.window);
        tokio::pin!(deadline);
        let hits = hits.fuse();
        tokio::pin!(hits);

        let mut locations = HashSet::new();
        let mut pending = FuturesUnordered::new();
        let mut hits_done = false;
        let mut found = 0;

        loop {
            if hits_done && pending.is_empty() {
                break;
            }

            tokio::select! {
                _ = &mut deadline => {
                    if !pending.is_empty() {
                        tracing::debug!("Dropping {} unresolved responses", pending.len());
                    }
                    break;
                }
                hit = hits.next(), if !hits_done => match hit {
                    Some(hit) => {
                        // Devices answer every retransmitted query
                        if locations.insert(hit.location.clone()) {
                            let resolver = Arc::clone(&self.resolver);
                            pending.push(async move { resolver.resolve(&hit).await });
                        }
                    }
                    None => hits_done = true,
                },
                Some(resolved) = pending.next(), if !pending.is_empty() => {
                    let Some(receiver) = resolved else { continue };

                    if !self.seen.insert(receiver.name.clone()) {
                        tracing::info!("{}: Already configured -> skipping", receiver.name);
                        continue;
                    }

                    tracing::info!("Found Naim device: {} at {}", receiver.name, receiver.ip_address);
                    found += 1;
                    on_receiver(Arc::new(receiver));
                }
            }
        }

        self.state = DiscoveryState::Closed;
        if found == 0 {
            tracing::warn!("No Naim Audio device found on your network!");
        }
        found
    }
}
