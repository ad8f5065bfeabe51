//! Descriptor document fetching and parsing.
//!
//! A discovered device serves an XML descriptor under the location it
//! announced. Only devices whose manufacturer carries the brand marker
//! are turned into a [`ReceiverDescriptor`].

use crate::discovery::SearchHit;
use crate::error::{NaimError, Result};
use crate::types::ReceiverDescriptor;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Root {
    device: Option<DeviceDescription>,
}

/// `root.device` of a descriptor document
///
/// Every field is optional on the wire; blank values are normalized to
/// `None` here so nothing downstream needs to care.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "manufacturerURL")]
    pub manufacturer_url: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: Option<String>,
}

impl DeviceDescription {
    /// Parse a descriptor document
    ///
    /// # Errors
    ///
    /// Returns `NaimError::ParseFailure` if the XML is malformed or has no device node.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml)
            .map_err(|e| NaimError::ParseFailure(format!("Failed to parse device XML: {}", e)))?;

        let device = root
            .device
            .ok_or_else(|| NaimError::ParseFailure("No device node in descriptor".to_string()))?;

        Ok(Self {
            device_type: blank_to_none(device.device_type),
            friendly_name: blank_to_none(device.friendly_name),
            manufacturer: blank_to_none(device.manufacturer),
            manufacturer_url: blank_to_none(device.manufacturer_url),
            model_name: blank_to_none(device.model_name),
            model_number: blank_to_none(device.model_number),
            serial_number: blank_to_none(device.serial_number),
            udn: blank_to_none(device.udn),
        })
    }

    /// Whether the manufacturer carries the vendor's brand marker
    pub fn is_supported(&self, brand_marker: &str) -> bool {
        self.manufacturer
            .as_deref()
            .is_some_and(|m| m.contains(brand_marker))
    }

    /// Build the receiver record; `None` if the device has no name
    pub fn into_receiver(self, ip_address: impl Into<String>) -> Option<ReceiverDescriptor> {
        Some(ReceiverDescriptor {
            name: self.friendly_name?,
            ip_address: ip_address.into(),
            manufacturer: self.manufacturer,
            manufacturer_url: self.manufacturer_url,
            model_name: self.model_name,
            model_number: self.model_number,
            serial_number: self.serial_number,
            uuid: self.udn,
        })
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turns discovery responses into receivers
pub struct DescriptorResolver {
    http: reqwest::Client,
    brand_marker: String,
}

impl DescriptorResolver {
    /// Descriptor fetches are bounded by `timeout`. If the HTTP stack
    /// cannot honor it, fetches are still cut off when the discovery
    /// window closes.
    pub fn new(brand_marker: impl Into<String>, timeout: Duration) -> Self {
        let http = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(http) => http,
            Err(e) => {
                tracing::error!("Unable to set a {:?} timeout on descriptor requests: {}", timeout, e);
                reqwest::Client::new()
            }
        };
        Self {
            http,
            brand_marker: brand_marker.into(),
        }
    }

    /// Fetch and check the descriptor behind a discovery response.
    ///
    /// Failures are logged and yield `None`; devices of other vendors
    /// yield `None` silently.
    pub async fn resolve(&self, hit: &SearchHit) -> Option<ReceiverDescriptor> {
        let xml = match self.fetch(&hit.location).await {
            Ok(xml) => xml,
            Err(e) => {
                e.report();
                return None;
            }
        };

        let device = match DeviceDescription::from_xml(&xml) {
            Ok(device) => device,
            Err(e) => {
                tracing::error!("Unable to parse response from SSDP ({}): {}", hit.location, e);
                return None;
            }
        };

        tracing::debug!(
            "New device found: name {:?}, manufacturer {:?}, model {:?}, address {}, type {:?}",
            device.friendly_name,
            device.manufacturer,
            device.model_name,
            hit.sender,
            device.device_type
        );

        if !device.is_supported(&self.brand_marker) {
            return None;
        }

        let receiver = device.into_receiver(hit.sender.clone());
        if receiver.is_none() {
            tracing::warn!("Ignoring device at {} without a friendly name", hit.sender);
        }
        receiver
    }

    async fn fetch(&self, location: &str) -> Result<String> {
        let transport = |e: reqwest::Error| {
            if let Some(status) = e.status() {
                NaimError::DeviceRejected {
                    url: location.to_string(),
                    status: status.as_u16(),
                    message: e.to_string(),
                }
            } else {
                NaimError::DeviceUnreachable {
                    url: location.to_string(),
                    message: e.to_string(),
                }
            }
        };

        self.http
            .get(location)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?
            .text()
            .await
            .map_err(transport)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Descriptor as served by a Uniti Atom
    pub fn naim_descriptor(name: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0" xmlns:dlna="urn:schemas-dlna-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:2</deviceType>
    <friendlyName>{}</friendlyName>
    <manufacturer>Naim Audio</manufacturer>
    <manufacturerURL>http://www.naimaudio.com/</manufacturerURL>
    <modelDescription>Naim all-in-one audio player</modelDescription>
    <modelName>Uniti Atom</modelName>
    <modelNumber>20-004-0028</modelNumber>
    <serialNumber>461540</serialNumber>
    <UDN>uuid:716e6e7e-85e8-4076-b210-2d225d709bf0</UDN>
    <dlna:X_DLNADOC>DMR-1.50</dlna:X_DLNADOC>
    <presentationURL>http://192.168.0.20/</presentationURL>
  </device>
</root>"#,
            name
        )
    }

    pub const OTHER_VENDOR: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:2</deviceType>
    <friendlyName>Living Room</friendlyName>
    <manufacturer>Sonos, Inc.</manufacturer>
    <modelName>Sonos One</modelName>
    <UDN>uuid:RINCON_000E58A0123456</UDN>
  </device>
</root>"#;
}
