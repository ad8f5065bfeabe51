use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable accessory identifier derived from a name
pub type AccessoryId = Uuid;

/// Volume level as reported by the receiver (0-100)
pub type VolumeLevel = u32;

/// A receiver found during discovery
///
/// Built once from a descriptor document and never mutated afterwards.
/// Accessories keep a shared reference to it in their persisted context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverDescriptor {
    pub name: String,
    pub ip_address: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default, rename = "manufacturerURL")]
    pub manufacturer_url: Option<String>,
    #[serde(default, rename = "modelName")]
    pub model_name: Option<String>,
    #[serde(default, rename = "modelNumber")]
    pub model_number: Option<String>,
    #[serde(default, rename = "serialNumber")]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl ReceiverDescriptor {
    /// Base URL of the receiver's control API
    pub fn base_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.ip_address, port)
    }
}

/// Role an accessory plays for its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Receiver,
    Speaker,
}

impl Role {
    /// All modeled roles, primary first
    pub const ALL: [Role; 2] = [Role::Receiver, Role::Speaker];

    /// Accessory name for this role, derived from the receiver name
    pub fn accessory_name(&self, receiver_name: &str) -> String {
        match self {
            Role::Receiver => receiver_name.to_string(),
            Role::Speaker => format!("{}Speaker", receiver_name),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Role::Receiver => Category::AudioReceiver,
            Role::Speaker => Category::Speaker,
        }
    }

    /// Capabilities exposed by accessories in this role
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Receiver => &[
                Capability::Power,
                Capability::PlaybackControl,
                Capability::VolumeControl,
                Capability::MuteControl,
                Capability::InputSelection,
            ],
            Role::Speaker => &[
                Capability::PlaybackControl,
                Capability::VolumeControl,
                Capability::MuteControl,
            ],
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// One controllable aspect of a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Power,
    PlaybackControl,
    VolumeControl,
    MuteControl,
    InputSelection,
}

/// Accessory category announced to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Speaker,
    AudioReceiver,
}

impl Category {
    /// HAP category code
    pub fn code(&self) -> u8 {
        match self {
            Category::Speaker => 26,
            Category::AudioReceiver => 34,
        }
    }
}

/// Exposed transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaState {
    Play,
    Pause,
    #[default]
    Stop,
}

impl MediaState {
    /// HAP characteristic value
    pub fn code(&self) -> i64 {
        match self {
            MediaState::Play => 0,
            MediaState::Pause => 1,
            MediaState::Stop => 2,
        }
    }

    /// Guess of the state after a play/pause toggle
    pub fn toggled(&self) -> MediaState {
        match self {
            MediaState::Play => MediaState::Pause,
            _ => MediaState::Play,
        }
    }
}

/// Source category of an input, used by the host for icons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSourceType {
    Other,
    Tuner,
    Hdmi,
    Airplay,
    Usb,
    Application,
}

impl InputSourceType {
    /// Classify an input by its canonical name
    pub fn from_name(name: &str) -> Self {
        match name {
            "HDMI" => InputSourceType::Hdmi,
            "Internet Radio" => InputSourceType::Tuner,
            "Airplay" | "Chromecast built-in" => InputSourceType::Airplay,
            "USB" => InputSourceType::Usb,
            "Spotify" | "TIDAL" | "Qobuz" => InputSourceType::Application,
            _ => InputSourceType::Other,
        }
    }

    /// HAP characteristic value
    pub fn code(&self) -> i64 {
        match self {
            InputSourceType::Other => 0,
            InputSourceType::Tuner => 2,
            InputSourceType::Hdmi => 3,
            InputSourceType::Airplay => 8,
            InputSourceType::Usb => 9,
            InputSourceType::Application => 10,
        }
    }
}

/// A selectable input of a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    /// Display name (alias if set, else the corrected canonical name)
    pub name: String,
    /// Vendor-internal name, with "Playqueue" already corrected
    pub canonical_name: String,
    /// Resource path used to select the input, e.g. `/inputs/hdmi`
    pub path: String,
    pub source_type: InputSourceType,
    /// Position in the filtered list
    pub identifier: u32,
}

/// Snapshot of a controller's cached receiver state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverState {
    pub power_on: bool,
    pub current_media_state: MediaState,
    pub mute: bool,
    pub volume: VolumeLevel,
    pub current_input_index: Option<u32>,
}
