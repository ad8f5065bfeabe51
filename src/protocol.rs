//! Vocabulary of the receiver's HTTP control API (port 15081).

use crate::types::{InputDescriptor, InputSourceType, MediaState, VolumeLevel};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Default control API port
pub const DEFAULT_API_PORT: u16 = 15081;

/// Control API resource paths
pub mod paths {
    pub const POWER: &str = "/power";
    pub const NOW_PLAYING: &str = "/nowplaying";
    pub const ROOM_LEVELS: &str = "/levels/room";
    pub const INPUTS: &str = "/inputs";
    pub const SYSTEM: &str = "/system";
}

/// JSON keys / query parameters
pub mod keys {
    pub const SYSTEM: &str = "system";
    pub const TRANSPORT_STATE: &str = "transportState";
    pub const CMD: &str = "cmd";
    pub const SOURCE: &str = "source";
    pub const MUTE: &str = "mute";
    pub const VOLUME: &str = "volume";
    pub const CHILDREN: &str = "children";
    pub const HARDWARE_SERIAL: &str = "hardwareSerial";
}

/// Commands sent through the `cmd` key
pub mod commands {
    /// The device has a single toggle, no separate play and pause
    pub const PLAY_PAUSE: &str = "playpause";
    pub const SELECT: &str = "select";
}

pub const POWER_ON: &str = "on";
/// The device's own token for standby. Not a typo.
pub const POWER_OFF: &str = "lona";

const PLAYQUEUE_LABEL: &str = "Playqueue";
const PLAYLIST_LABEL: &str = "Playlist";

pub fn encode_power(on: bool) -> &'static str {
    if on {
        POWER_ON
    } else {
        POWER_OFF
    }
}

pub fn decode_power(value: Option<&str>) -> bool {
    value == Some(POWER_ON)
}

/// Map the numeric transport state to the exposed media state.
///
/// Codes 1 and 3 both collapse to `Pause`.
pub fn decode_media_state(value: Option<&str>) -> MediaState {
    match value {
        Some("2") => MediaState::Play,
        Some("1") | Some("3") => MediaState::Pause,
        _ => MediaState::Stop,
    }
}

pub fn encode_flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

pub fn decode_flag(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

/// Parse a volume, treating absent or garbage values as 0
pub fn decode_volume(value: Option<&str>) -> VolumeLevel {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, 100.0) as VolumeLevel)
        .unwrap_or(0)
}

/// Render a scalar JSON value the way the device API spells it
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(encode_flag(*b).to_string()),
        other => Some(other.to_string()),
    }
}

/// One entry of the `/inputs` `children` array
#[derive(Debug, Clone, Deserialize)]
pub struct RawInput {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub disabled: bool,
    #[serde(default = "default_selectable", deserialize_with = "flag")]
    pub selectable: bool,
    #[serde(default)]
    pub ussi: Option<String>,
}

fn default_selectable() -> bool {
    true
}

/// The API sends flags as "0"/"1" strings, sometimes as numbers or bools
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => decode_flag(Some(s.as_str())),
        _ => false,
    })
}

/// Build the exposed input list from the device's input tree.
///
/// Keeps enabled, selectable entries in device order and numbers them
/// by position.
pub fn build_input_list(raw: Vec<RawInput>) -> Vec<InputDescriptor> {
    raw.into_iter()
        .filter(|input| !input.disabled && input.selectable)
        .enumerate()
        .map(|(index, input)| {
            let canonical_name = if input.name == PLAYQUEUE_LABEL {
                PLAYLIST_LABEL.to_string()
            } else {
                input.name
            };
            let name = input
                .alias
                .filter(|alias| !alias.trim().is_empty())
                .unwrap_or_else(|| canonical_name.clone());
            let path = input
                .ussi
                .map(|ussi| format!("/{}", ussi.trim_start_matches('/')))
                .unwrap_or_default();

            InputDescriptor {
                source_type: InputSourceType::from_name(&canonical_name),
                name,
                canonical_name,
                path,
                identifier: index as u32,
            }
        })
        .collect()
}
