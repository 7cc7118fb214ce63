//! Static schema of the settings record.
//!
//! The field set is fixed at compile time. Each field carries its kind and
//! bounds as data in [`SCHEMA`], so validation, parsing and persistence are
//! written once for all fields.

use core::fmt::Write;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Longest text value in characters, excluding the terminator.
pub const MAX_TEXT_LEN: usize = 64;

/// Storage capacity of a text field in bytes, including the terminator.
pub const SETTINGS_STRING_SIZE: usize = MAX_TEXT_LEN + 1;

/// Bounded text value stored in the record.
pub type SettingText = heapless::String<MAX_TEXT_LEN>;

/// Number of fields in the record.
pub const FIELD_COUNT: usize = 19;

/// Identifies one field of the settings record.
///
/// The discriminant is the field's position in the record and in the
/// persisted override layer. Reordering variants changes the stored layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    VellezAddress,
    VellezGongEnabled,
    Volume,
    OtaPort,
    MqttPort,
    VellezZones,
    Timezone,
    ApSsid,
    NtpHost,
    OtaHost,
    OtaUri,
    MqttHost,
    MqttClientId,
    MqttUsername,
    MqttPassword,
    MqttGenericTopic,
    MqttTelemetryTopic,
    WebUsername,
    WebPassword,
}

impl SettingId {
    pub const ALL: [SettingId; FIELD_COUNT] = [
        SettingId::VellezAddress,
        SettingId::VellezGongEnabled,
        SettingId::Volume,
        SettingId::OtaPort,
        SettingId::MqttPort,
        SettingId::VellezZones,
        SettingId::Timezone,
        SettingId::ApSsid,
        SettingId::NtpHost,
        SettingId::OtaHost,
        SettingId::OtaUri,
        SettingId::MqttHost,
        SettingId::MqttClientId,
        SettingId::MqttUsername,
        SettingId::MqttPassword,
        SettingId::MqttGenericTopic,
        SettingId::MqttTelemetryTopic,
        SettingId::WebUsername,
        SettingId::WebPassword,
    ];

    /// Position of the field in the record.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Schema entry for this field.
    #[inline]
    pub fn spec(self) -> &'static FieldSpec {
        &SCHEMA[self.index()]
    }

    /// Stable key used by the web form, the console and log output.
    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn kind(self) -> FieldKind {
        self.spec().kind
    }

    /// Look a field up by its key.
    pub fn from_key(key: &str) -> Option<Self> {
        SCHEMA.iter().find(|spec| spec.key == key).map(|spec| spec.id)
    }
}

/// Kind and bounds of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Flag,
    U8 { min: u8, max: u8 },
    U16 { min: u16, max: u16 },
    /// `capacity` counts the terminator, so at most `capacity - 1` bytes fit.
    Text { capacity: usize },
}

/// One row of the schema table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub id: SettingId,
    pub key: &'static str,
    pub kind: FieldKind,
}

const fn text(id: SettingId, key: &'static str) -> FieldSpec {
    FieldSpec {
        id,
        key,
        kind: FieldKind::Text {
            capacity: SETTINGS_STRING_SIZE,
        },
    }
}

/// The settings schema, indexed by [`SettingId::index`].
pub static SCHEMA: [FieldSpec; FIELD_COUNT] = [
    FieldSpec {
        id: SettingId::VellezAddress,
        key: "vellez_address",
        kind: FieldKind::U8 { min: 0, max: 255 },
    },
    FieldSpec {
        id: SettingId::VellezGongEnabled,
        key: "vellez_gong_enabled",
        kind: FieldKind::Flag,
    },
    FieldSpec {
        id: SettingId::Volume,
        key: "volume",
        kind: FieldKind::U8 { min: 0, max: 30 },
    },
    FieldSpec {
        id: SettingId::OtaPort,
        key: "ota_port",
        kind: FieldKind::U16 { min: 1, max: 65535 },
    },
    FieldSpec {
        id: SettingId::MqttPort,
        key: "mqtt_port",
        kind: FieldKind::U16 { min: 1, max: 65535 },
    },
    FieldSpec {
        id: SettingId::VellezZones,
        key: "vellez_zones",
        kind: FieldKind::U16 {
            min: 0,
            max: 0xFFFF,
        },
    },
    text(SettingId::Timezone, "timezone"),
    text(SettingId::ApSsid, "ap_ssid"),
    text(SettingId::NtpHost, "ntp_host"),
    text(SettingId::OtaHost, "ota_host"),
    text(SettingId::OtaUri, "ota_uri"),
    text(SettingId::MqttHost, "mqtt_host"),
    text(SettingId::MqttClientId, "mqtt_client_id"),
    text(SettingId::MqttUsername, "mqtt_username"),
    text(SettingId::MqttPassword, "mqtt_password"),
    text(SettingId::MqttGenericTopic, "mqtt_generic_topic"),
    text(SettingId::MqttTelemetryTopic, "mqtt_telemetry_topic"),
    text(SettingId::WebUsername, "web_username"),
    text(SettingId::WebPassword, "web_password"),
];

/// A validated, owned field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValue {
    Flag(bool),
    U8(u8),
    U16(u16),
    Text(SettingText),
}

impl SettingValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SettingValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            SettingValue::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            SettingValue::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Parse user supplied text (web form field, console argument) for `id`.
    ///
    /// Flags accept `1/0`, `true/false` and `on/off`. Numbers accept decimal
    /// or `0x`-prefixed hexadecimal. The result is validated against the
    /// schema.
    pub fn parse(id: SettingId, raw: &str) -> Result<SettingValue, SettingsError> {
        let key = id.key();
        let raw_trimmed = raw.trim();
        let input = match id.kind() {
            FieldKind::Flag => match raw_trimmed {
                "1" | "true" | "on" | "yes" => SettingInput::Flag(true),
                "0" | "false" | "off" | "no" => SettingInput::Flag(false),
                _ => return Err(SettingsError::Parse { key }),
            },
            FieldKind::U8 { .. } => {
                let value = parse_number(raw_trimmed).ok_or(SettingsError::Parse { key })?;
                let value = u8::try_from(value).map_err(|_| SettingsError::OutOfRange {
                    key,
                    value,
                    min: u8::MIN as u32,
                    max: u8::MAX as u32,
                })?;
                SettingInput::U8(value)
            }
            FieldKind::U16 { .. } => {
                let value = parse_number(raw_trimmed).ok_or(SettingsError::Parse { key })?;
                let value = u16::try_from(value).map_err(|_| SettingsError::OutOfRange {
                    key,
                    value,
                    min: u16::MIN as u32,
                    max: u16::MAX as u32,
                })?;
                SettingInput::U16(value)
            }
            // Text is taken verbatim, surrounding whitespace included.
            FieldKind::Text { .. } => SettingInput::Text(raw),
        };
        id.spec().validate(input)
    }
}

impl core::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SettingValue::Flag(v) => write!(f, "{}", if *v { "on" } else { "off" }),
            SettingValue::U8(v) => write!(f, "{v}"),
            SettingValue::U16(v) => write!(f, "{v}"),
            SettingValue::Text(v) => write!(f, "{:?}", v.as_str()),
        }
    }
}

fn parse_number(raw: &str) -> Option<u32> {
    if let Some(hex) = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        u32::from_str(raw).ok()
    }
}

/// Borrowed, not yet validated value handed to a setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingInput<'a> {
    Flag(bool),
    U8(u8),
    U16(u16),
    Text(&'a str),
}

impl From<bool> for SettingInput<'_> {
    fn from(value: bool) -> Self {
        SettingInput::Flag(value)
    }
}

impl From<u8> for SettingInput<'_> {
    fn from(value: u8) -> Self {
        SettingInput::U8(value)
    }
}

impl From<u16> for SettingInput<'_> {
    fn from(value: u16) -> Self {
        SettingInput::U16(value)
    }
}

impl<'a> From<&'a str> for SettingInput<'a> {
    fn from(value: &'a str) -> Self {
        SettingInput::Text(value)
    }
}

impl<'a> From<&'a SettingValue> for SettingInput<'a> {
    fn from(value: &'a SettingValue) -> Self {
        match value {
            SettingValue::Flag(v) => SettingInput::Flag(*v),
            SettingValue::U8(v) => SettingInput::U8(*v),
            SettingValue::U16(v) => SettingInput::U16(*v),
            SettingValue::Text(v) => SettingInput::Text(v.as_str()),
        }
    }
}

impl FieldSpec {
    /// Check `input` against this field's kind and bounds.
    pub fn validate(&self, input: SettingInput<'_>) -> Result<SettingValue, SettingsError> {
        let key = self.key;
        match (self.kind, input) {
            (FieldKind::Flag, SettingInput::Flag(v)) => Ok(SettingValue::Flag(v)),
            (FieldKind::U8 { min, max }, SettingInput::U8(v)) => {
                if (min..=max).contains(&v) {
                    Ok(SettingValue::U8(v))
                } else {
                    Err(SettingsError::OutOfRange {
                        key,
                        value: v as u32,
                        min: min as u32,
                        max: max as u32,
                    })
                }
            }
            (FieldKind::U16 { min, max }, SettingInput::U16(v)) => {
                if (min..=max).contains(&v) {
                    Ok(SettingValue::U16(v))
                } else {
                    Err(SettingsError::OutOfRange {
                        key,
                        value: v as u32,
                        min: min as u32,
                        max: max as u32,
                    })
                }
            }
            (FieldKind::Text { capacity }, SettingInput::Text(v)) => {
                if v.len() + 1 > capacity {
                    return Err(SettingsError::TooLong {
                        key,
                        len: v.len(),
                        capacity,
                    });
                }
                if v.as_bytes().contains(&0) {
                    return Err(SettingsError::EmbeddedNul { key });
                }
                let mut text = SettingText::new();
                text.push_str(v).map_err(|_| SettingsError::TooLong {
                    key,
                    len: v.len(),
                    capacity,
                })?;
                Ok(SettingValue::Text(text))
            }
            _ => Err(SettingsError::TypeMismatch { key }),
        }
    }
}

/// Render a default containing a `%06X` placeholder with the device chip id.
pub(crate) fn render_with_chip_id(template: &str, chip_id: u32) -> SettingText {
    let mut out = SettingText::new();
    let mut parts = template.splitn(2, "%06X");
    let head = parts.next().unwrap_or_default();
    // Defaults are short compile-time constants; an overflow would only drop the tail.
    let _ = out.push_str(head);
    if let Some(tail) = parts.next() {
        let _ = write!(out, "{:06X}", chip_id & 0x00FF_FFFF);
        let _ = out.push_str(tail);
    }
    out
}
