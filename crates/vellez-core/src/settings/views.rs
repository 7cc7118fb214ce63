//! Typed views over groups of related settings.

use super::schema::SettingId;
use super::storage::BlockStorage;
use super::store::SettingsStore;

/// Alert parameters used when a request does not carry its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDefaults {
    pub gong: bool,
    pub volume: u8,
    pub zones: u16,
}

/// Relay unit bus address and zone configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub address: u8,
    pub gong: bool,
    pub zones: u16,
}

/// Where the firmware update check goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEndpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub uri: &'a str,
}

/// Message-bus client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    /// Empty when the broker does not require authentication.
    pub username: &'a str,
    pub password: &'a str,
    pub generic_topic: &'a str,
    pub telemetry_topic: &'a str,
}

/// Provisioning and clock configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig<'a> {
    pub ap_ssid: &'a str,
    pub ntp_host: &'a str,
    pub timezone: &'a str,
}

/// Local web UI credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl<S: BlockStorage> SettingsStore<S> {
    pub fn alert_defaults(&self) -> AlertDefaults {
        AlertDefaults {
            gong: self.get_flag(SettingId::VellezGongEnabled),
            volume: self.get_u8(SettingId::Volume),
            zones: self.get_u16(SettingId::VellezZones),
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            address: self.get_u8(SettingId::VellezAddress),
            gong: self.get_flag(SettingId::VellezGongEnabled),
            zones: self.get_u16(SettingId::VellezZones),
        }
    }

    pub fn update_endpoint(&self) -> UpdateEndpoint<'_> {
        UpdateEndpoint {
            host: self.get_text(SettingId::OtaHost),
            port: self.get_u16(SettingId::OtaPort),
            uri: self.get_text(SettingId::OtaUri),
        }
    }

    pub fn remote_config(&self) -> RemoteConfig<'_> {
        RemoteConfig {
            host: self.get_text(SettingId::MqttHost),
            port: self.get_u16(SettingId::MqttPort),
            client_id: self.get_text(SettingId::MqttClientId),
            username: self.get_text(SettingId::MqttUsername),
            password: self.get_text(SettingId::MqttPassword),
            generic_topic: self.get_text(SettingId::MqttGenericTopic),
            telemetry_topic: self.get_text(SettingId::MqttTelemetryTopic),
        }
    }

    pub fn network_config(&self) -> NetworkConfig<'_> {
        NetworkConfig {
            ap_ssid: self.get_text(SettingId::ApSsid),
            ntp_host: self.get_text(SettingId::NtpHost),
            timezone: self.get_text(SettingId::Timezone),
        }
    }

    pub fn web_credentials(&self) -> WebCredentials<'_> {
        WebCredentials {
            username: self.get_text(SettingId::WebUsername),
            password: self.get_text(SettingId::WebPassword),
        }
    }
}
