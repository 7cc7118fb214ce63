//! Compiled-in defaults of the settings record.

use super::schema::{FIELD_COUNT, SettingId, SettingValue, render_with_chip_id};

pub const DEFAULT_VELLEZ_ADDRESS: u8 = 0;
pub const DEFAULT_GONG_ENABLED: bool = false;
pub const DEFAULT_VOLUME: u8 = 15;
pub const DEFAULT_OTA_PORT: u16 = 443;
pub const DEFAULT_MQTT_PORT: u16 = 8883;
pub const DEFAULT_VELLEZ_ZONES: u16 = 0xFFFF;
pub const DEFAULT_TIMEZONE: &str = "EET-2EEST,M3.5.0/3,M10.5.0/4";
pub const DEFAULT_AP_SSID: &str = "Vellez Alert %06X";
pub const DEFAULT_NTP_HOST: &str = "pool.ntp.org";
pub const DEFAULT_OTA_HOST: &str = "iot.hex128.io";
pub const DEFAULT_OTA_URI: &str = "/.ota/firmware/vellez.bin";
pub const DEFAULT_MQTT_HOST: &str = "iot.hex128.io";
pub const DEFAULT_MQTT_CLIENT_ID: &str = "vellez_%06X";
pub const DEFAULT_MQTT_USERNAME: &str = "";
pub const DEFAULT_MQTT_PASSWORD: &str = "";
pub const DEFAULT_MQTT_GENERIC_TOPIC: &str = "vellez_test";
pub const DEFAULT_MQTT_TELEMETRY_TOPIC: &str = "vellez_%06X";
pub const DEFAULT_WEB_USERNAME: &str = "admin";
pub const DEFAULT_WEB_PASSWORD: &str = "vellez_admin";

/// The default layer of the record.
///
/// Built once per boot. Text defaults containing `%06X` are rendered with the
/// device chip id so the default SSID and topics are unique per unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    values: [SettingValue; FIELD_COUNT],
}

impl Defaults {
    pub fn new(chip_id: u32) -> Self {
        let values = core::array::from_fn(|index| default_for(SettingId::ALL[index], chip_id));
        Self { values }
    }

    #[inline]
    pub fn get(&self, id: SettingId) -> &SettingValue {
        &self.values[id.index()]
    }
}

fn default_for(id: SettingId, chip_id: u32) -> SettingValue {
    let text = |template: &str| SettingValue::Text(render_with_chip_id(template, chip_id));
    match id {
        SettingId::VellezAddress => SettingValue::U8(DEFAULT_VELLEZ_ADDRESS),
        SettingId::VellezGongEnabled => SettingValue::Flag(DEFAULT_GONG_ENABLED),
        SettingId::Volume => SettingValue::U8(DEFAULT_VOLUME),
        SettingId::OtaPort => SettingValue::U16(DEFAULT_OTA_PORT),
        SettingId::MqttPort => SettingValue::U16(DEFAULT_MQTT_PORT),
        SettingId::VellezZones => SettingValue::U16(DEFAULT_VELLEZ_ZONES),
        SettingId::Timezone => text(DEFAULT_TIMEZONE),
        SettingId::ApSsid => text(DEFAULT_AP_SSID),
        SettingId::NtpHost => text(DEFAULT_NTP_HOST),
        SettingId::OtaHost => text(DEFAULT_OTA_HOST),
        SettingId::OtaUri => text(DEFAULT_OTA_URI),
        SettingId::MqttHost => text(DEFAULT_MQTT_HOST),
        SettingId::MqttClientId => text(DEFAULT_MQTT_CLIENT_ID),
        SettingId::MqttUsername => text(DEFAULT_MQTT_USERNAME),
        SettingId::MqttPassword => text(DEFAULT_MQTT_PASSWORD),
        SettingId::MqttGenericTopic => text(DEFAULT_MQTT_GENERIC_TOPIC),
        SettingId::MqttTelemetryTopic => text(DEFAULT_MQTT_TELEMETRY_TOPIC),
        SettingId::WebUsername => text(DEFAULT_WEB_USERNAME),
        SettingId::WebPassword => text(DEFAULT_WEB_PASSWORD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_passes_its_own_schema() {
        let defaults = Defaults::new(0x00C0FFEE);
        for id in SettingId::ALL {
            let value = defaults.get(id);
            assert_eq!(
                id.spec().validate(value.into()).as_ref(),
                Ok(value),
                "default for {} violates the schema",
                id.key()
            );
        }
    }

    #[test]
    fn chip_id_defaults_are_unique_per_device() {
        let defaults = Defaults::new(0x1A2B3C);
        assert_eq!(
            defaults.get(SettingId::ApSsid).as_text(),
            Some("Vellez Alert 1A2B3C")
        );
        assert_eq!(
            defaults.get(SettingId::MqttTelemetryTopic).as_text(),
            Some("vellez_1A2B3C")
        );
        assert_eq!(defaults.get(SettingId::MqttUsername).as_text(), Some(""));
    }
}
