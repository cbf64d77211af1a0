//! Device domain types
//!
//! Wire names follow the home server's JSON: enum values are upper snake
//! case and the device type field is called `type`.

use serde::{Deserialize, Serialize};

/// How a device is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// On/off, written as a digital value
    Switch,
    /// Dimmable, written as an analog value
    Analog,
    /// Analog output used as on/off (100 or 0)
    AnalogWithoutDimming,
}

impl DeviceType {
    pub fn code(&self) -> u8 {
        match self {
            DeviceType::Switch => 0,
            DeviceType::Analog => 1,
            DeviceType::AnalogWithoutDimming => 2,
        }
    }
}

/// Room a device belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Page {
    #[default]
    MasterBedroom,
    Lounge,
}

impl Page {
    pub const ALL: [Page; 2] = [Page::MasterBedroom, Page::Lounge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Page::MasterBedroom => "master_bedroom",
            Page::Lounge => "lounge",
        }
    }
}

impl std::str::FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "master_bedroom" => Ok(Page::MasterBedroom),
            "lounge" => Ok(Page::Lounge),
            other => Err(format!("unknown page: {other}")),
        }
    }
}

/// What a device physically is; used for the icon only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceKind {
    Light,
    Curtain,
    Socket,
    Climate,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub name: String,
    pub page: Page,
    #[serde(default)]
    pub kind: DeviceKind,
    #[serde(default)]
    pub value: f64,
}

/// One row of the device list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub device: Device,
    pub is_enabled: bool,
}

impl Item {
    pub fn new(device: Device) -> Self {
        let is_enabled = device.value > 0.0;
        Self { device, is_enabled }
    }

    /// The row after the user flipped it on or off
    pub fn toggled(&self) -> Self {
        let is_enabled = !self.is_enabled;
        let mut device = self.device.clone();
        device.value = match device.device_type {
            DeviceType::Switch => f64::from(u8::from(is_enabled)),
            DeviceType::Analog | DeviceType::AnalogWithoutDimming => {
                if is_enabled {
                    100.0
                } else {
                    0.0
                }
            }
        };
        Self { device, is_enabled }
    }

    /// The row after the user moved its slider to `value`
    pub fn with_value(&self, value: f64) -> Self {
        let mut device = self.device.clone();
        device.value = value;
        Self::new(device)
    }
}

/// Payload of a socket event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub data: Option<String>,
}

/// A value change pushed by the home server: `{"data":{"id":1,"data":"42"}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    #[serde(default)]
    pub data: EventData,
}

impl EventResponse {
    pub fn new(id: i64, data: impl Into<String>) -> Self {
        Self {
            data: EventData {
                id,
                data: Some(data.into()),
            },
        }
    }

    /// The event's value; anything that is not a number reads as 0
    pub fn value(&self) -> f64 {
        self.data
            .data
            .as_deref()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// State of the socket connection to the home server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(device_type: DeviceType, value: f64) -> Device {
        Device {
            id: 1,
            device_type,
            name: "Lamp".to_string(),
            page: Page::Lounge,
            kind: DeviceKind::Light,
            value,
        }
    }

    #[test]
    fn test_device_json_names() {
        let json = r#"{"id":3,"type":"ANALOG_WITHOUT_DIMMING","name":"Fan","page":"MASTER_BEDROOM","kind":"CLIMATE","value":100.0}"#;
        let device: Device = serde_json::from_str(json).unwrap();

        assert_eq!(device.device_type, DeviceType::AnalogWithoutDimming);
        assert_eq!(device.device_type.code(), 2);
        assert_eq!(device.page, Page::MasterBedroom);
        assert_eq!(device.kind, DeviceKind::Climate);
    }

    #[test]
    fn test_device_optional_fields() {
        let json = r#"{"id":3,"type":"SWITCH","name":"Fan","page":"LOUNGE"}"#;
        let device: Device = serde_json::from_str(json).unwrap();

        assert_eq!(device.kind, DeviceKind::Other);
        assert_eq!(device.value, 0.0);
    }

    #[test]
    fn test_item_enabled_from_value() {
        assert!(Item::new(device(DeviceType::Analog, 0.5)).is_enabled);
        assert!(!Item::new(device(DeviceType::Analog, 0.0)).is_enabled);
    }

    #[test]
    fn test_item_toggled() {
        let switch = Item::new(device(DeviceType::Switch, 0.0)).toggled();
        assert!(switch.is_enabled);
        assert_eq!(switch.device.value, 1.0);

        let fan = Item::new(device(DeviceType::AnalogWithoutDimming, 100.0)).toggled();
        assert!(!fan.is_enabled);
        assert_eq!(fan.device.value, 0.0);
    }

    #[test]
    fn test_event_value_parsing() {
        assert_eq!(EventResponse::new(1, "42.5").value(), 42.5);
        assert_eq!(EventResponse::new(1, "on").value(), 0.0);
        assert_eq!(EventResponse::default().value(), 0.0);

        let event: EventResponse = serde_json::from_str(r#"{"data":{"id":7,"data":"1"}}"#).unwrap();
        assert_eq!(event.data.id, 7);
        assert_eq!(event.value(), 1.0);
    }

    #[test]
    fn test_page_from_str() {
        assert_eq!("lounge".parse::<Page>(), Ok(Page::Lounge));
        assert_eq!("master-bedroom".parse::<Page>(), Ok(Page::MasterBedroom));
        assert!("attic".parse::<Page>().is_err());
    }
}
