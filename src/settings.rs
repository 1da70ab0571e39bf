use crate::error::{InvalidBaudRate, SettingsError};
use log::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const STANDARD_BAUD_RATES: [u32; 15] = [
    300, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 74880, 115200, 230400, 250000, 500000,
    1000000, 2000000,
];

pub const AUTOSCROLL_KEY: &str = "autoscroll";
pub const BAUDRATE_KEY: &str = "baudrate";

/// One of the standard serial line rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBaudRate", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        BaudRate(115200)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Baud", self.0)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = InvalidBaudRate;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if STANDARD_BAUD_RATES.contains(&value) {
            Ok(BaudRate(value))
        } else {
            Err(InvalidBaudRate(value.to_string()))
        }
    }
}

impl FromStr for BaudRate {
    type Err = InvalidBaudRate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| InvalidBaudRate(s.to_owned()))?;
        BaudRate::try_from(value)
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> u32 {
        rate.0
    }
}

/// Rates have been stored both as numbers and as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBaudRate {
    Number(u32),
    Text(String),
}

impl TryFrom<RawBaudRate> for BaudRate {
    type Error = InvalidBaudRate;

    fn try_from(raw: RawBaudRate) -> Result<Self, Self::Error> {
        match raw {
            RawBaudRate::Number(value) => BaudRate::try_from(value),
            RawBaudRate::Text(text) => text.parse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub autoscroll: bool,
    pub baud_rate: BaudRate,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autoscroll: true,
            baud_rate: BaudRate::default(),
        }
    }
}

/// JSON file of named settings, each value stored as its own JSON value.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/microbit_orientation/settings.json`
    pub fn default_location() -> Option<Self> {
        let dir = dirs::config_dir()?.join("microbit_orientation");
        Some(Self::new(dir.join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every known setting, using the default for missing or invalid keys.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let values = self.read_values()?;
        let defaults = Settings::default();
        let settings = Settings {
            autoscroll: setting_or_default(&values, AUTOSCROLL_KEY, defaults.autoscroll),
            baud_rate: setting_or_default(&values, BAUDRATE_KEY, defaults.baud_rate),
        };
        debug!("Loaded settings {:?} from {:?}", settings, self.path);
        Ok(settings)
    }

    pub fn save_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        let mut values = self.read_values()?;
        values.insert(key.to_owned(), serde_json::to_value(value)?);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&values)?)?;
        debug!("Saved setting {} to {:?}", key, self.path);
        Ok(())
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        self.save_setting(AUTOSCROLL_KEY, &settings.autoscroll)?;
        self.save_setting(BAUDRATE_KEY, &settings.baud_rate)
    }

    fn read_values(&self) -> Result<Map<String, Value>, SettingsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings found at {:?}, using defaults", self.path);
                Ok(Map::new())
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn setting_or_default<T: DeserializeOwned + fmt::Debug>(
    values: &Map<String, Value>,
    key: &str,
    default: T,
) -> T {
    match values.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(
                    "Ignoring setting {} = {}: {}, using {:?}",
                    key, value, error, default
                );
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_validation() {
        assert_eq!(BaudRate::try_from(9600).unwrap().value(), 9600);
        assert_eq!("74880".parse::<BaudRate>().unwrap().value(), 74880);
        assert!(BaudRate::try_from(9601).is_err());
        assert!("fast".parse::<BaudRate>().is_err());
        assert_eq!(BaudRate::default().to_string(), "115200 Baud");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));
        let settings = Settings {
            autoscroll: false,
            baud_rate: BaudRate::try_from(9600).unwrap(),
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[BAUDRATE_KEY], Value::from(9600));
        assert_eq!(raw[AUTOSCROLL_KEY], Value::from(false));
    }

    #[test]
    fn test_invalid_values_fall_back_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"autoscroll": "yes", "baudrate": 12345}"#).unwrap();
        assert_eq!(SettingsStore::new(&path).load().unwrap(), Settings::default());

        std::fs::write(&path, r#"{"autoscroll": false, "baudrate": null}"#).unwrap();
        let settings = SettingsStore::new(&path).load().unwrap();
        assert!(!settings.autoscroll);
        assert_eq!(settings.baud_rate, BaudRate::default());
    }

    #[test]
    fn test_string_baud_rate_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"baudrate": "57600"}"#).unwrap();
        let settings = SettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.baud_rate.value(), 57600);
    }

    #[test]
    fn test_save_setting_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"theme": "dark", "autoscroll": true}"#).unwrap();
        let store = SettingsStore::new(&path);
        store
            .save_setting(BAUDRATE_KEY, &BaudRate::try_from(300).unwrap())
            .unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], Value::from("dark"));
        assert_eq!(raw[BAUDRATE_KEY], Value::from(300));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SettingsStore::new(&path).load(),
            Err(SettingsError::Json(_))
        ));
    }
}
