use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};

use crate::{error::Error, util::mkdir_if_not_exists};

const APP_NAME: &str = "airwave";
const CONFIG_FILENAME: &str = "config.json";
const STATIONS_FILENAME: &str = "stations.xml";

/// Where the persistent state lives.
#[derive(Clone, Debug)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
    pub stations_file: PathBuf,
}

impl ConfigPaths {
    /// The per-user, per-platform location.
    pub fn default_location() -> Option<Self> {
        const USE_XDG_ON_MACOS: bool = false;

        AppDirs::new(Some(APP_NAME), USE_XDG_ON_MACOS).map(|dirs| Self::in_dir(&dirs.config_dir))
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_file: dir.join(CONFIG_FILENAME),
            stations_file: dir.join(STATIONS_FILENAME),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub repeat: bool,
    pub shuffle: bool,
    pub volume: f64,
    pub mute: bool,
    pub autoplay: bool,
    /// URI of the station played last.
    pub last_station: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repeat: false,
            shuffle: false,
            volume: 1.0,
            mute: false,
            autoplay: false,
            last_station: None,
        }
    }
}

impl Config {
    /// Load the config, a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match fs::File::open(path) {
            Ok(file) => {
                log::info!("loading config: {:?}", path);
                let mut config: Config = serde_json::from_reader(io::BufReader::new(file))?;
                config.volume = config.volume.clamp(0.0, 1.0);
                Ok(config)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Like `load`, but a broken file is logged and replaced by the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            log::error!("failed to load config from {:?}: {}", path, err);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent() {
            mkdir_if_not_exists(dir)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        log::debug!("saved config to {:?}", path);
        Ok(())
    }

    pub fn list_keys() -> &'static [ConfigKey] {
        ConfigKey::ALL
    }

    pub fn describe(key: &str) -> Result<&'static str, Error> {
        Ok(key.parse::<ConfigKey>()?.description())
    }

    pub fn get(&self, key: &str) -> Result<String, Error> {
        let value = match key.parse::<ConfigKey>()? {
            ConfigKey::Repeat => self.repeat.to_string(),
            ConfigKey::Shuffle => self.shuffle.to_string(),
            ConfigKey::Volume => self.volume.to_string(),
            ConfigKey::Mute => self.mute.to_string(),
            ConfigKey::Autoplay => self.autoplay.to_string(),
            ConfigKey::LastStation => self.last_station.clone().unwrap_or_default(),
        };
        Ok(value)
    }

    /// Set `key` from its textual form.  Returns the parsed key, so the caller
    /// can tell what changed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<ConfigKey, Error> {
        let key = key.parse::<ConfigKey>()?;
        let value = value.trim();
        match key {
            ConfigKey::Repeat => self.repeat = parse_bool(key, value)?,
            ConfigKey::Shuffle => self.shuffle = parse_bool(key, value)?,
            ConfigKey::Mute => self.mute = parse_bool(key, value)?,
            ConfigKey::Autoplay => self.autoplay = parse_bool(key, value)?,
            ConfigKey::Volume => {
                let volume = value
                    .parse::<f64>()
                    .ok()
                    .filter(|volume| (0.0..=1.0).contains(volume))
                    .ok_or_else(|| invalid_value(key, value, "a number between 0 and 1"))?;
                self.volume = volume;
            }
            ConfigKey::LastStation => {
                self.last_station = (!value.is_empty()).then(|| value.to_owned());
            }
        }
        Ok(key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKey {
    Repeat,
    Shuffle,
    Volume,
    Mute,
    Autoplay,
    LastStation,
}

impl ConfigKey {
    pub const ALL: &'static [ConfigKey] = &[
        ConfigKey::Repeat,
        ConfigKey::Shuffle,
        ConfigKey::Volume,
        ConfigKey::Mute,
        ConfigKey::Autoplay,
        ConfigKey::LastStation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::Repeat => "repeat",
            ConfigKey::Shuffle => "shuffle",
            ConfigKey::Volume => "volume",
            ConfigKey::Mute => "mute",
            ConfigKey::Autoplay => "autoplay",
            ConfigKey::LastStation => "last-station",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConfigKey::Repeat => "Wrap around at the ends of the station list",
            ConfigKey::Shuffle => "Walk the station list in random order",
            ConfigKey::Volume => "Output volume, between 0 and 1",
            ConfigKey::Mute => "Silence the output without changing the volume",
            ConfigKey::Autoplay => "Start playing the last station on startup",
            ConfigKey::LastStation => "URI of the station played last",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ConfigKey::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s || key.name().replace('-', "_") == s)
            .ok_or_else(|| Error::ConfigError(format!("unknown key: {s}")))
    }
}

fn parse_bool(key: ConfigKey, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(invalid_value(key, value, "a boolean")),
    }
}

fn invalid_value(key: ConfigKey, value: &str, expected: &str) -> Error {
    Error::ConfigError(format!("invalid value {value:?} for {key}, expected {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_by_key() {
        let mut config = Config::default();
        assert_eq!(config.set("repeat", "on").unwrap(), ConfigKey::Repeat);
        assert_eq!(config.get("repeat").unwrap(), "true");
        config.set("volume", "0.25").unwrap();
        assert_eq!(config.volume, 0.25);
        config.set("last_station", "http://radio/stream").unwrap();
        assert_eq!(config.get("last-station").unwrap(), "http://radio/stream");
        config.set("last-station", "").unwrap();
        assert_eq!(config.last_station, None);
    }

    #[test]
    fn bad_keys_and_values_are_rejected() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("colour", "red"),
            Err(Error::ConfigError(_))
        ));
        assert!(config.set("shuffle", "maybe").is_err());
        assert!(config.set("volume", "1.5").is_err());
        assert!(config.set("volume", "loud").is_err());
        assert!(config.get("colour").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn every_key_is_described() {
        for key in Config::list_keys() {
            assert!(!Config::describe(key.name()).unwrap().is_empty());
        }
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"shuffle": true}"#).unwrap();
        assert!(config.shuffle);
        assert_eq!(config.volume, 1.0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::in_dir(dir.path());
        assert_eq!(Config::load(&paths.config_file).unwrap(), Config::default());

        let mut config = Config::default();
        config.set("mute", "yes").unwrap();
        config.set("last-station", "http://radio/stream").unwrap();
        config.save(&paths.config_file).unwrap();

        let text = fs::read_to_string(&paths.config_file).unwrap();
        assert!(text.contains("\"last-station\""));
        assert_eq!(Config::load(&paths.config_file).unwrap(), config);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(&path).is_err());
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
