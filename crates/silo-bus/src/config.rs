//! Silo configuration.
//!
//! Loaded from TOML with `SILO_*` environment overrides. Every field has a
//! default, so an empty file (or no file) gives a working single-process silo.

use crate::error::ConfigError;
use crate::message::DEPARTURE_ADDRESS;
use crate::serializer::{Format, Serializer, TextEncoding};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Addresses of the two pipe endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Producers publish here.
    pub inbound: String,
    /// Actors subscribe here.
    pub outbound: String,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            inbound: "inproc://silo/inbound".to_string(),
            outbound: "inproc://silo/outbound".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiloConfig {
    pub name: String,
    pub pipe: PipeConfig,
    /// Run the monitor endpoint and route actor status lines through it.
    pub monitor: bool,
    pub format: Format,
    pub text_encoding: TextEncoding,
    pub departure_address: String,
}

impl Default for SiloConfig {
    fn default() -> Self {
        Self {
            name: "silo".to_string(),
            pipe: PipeConfig::default(),
            monitor: false,
            format: Format::default(),
            text_encoding: TextEncoding::default(),
            departure_address: DEPARTURE_ADDRESS.to_string(),
        }
    }
}

impl SiloConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?.apply_env_overrides()?;
        info!(path = %path.display(), name = %config.name, "Loaded silo config");
        Ok(config)
    }

    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(std::env::vars())
    }

    /// Applies `SILO_NAME`, `SILO_MONITOR`, `SILO_FORMAT` and
    /// `SILO_DEPARTURE_ADDRESS` from `vars`.
    pub fn apply_overrides<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "SILO_NAME" => self.name = value,
                "SILO_MONITOR" => {
                    self.monitor = parse_flag(&value).ok_or_else(|| ConfigError::Invalid {
                        key: key.clone(),
                        value: value.clone(),
                    })?
                }
                "SILO_FORMAT" => {
                    self.format = match value.to_ascii_lowercase().as_str() {
                        "json" => Format::Json,
                        "bincode" => Format::Bincode,
                        _ => {
                            return Err(ConfigError::Invalid {
                                key: key.clone(),
                                value: value.clone(),
                            })
                        }
                    }
                }
                "SILO_DEPARTURE_ADDRESS" => self.departure_address = value,
                _ => continue,
            }
            debug!(key = %key, "Applied config override");
        }
        self.validate()?;
        Ok(self)
    }

    pub fn serializer(&self) -> Serializer {
        Serializer::new(self.format, self.text_encoding)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipe.inbound.is_empty() || self.pipe.inbound == self.pipe.outbound {
            return Err(ConfigError::Invalid {
                key: "pipe.inbound".to_string(),
                value: self.pipe.inbound.clone(),
            });
        }
        if self.departure_address.is_empty() {
            return Err(ConfigError::Invalid {
                key: "departure_address".to_string(),
                value: String::new(),
            });
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(SiloConfig::from_toml_str("").unwrap(), SiloConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = SiloConfig::from_toml_str(
            r#"
            name = "orders"
            monitor = true
            format = "bincode"
            text_encoding = "utf16-le"

            [pipe]
            inbound = "inproc://orders/in"
            outbound = "inproc://orders/out"
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "orders");
        assert!(config.monitor);
        assert_eq!(config.format, Format::Bincode);
        assert_eq!(config.text_encoding, TextEncoding::Utf16Le);
        assert_eq!(config.pipe.outbound, "inproc://orders/out");
        assert_eq!(config.departure_address, DEPARTURE_ADDRESS);
    }

    #[test]
    fn test_same_endpoint_twice_is_rejected() {
        let err = SiloConfig::from_toml_str(
            r#"
            [pipe]
            inbound = "inproc://x"
            outbound = "inproc://x"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars = vec![
            ("SILO_NAME".to_string(), "edge".to_string()),
            ("SILO_MONITOR".to_string(), "on".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config = SiloConfig::default().apply_overrides(vars).unwrap();
        assert_eq!(config.name, "edge");
        assert!(config.monitor);

        let err = SiloConfig::default()
            .apply_overrides(vec![("SILO_MONITOR".to_string(), "maybe".to_string())])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = SiloConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
