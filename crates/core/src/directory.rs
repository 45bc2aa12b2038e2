//! Read-only port, cargo-type and carrier lookup tables.
//!
//! The directory is parsed once at startup, either from the embedded default
//! (`data/directory.toml`) or from a file named by `directory.path`, and is never
//! mutated afterwards. Keys are normalized at load time so lookups only need to
//! normalize the caller's input.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::cargo::{CargoType, GENERAL_CARGO};
use crate::domain::carrier::{CarrierId, CarrierRecord};
use crate::domain::port::{normalize_city, normalize_country, Coordinates, PortKey, PortRecord};

const EMBEDDED_DIRECTORY: &str = include_str!("../data/directory.toml");

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("could not read directory file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse directory data: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("port `{country}/{city}` is invalid: {reason}")]
    InvalidPort { country: String, city: String, reason: String },
    #[error("cargo type `{key}` is invalid: {reason}")]
    InvalidCargo { key: String, reason: String },
    #[error("carrier `{id}` is invalid: {reason}")]
    InvalidCarrier { id: String, reason: String },
    #[error("directory must define a `general` cargo type")]
    MissingGeneralCargo,
}

#[derive(Clone, Debug)]
pub struct Directory {
    ports: BTreeMap<String, BTreeMap<String, PortRecord>>,
    cargo: BTreeMap<String, CargoType>,
    general: CargoType,
    carriers: BTreeMap<CarrierId, CarrierRecord>,
}

impl Directory {
    pub fn embedded() -> Result<Self, DirectoryError> {
        Self::from_toml_str(EMBEDDED_DIRECTORY)
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| DirectoryError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    /// Loads from `path` when given, otherwise falls back to the embedded table.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, DirectoryError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::embedded(),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, DirectoryError> {
        let file = toml::from_str::<DirectoryFile>(raw)?;

        let mut ports: BTreeMap<String, BTreeMap<String, PortRecord>> = BTreeMap::new();
        for (country, cities) in file.ports {
            for (city, entry) in cities {
                let key = PortKey::new(&country, &city);
                validate_port(&key, &entry)?;
                ports.entry(key.country).or_default().insert(
                    key.city,
                    PortRecord { name: entry.name, lat: entry.lat, lon: entry.lon },
                );
            }
        }

        let mut cargo = BTreeMap::new();
        for (key, entry) in file.cargo {
            let key = key.trim().to_lowercase();
            if !(entry.factor.is_finite() && entry.factor > 0.0) {
                return Err(DirectoryError::InvalidCargo {
                    key,
                    reason: format!("factor must be positive, got {}", entry.factor),
                });
            }
            if entry.container.trim().is_empty() {
                return Err(DirectoryError::InvalidCargo {
                    key,
                    reason: "container must not be empty".to_string(),
                });
            }
            cargo.insert(
                key.clone(),
                CargoType { key, factor: entry.factor, container: entry.container },
            );
        }
        let general = cargo.get(GENERAL_CARGO).cloned().ok_or(DirectoryError::MissingGeneralCargo)?;

        let mut carriers = BTreeMap::new();
        for (id, entry) in file.carriers {
            if !(0.0..=5.0).contains(&entry.rating) {
                return Err(DirectoryError::InvalidCarrier {
                    id,
                    reason: format!("rating must be within 0..=5, got {}", entry.rating),
                });
            }
            let id = CarrierId(id);
            carriers.insert(
                id.clone(),
                CarrierRecord { id, name: entry.name, website: entry.website, rating: entry.rating },
            );
        }

        Ok(Self { ports, cargo, general, carriers })
    }

    pub fn find_port(&self, country: &str, city: &str) -> Option<&PortRecord> {
        self.ports.get(&normalize_country(country))?.get(&normalize_city(city))
    }

    /// City keys known for a country, in key order. Empty when the country is unknown.
    pub fn cities(&self, country: &str) -> Vec<&str> {
        self.ports
            .get(&normalize_country(country))
            .map(|cities| cities.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn countries(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, PortRecord>)> {
        self.ports.iter().map(|(country, cities)| (country.as_str(), cities))
    }

    pub fn port_count(&self) -> usize {
        self.ports.values().map(BTreeMap::len).sum()
    }

    pub fn cargo_type(&self, key: &str) -> Option<&CargoType> {
        self.cargo.get(&key.trim().to_lowercase())
    }

    /// Unknown keys resolve to the general cargo type.
    pub fn cargo_or_general(&self, key: &str) -> &CargoType {
        self.cargo_type(key).unwrap_or(&self.general)
    }

    pub fn general_cargo(&self) -> &CargoType {
        &self.general
    }

    pub fn cargo_keys(&self) -> Vec<&str> {
        self.cargo.keys().map(String::as_str).collect()
    }

    pub fn carriers(&self) -> impl Iterator<Item = &CarrierRecord> {
        self.carriers.values()
    }

    pub fn carrier_count(&self) -> usize {
        self.carriers.len()
    }
}

fn validate_port(key: &PortKey, entry: &PortEntry) -> Result<(), DirectoryError> {
    let invalid = |reason: String| DirectoryError::InvalidPort {
        country: key.country.clone(),
        city: key.city.clone(),
        reason,
    };

    if entry.name.trim().is_empty() {
        return Err(invalid("name must not be empty".to_string()));
    }
    if !Coordinates::new(entry.lat, entry.lon).is_valid() {
        return Err(invalid(format!("coordinates ({}, {}) out of range", entry.lat, entry.lon)));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    ports: BTreeMap<String, BTreeMap<String, PortEntry>>,
    #[serde(default)]
    cargo: BTreeMap<String, CargoEntry>,
    #[serde(default)]
    carriers: BTreeMap<String, CarrierEntry>,
}

#[derive(Debug, Deserialize)]
struct PortEntry {
    name: String,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct CargoEntry {
    factor: f64,
    container: String,
}

#[derive(Debug, Deserialize)]
struct CarrierEntry {
    name: String,
    website: String,
    rating: f64,
}
