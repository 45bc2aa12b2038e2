use serde::{Deserialize, Serialize};

/// Directory key for a port: country lower-cased and trimmed, city lower-cased
/// with every whitespace character removed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortKey {
    pub country: String,
    pub city: String,
}

impl PortKey {
    pub fn new(country: &str, city: &str) -> Self {
        Self { country: normalize_country(country), city: normalize_city(city) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl PortRecord {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

pub fn normalize_country(country: &str) -> String {
    country.trim().to_lowercase()
}

pub fn normalize_city(city: &str) -> String {
    city.chars().filter(|ch| !ch.is_whitespace()).collect::<String>().to_lowercase()
}
