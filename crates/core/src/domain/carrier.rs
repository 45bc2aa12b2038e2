use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CarrierId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarrierRecord {
    pub id: CarrierId,
    pub name: String,
    pub website: String,
    pub rating: f64,
}
