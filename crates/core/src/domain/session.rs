use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::quote::{QuoteRequest, RouteEndpoint};
use crate::flows::states::WizardStep;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fields collected so far by one user's quote wizard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteSession {
    pub user_id: UserId,
    /// Fresh per wizard run; threads through logs and audit events.
    pub correlation_id: String,
    pub step: WizardStep,
    pub origin_country: Option<String>,
    pub origin_city: Option<String>,
    pub dest_country: Option<String>,
    pub dest_city: Option<String>,
    pub cargo: Option<String>,
    pub weight_tons: Option<f64>,
    pub started_at: DateTime<Utc>,
}

impl QuoteSession {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            correlation_id: Uuid::new_v4().to_string(),
            step: WizardStep::OriginCountry,
            origin_country: None,
            origin_city: None,
            dest_country: None,
            dest_city: None,
            cargo: None,
            weight_tons: None,
            started_at: Utc::now(),
        }
    }

    /// Builds the pricing request once every field is present.
    pub fn quote_request(&self) -> Option<QuoteRequest> {
        Some(QuoteRequest::new(
            RouteEndpoint::new(self.origin_country.clone()?, self.origin_city.clone()?),
            RouteEndpoint::new(self.dest_country.clone()?, self.dest_city.clone()?),
            self.cargo.clone()?,
            self.weight_tons?,
        ))
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("origin_country", self.origin_country.is_none()),
            ("origin_city", self.origin_city.is_none()),
            ("dest_country", self.dest_country.is_none()),
            ("dest_city", self.dest_city.is_none()),
            ("cargo", self.cargo.is_none()),
            ("weight", self.weight_tons.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}
