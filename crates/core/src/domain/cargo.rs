use serde::{Deserialize, Serialize};

pub const GENERAL_CARGO: &str = "general";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CargoType {
    pub key: String,
    pub factor: f64,
    pub container: String,
}

impl CargoType {
    pub fn recommended_container(&self) -> ContainerSize {
        ContainerSize::from_label(&self.container)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerSize {
    #[default]
    TwentyFoot,
    FortyFoot,
}

impl ContainerSize {
    /// Any label mentioning `40ft` (including `40ft reefer`) prices as a forty-foot box.
    pub fn from_label(label: &str) -> Self {
        if label.to_ascii_lowercase().contains("40ft") {
            Self::FortyFoot
        } else {
            Self::TwentyFoot
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TwentyFoot => "20ft",
            Self::FortyFoot => "40ft",
        }
    }

    pub fn freight_multiplier(&self) -> f64 {
        match self {
            Self::TwentyFoot => 1.0,
            Self::FortyFoot => 1.8,
        }
    }

    pub fn terminal_handling(&self) -> u32 {
        match self {
            Self::TwentyFoot => 300,
            Self::FortyFoot => 600,
        }
    }
}

impl std::str::FromStr for ContainerSize {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(value))
    }
}
