use serde::{Deserialize, Serialize};

/// Fields of the quote wizard, in the order they are asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    OriginCountry,
    OriginCity,
    DestCountry,
    DestCity,
    Cargo,
    Weight,
}

impl WizardStep {
    pub const TOTAL: u8 = 6;

    pub const ALL: [WizardStep; 6] = [
        WizardStep::OriginCountry,
        WizardStep::OriginCity,
        WizardStep::DestCountry,
        WizardStep::DestCity,
        WizardStep::Cargo,
        WizardStep::Weight,
    ];

    /// One-based position shown to the user as `Step N/6`.
    pub fn number(self) -> u8 {
        match self {
            Self::OriginCountry => 1,
            Self::OriginCity => 2,
            Self::DestCountry => 3,
            Self::DestCity => 4,
            Self::Cargo => 5,
            Self::Weight => 6,
        }
    }

    /// `None` after the weight: the wizard is complete.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::OriginCountry => Some(Self::OriginCity),
            Self::OriginCity => Some(Self::DestCountry),
            Self::DestCountry => Some(Self::DestCity),
            Self::DestCity => Some(Self::Cargo),
            Self::Cargo => Some(Self::Weight),
            Self::Weight => None,
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Self::OriginCountry => "origin_country",
            Self::OriginCity => "origin_city",
            Self::DestCountry => "dest_country",
            Self::DestCity => "dest_city",
            Self::Cargo => "cargo",
            Self::Weight => "weight",
        }
    }
}

/// What the caller must render after a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardAction {
    AskOriginCountry,
    /// List the directory's cities for the stored country.
    AskOriginCity { country: String },
    AskDestCountry,
    AskDestCity { country: String },
    AskCargo,
    AskWeight,
    GenerateQuote,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WizardStep,
    /// `None` once the final field has been accepted.
    pub to: Option<WizardStep>,
    pub action: WizardAction,
}

impl TransitionOutcome {
    pub fn is_terminal(&self) -> bool {
        self.to.is_none()
    }
}
