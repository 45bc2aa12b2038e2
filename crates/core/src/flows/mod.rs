pub mod engine;
pub mod states;
pub mod wizard;

pub use engine::{apply_input, normalize_input, parse_weight, WizardInputError};
pub use states::{TransitionOutcome, WizardAction, WizardStep};
pub use wizard::{quote_summary, QuoteWizard, WizardReply, INVALID_WEIGHT_REPLY};
