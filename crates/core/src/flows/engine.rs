use thiserror::Error;

use crate::domain::port::normalize_city;
use crate::domain::session::QuoteSession;
use crate::flows::states::{TransitionOutcome, WizardAction, WizardStep};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardInputError {
    #[error("`{input}` is not a valid weight in tons")]
    InvalidWeight { input: String },
    #[error("wizard session for user {user_id} is already complete")]
    AlreadyComplete { user_id: i64 },
}

/// Trims and lower-cases a raw chat message before it is stored.
pub fn normalize_input(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Parses a positive, finite tonnage.
pub fn parse_weight(input: &str) -> Result<f64, WizardInputError> {
    match input.parse::<f64>() {
        Ok(weight) if weight.is_finite() && weight > 0.0 => Ok(weight),
        _ => Err(WizardInputError::InvalidWeight { input: input.to_owned() }),
    }
}

/// Applies one inbound message to the session.
///
/// On error the session is left exactly as it was.
pub fn apply_input(
    session: &mut QuoteSession,
    raw_input: &str,
) -> Result<TransitionOutcome, WizardInputError> {
    let input = normalize_input(raw_input);
    let from = session.step;

    let action = match from {
        WizardStep::OriginCountry => {
            session.origin_country = Some(input.clone());
            WizardAction::AskOriginCity { country: input }
        }
        WizardStep::OriginCity => {
            session.origin_city = Some(normalize_city(&input));
            WizardAction::AskDestCountry
        }
        WizardStep::DestCountry => {
            session.dest_country = Some(input.clone());
            WizardAction::AskDestCity { country: input }
        }
        WizardStep::DestCity => {
            session.dest_city = Some(normalize_city(&input));
            WizardAction::AskCargo
        }
        WizardStep::Cargo => {
            session.cargo = Some(input);
            WizardAction::AskWeight
        }
        WizardStep::Weight => {
            if session.weight_tons.is_some() {
                return Err(WizardInputError::AlreadyComplete { user_id: session.user_id.0 });
            }
            session.weight_tons = Some(parse_weight(&input)?);
            WizardAction::GenerateQuote
        }
    };

    let to = from.next();
    if let Some(next) = to {
        session.step = next;
    }

    Ok(TransitionOutcome { from, to, action })
}

#[cfg(test)]
mod tests {
    use crate::domain::session::{QuoteSession, UserId};
    use crate::flows::engine::{apply_input, parse_weight, WizardInputError};
    use crate::flows::states::{WizardAction, WizardStep};

    fn drive(session: &mut QuoteSession, inputs: &[&str]) {
        for input in inputs {
            apply_input(session, input).expect("input should be accepted");
        }
    }

    #[test]
    fn inputs_are_trimmed_lowercased_and_cities_lose_whitespace() {
        let mut session = QuoteSession::new(UserId(7));
        drive(&mut session, &["  Algeria ", "ALGIERS", "France", " Le Havre ", "Food"]);

        assert_eq!(session.origin_country.as_deref(), Some("algeria"));
        assert_eq!(session.origin_city.as_deref(), Some("algiers"));
        assert_eq!(session.dest_country.as_deref(), Some("france"));
        assert_eq!(session.dest_city.as_deref(), Some("lehavre"));
        assert_eq!(session.cargo.as_deref(), Some("food"));
        assert_eq!(session.step, WizardStep::Weight);
    }

    #[test]
    fn country_steps_request_city_listing_for_stored_country() {
        let mut session = QuoteSession::new(UserId(1));
        let outcome = apply_input(&mut session, "Spain").expect("country accepted");

        assert_eq!(outcome.from, WizardStep::OriginCountry);
        assert_eq!(outcome.to, Some(WizardStep::OriginCity));
        assert_eq!(outcome.action, WizardAction::AskOriginCity { country: "spain".to_owned() });
    }

    #[test]
    fn cargo_is_stored_without_validation() {
        let mut session = QuoteSession::new(UserId(1));
        drive(&mut session, &["a", "b", "c", "d", "Bananas"]);

        assert_eq!(session.cargo.as_deref(), Some("bananas"));
    }

    #[test]
    fn invalid_weight_leaves_session_untouched() {
        let mut session = QuoteSession::new(UserId(3));
        drive(&mut session, &["algeria", "algiers", "spain", "valencia", "general"]);
        let before = session.clone();

        for bad in ["fifty", "", "-5", "0", "NaN", "inf"] {
            let error = apply_input(&mut session, bad).expect_err("weight should be rejected");
            assert!(matches!(error, WizardInputError::InvalidWeight { .. }));
            assert_eq!(session, before);
        }
    }

    #[test]
    fn weight_completes_the_wizard() {
        let mut session = QuoteSession::new(UserId(3));
        drive(&mut session, &["algeria", "algiers", "spain", "valencia", "general"]);

        let outcome = apply_input(&mut session, " 50 ").expect("weight accepted");

        assert!(outcome.is_terminal());
        assert_eq!(outcome.action, WizardAction::GenerateQuote);
        assert_eq!(session.weight_tons, Some(50.0));
        assert!(session.missing_fields().is_empty());
        assert!(session.quote_request().is_some());
    }

    #[test]
    fn completed_session_rejects_further_input() {
        let mut session = QuoteSession::new(UserId(9));
        drive(&mut session, &["a", "b", "c", "d", "e", "12.5"]);

        let error = apply_input(&mut session, "13").expect_err("session already complete");
        assert_eq!(error, WizardInputError::AlreadyComplete { user_id: 9 });
        assert_eq!(session.weight_tons, Some(12.5));
    }

    #[test]
    fn weight_parser_accepts_decimal_forms() {
        assert_eq!(parse_weight("50").expect("integer"), 50.0);
        assert_eq!(parse_weight("12.75").expect("decimal"), 12.75);
        assert_eq!(parse_weight("1e3").expect("exponent"), 1000.0);
    }
}
