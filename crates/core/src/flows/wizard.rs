//! Six-step quote wizard driven by one chat message per step.

use std::sync::Arc;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, NoopAuditSink};
use crate::domain::quote::{format_usd, format_weight, FreightQuote};
use crate::domain::session::{QuoteSession, UserId};
use crate::errors::DomainError;
use crate::flows::engine::{apply_input, WizardInputError};
use crate::flows::states::{WizardAction, WizardStep};
use crate::freight::{title_case, QuoteEngine};
use crate::sessions::SessionStore;

pub const INVALID_WEIGHT_REPLY: &str = "❌ Invalid number. Try again:";
const BROKEN_SESSION_REPLY: &str = "❌ Something went wrong with this quote. Send /quote to start again.";
const ANY_CITY: &str = "any city";
const AUDIT_ACTOR: &str = "quote-wizard";

#[derive(Clone, Debug, PartialEq)]
pub struct WizardReply {
    pub text: String,
    pub completed: bool,
    /// Present only when `completed` is true.
    pub quote: Option<FreightQuote>,
    pub correlation_id: String,
}

pub struct QuoteWizard {
    sessions: SessionStore,
    engine: QuoteEngine,
    audit: Arc<dyn AuditSink>,
}

impl QuoteWizard {
    pub fn new(engine: QuoteEngine) -> Self {
        Self {
            sessions: SessionStore::new(),
            engine,
            audit: Arc::new(NoopAuditSink),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn engine(&self) -> &QuoteEngine {
        &self.engine
    }

    /// Opens a session, discarding any wizard already in progress for the user.
    pub fn start(&self, user_id: UserId) -> String {
        let session = self.sessions.start(user_id);
        self.audit.emit(
            audit_context(&session)
                .event("wizard.started", AuditCategory::Wizard, AuditOutcome::Success),
        );
        tracing::info!(
            event_name = "wizard.started",
            correlation_id = %session.correlation_id,
            user_id = user_id.0,
            "quote wizard started"
        );
        prompt_text(&self.engine, &WizardAction::AskOriginCountry)
    }

    /// Feeds one message to the user's wizard. `None` means the user has no
    /// active session and the message belongs to someone else.
    pub fn advance_wizard(&self, user_id: UserId, text: &str) -> Option<WizardReply> {
        self.sessions.with_session(user_id, |slot| {
            let session = slot.as_mut()?;
            let correlation_id = session.correlation_id.clone();
            let context = audit_context(session);

            let outcome = match apply_input(session, text) {
                Ok(outcome) => outcome,
                Err(WizardInputError::InvalidWeight { input }) => {
                    self.audit.emit(
                        context
                            .event("wizard.input_rejected", AuditCategory::Wizard, AuditOutcome::Rejected)
                            .with_metadata("step", WizardStep::Weight.field_name())
                            .with_metadata("input", input),
                    );
                    return Some(WizardReply {
                        text: INVALID_WEIGHT_REPLY.to_owned(),
                        completed: false,
                        quote: None,
                        correlation_id,
                    });
                }
                Err(error @ WizardInputError::AlreadyComplete { .. }) => {
                    *slot = None;
                    return Some(self.broken_session(&context, DomainError::from(error)));
                }
            };

            if !outcome.is_terminal() {
                self.audit.emit(
                    context
                        .event("wizard.step_advanced", AuditCategory::Wizard, AuditOutcome::Success)
                        .with_metadata("from", outcome.from.field_name())
                        .with_metadata(
                            "to",
                            outcome.to.map(WizardStep::field_name).unwrap_or_default(),
                        ),
                );
                return Some(WizardReply {
                    text: prompt_text(&self.engine, &outcome.action),
                    completed: false,
                    quote: None,
                    correlation_id,
                });
            }

            let request = session.quote_request();
            *slot = None;
            let Some(request) = request else {
                return Some(self.broken_session(
                    &context,
                    DomainError::InvariantViolation(
                        "weight accepted with missing wizard fields".to_owned(),
                    ),
                ));
            };

            let quote = self.engine.compute_quote(&request);
            self.audit.emit(
                context
                    .event("wizard.completed", AuditCategory::Pricing, AuditOutcome::Success)
                    .with_metadata("route", quote.route_line())
                    .with_metadata("route_source", format!("{:?}", quote.route_source))
                    .with_metadata("total", quote.breakdown.total.to_string()),
            );
            tracing::info!(
                event_name = "wizard.completed",
                correlation_id = %correlation_id,
                user_id = user_id.0,
                total = %quote.breakdown.total,
                "quote wizard completed"
            );

            Some(WizardReply {
                text: quote_summary(&quote),
                completed: true,
                quote: Some(quote),
                correlation_id,
            })
        })
    }

    /// Returns `true` when a session was discarded.
    pub fn cancel(&self, user_id: UserId) -> bool {
        let Some(session) = self.sessions.get(user_id) else {
            return false;
        };
        let removed = self.sessions.remove(user_id);
        if removed {
            self.audit.emit(
                audit_context(&session)
                    .event("wizard.cancelled", AuditCategory::Wizard, AuditOutcome::Success)
                    .with_metadata("step", session.step.field_name()),
            );
        }
        removed
    }

    pub fn is_active(&self, user_id: UserId) -> bool {
        self.sessions.is_active(user_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    fn broken_session(&self, context: &AuditContext, error: DomainError) -> WizardReply {
        tracing::error!(
            event_name = "wizard.session_broken",
            correlation_id = %context.correlation_id,
            error = %error,
            "quote wizard session discarded"
        );
        self.audit.emit(
            context
                .event("wizard.session_broken", AuditCategory::Wizard, AuditOutcome::Failed)
                .with_metadata("error", error.to_string()),
        );
        WizardReply {
            text: BROKEN_SESSION_REPLY.to_owned(),
            completed: false,
            quote: None,
            correlation_id: context.correlation_id.clone(),
        }
    }
}

fn audit_context(session: &QuoteSession) -> AuditContext {
    AuditContext::new(Some(session.user_id), None, session.correlation_id.clone(), AUDIT_ACTOR)
}

fn step_header(step: WizardStep) -> String {
    format!("*Step {}/{}:*", step.number(), WizardStep::TOTAL)
}

fn city_listing(engine: &QuoteEngine, country: &str) -> String {
    let cities = engine.directory().cities(country);
    if cities.is_empty() {
        ANY_CITY.to_owned()
    } else {
        cities.join(", ")
    }
}

fn prompt_text(engine: &QuoteEngine, action: &WizardAction) -> String {
    match action {
        WizardAction::AskOriginCountry => format!(
            "{} Origin country?\n(e.g., Algeria, Spain, China)",
            step_header(WizardStep::OriginCountry)
        ),
        WizardAction::AskOriginCity { country } => format!(
            "{} Origin city/port?\n({})",
            step_header(WizardStep::OriginCity),
            city_listing(engine, country)
        ),
        WizardAction::AskDestCountry => {
            format!("{} Destination country?", step_header(WizardStep::DestCountry))
        }
        WizardAction::AskDestCity { country } => format!(
            "{} Destination city?\n({})",
            step_header(WizardStep::DestCity),
            city_listing(engine, country)
        ),
        WizardAction::AskCargo => format!(
            "{} Cargo type?\n({})",
            step_header(WizardStep::Cargo),
            engine.directory().cargo_keys().join(", ")
        ),
        WizardAction::AskWeight => {
            format!("{} Weight in tons?\n(e.g., 50)", step_header(WizardStep::Weight))
        }
        WizardAction::GenerateQuote => "⚙️ Generating quote...".to_owned(),
    }
}

/// Markdown summary sent to the chat once the wizard completes.
pub fn quote_summary(quote: &FreightQuote) -> String {
    let breakdown = &quote.breakdown;
    let costs = breakdown
        .components()
        .iter()
        .map(|(label, amount)| format!("{label}: {}", format_usd(*amount)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "📦 *QUOTE SUMMARY*\n\n\
         *Route:* {route}\n\
         Distance: {distance:.0} nm | Transit: ~{transit} days\n\n\
         *Cargo:* {cargo} | {weight} tons\n\
         Container: {container}\n\n\
         *Costs:*\n{costs}\n\n\
         *TOTAL: {total} USD*\n\n\
         ⚠️ Estimates only. Request formal quotes.",
        route = quote.route_line(),
        distance = quote.distance_nm,
        transit = quote.transit_label(),
        cargo = title_case(&quote.cargo_key),
        weight = format_weight(quote.weight_tons),
        container = quote.cargo_type.container,
        total = format_usd(breakdown.total),
    )
}
