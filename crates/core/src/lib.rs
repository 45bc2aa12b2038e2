pub mod audit;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod freight;
pub mod sessions;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use directory::{Directory, DirectoryError};
pub use domain::cargo::{CargoType, ContainerSize};
pub use domain::carrier::{CarrierId, CarrierRecord};
pub use domain::port::{PortKey, PortRecord};
pub use domain::quote::{CostBreakdown, FreightQuote, QuoteRequest, RouteEndpoint, RouteSource};
pub use domain::session::{QuoteSession, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{QuoteWizard, WizardReply, WizardStep};
pub use freight::{QuoteEngine, FALLBACK_DISTANCE_NM, FALLBACK_TRANSIT_DAYS};
pub use sessions::SessionStore;
