//! Domain model: events, jobs, attempts, policies, decisions.

pub mod attempt;
pub mod category;
pub mod decision;
pub mod event;
pub mod ids;
pub mod job;
pub mod policy;

pub use attempt::{AttemptOutcome, DeliveryAttempt};
pub use category::{ErrorCategory, categorize};
pub use decision::{Decider, Decision};
pub use event::{Environment, EventType, InboundEvent, ParseEnumError, TenantId};
pub use ids::{AttemptId, DlqId, EventId, Id, IdMarker, JobId, ParseIdError};
pub use job::{DeliveryJob, Priority};
pub use policy::{BackoffStrategy, PolicyError, PolicyUpdate, RetryPolicy};
