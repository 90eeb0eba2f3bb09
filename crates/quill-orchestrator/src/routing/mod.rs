//! Model routing with per-endpoint health tracking and failover.
//!
//! A [`ModelRouter`] owns an ordered list of [`ModelEndpoint`]s, each paired
//! with a backend and a [`ModelHealthTracker`]. Backend results are
//! classified into a [`CallOutcome`] which decides the tracker update:
//! rate limits start a cooldown, transient failures count towards the retry
//! limit and fatal failures disable the endpoint until
//! [`ModelRouter::reset_all`].

pub mod endpoint;
pub mod health;
pub mod outcome;
pub mod policy;
pub mod router;

pub use endpoint::{GenerationHint, ModelEndpoint};
pub use health::{Eligibility, HealthSnapshot, ModelHealthTracker};
pub use outcome::{CallOutcome, is_rate_limit_message};
pub use policy::{MAX_DURATION, RouterPolicy, instant_after};
pub use router::{ModelRouter, RoutedResponse};
