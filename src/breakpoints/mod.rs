//! Breakpoint cache, polling and call-site registration.
//!
//! Breakpoint state is owned by the control plane. The agent keeps a
//! read-only copy, replaced wholesale on every successful poll; between
//! polls it may be stale by at most one poll interval.

mod cache;
mod definition;
mod poller;
mod registration;

pub use cache::BreakpointCache;
pub use definition::{BreakpointDefinition, LabelKey, LocationKey};
pub use poller::BreakpointPoller;
pub use registration::{AutoRegistrar, Registration, RegistrationSet};
