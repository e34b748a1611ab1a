//! Production-friendly observability hooks for the credential-failover path.
//!
//! ```rust
//! use qobserve::TracingFailoverHooks;
//! use qprovider::FailoverHooks;
//!
//! fn accepts_hooks(_hooks: &dyn FailoverHooks) {}
//!
//! accepts_hooks(&TracingFailoverHooks);
//! ```

mod metrics_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsFailoverHooks;
pub use tracing_hooks::TracingFailoverHooks;

pub mod prelude {
    pub use crate::{MetricsFailoverHooks, TracingFailoverHooks};
}
