//! Cross-cutting collaborator hooks.
//!
//! Both hooks are optional capabilities passed into the facade at
//! construction; there is no global tracer or metrics state.

use std::any::Any;

use crate::error::SqlBridgeError;

/// Opaque token linking a span's begin and end.
pub type SpanToken = Box<dyn Any + Send>;

/// Outcome reported when a span closes.
pub enum SpanOutcome<'a> {
    Success,
    Failure(&'a SqlBridgeError),
}

/// Tracing collaborator. `begin` runs in the caller's context before the
/// action is queued; `end` runs in the caller's context after the result came
/// back, regardless of which pool thread executed the body.
pub trait Tracer: Send + Sync {
    fn begin(&self, action: &'static str) -> SpanToken;

    fn end(&self, token: SpanToken, outcome: SpanOutcome<'_>);
}

/// Tracer that records nothing. Valid wherever a tracer is expected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn begin(&self, _action: &'static str) -> SpanToken {
        Box::new(())
    }

    fn end(&self, _token: SpanToken, _outcome: SpanOutcome<'_>) {}
}

/// Pool accounting hook, notified exactly once when a connection closes,
/// whether or not the driver-level close itself succeeded.
pub trait PoolMetrics: Send + Sync {
    fn connection_closed(&self);
}
