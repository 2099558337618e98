//! Insights - Observability for sluice.
//!
//! Tracing hooks on the non-hot edges of the pipeline. Zero-cost when the
//! `tracing` feature is disabled.
//!
//! # Usage
//!
//! ```toml
//! sluice = { version = "0.1", features = ["tracing"] }
//! ```
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```

/// Record a drained batch (creates a span visible to subscribers)
#[cfg(feature = "tracing")]
#[inline]
pub fn record_batch(len: i64) {
    let _span = tracing::trace_span!("batch", len).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_batch(_len: i64) {}

/// Record a barrier alert observed by a processor
#[cfg(feature = "tracing")]
#[inline]
pub fn record_alert() {
    let _span = tracing::debug_span!("alert").entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_alert() {}

/// Record a wait-strategy timeout surfaced to a processor
#[cfg(feature = "tracing")]
#[inline]
pub fn record_timeout(sequence: i64) {
    let _span = tracing::debug_span!("timeout", sequence).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_timeout(_sequence: i64) {}

/// Record an event-handler error routed to the exception handler
#[cfg(feature = "tracing")]
#[inline]
pub fn record_handler_error(sequence: i64, error: &crate::error::HandlerError) {
    tracing::error!(sequence, %error, "event handler failed");
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_handler_error(_sequence: i64, _error: &crate::error::HandlerError) {}

/// Record a producer stall waiting for slow consumers
#[cfg(feature = "tracing")]
#[inline]
pub fn record_capacity_stall(wrap_point: i64) {
    let _span = tracing::warn_span!("capacity_stall", wrap_point).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_capacity_stall(_wrap_point: i64) {}

/// Record a result-cell cancellation
#[cfg(feature = "tracing")]
#[inline]
pub fn record_cancel(interrupting: bool) {
    let _span = tracing::debug_span!("cancel", interrupting).entered();
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_cancel(_interrupting: bool) {}
