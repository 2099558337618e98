//! # sluice-test-support
//!
//! Testing infrastructure for the sluice pipelines.
//!
//! ## Components
//!
//! - **Handlers** - recording, sleeping, failing and pass-through event
//!   handlers with externally observable state
//! - **Pipeline** - one-call SPSC wiring of sequencer, ring and processor

pub mod handlers;
pub mod pipeline;

pub use handlers::{ FailingHandler, PassHandler, RecordingHandler, SleepingHandler };
pub use pipeline::{ spsc_pipeline, wait_for_sequence, SpscPipeline };
