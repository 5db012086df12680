//! Tag capability detection, paged writing and the write orchestrator.
//!
//! # Modules
//!
//! - [`detector`]: classify the tag behind a session (GET VERSION probe)
//! - [`writer`]: write a page-aligned buffer one page at a time
//! - [`orchestrator`]: reader lookup through paged write, folded into a
//!   [`WriteResult`](tagbridge_core::WriteResult)

pub mod detector;
pub mod error;
pub mod orchestrator;
pub mod writer;

pub use detector::{FallbackReason, ProbeOutcome, detect, probe};
pub use error::{Result, WriteError};
pub use orchestrator::{TagWriter, WriteStage, WriterConfig};
pub use writer::{PagedWriteReport, write_pages};
