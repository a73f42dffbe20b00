//! The ownersed library for annotating interaction logs with IP ownership.
//!
//! Each line goes through three stages: [`FieldExtractor`] pulls out IP
//! addresses, the bracketed target and the interaction token;
//! [`OwnershipResolver`] finds who owns each address, through an
//! [`OwnershipCache`] that is persisted between runs; [`LineAnnotator`]
//! re-renders the line with emphasis and the owners inline.
//!
//! # Examples
//!
//! Annotating lines with a custom lookup service:
//!
//! ```rust
//! use ownersed::{
//!     FieldExtractor, LineAnnotator, OwnerLookup, OwnershipCache, OwnershipResolver, Pipeline,
//! };
//! use termcolor::ColorChoice;
//!
//! struct Static;
//!
//! impl OwnerLookup for Static {
//!     fn lookup(&self, _ip: &str) -> ownersed::Result<String> {
//!         Ok("SK / Digmia s.r.o.".to_string())
//!     }
//! }
//!
//! let mut cache = OwnershipCache::new();
//! let mut pipeline = Pipeline::new(
//!     FieldExtractor::new()?,
//!     LineAnnotator::new(ColorChoice::Never),
//!     OwnershipResolver::new(&mut cache, Static),
//! );
//!
//! let line = pipeline.process_line("2024-01-01 10:00:00 IDs: 91.210.181.37");
//! assert_eq!(
//!     line.as_deref(),
//!     Some("2024-01-01 10:00:00 IDs: 91.210.181.37 (SK / Digmia s.r.o.)")
//! );
//! # Ok::<(), ownersed::Error>(())
//! ```

pub mod annotate;
pub mod cache;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod resolver;

pub use crate::annotate::{Emphasis, LineAnnotator};
pub use crate::cache::OwnershipCache;
pub use crate::error::{Error, Result};
pub use crate::pipeline::{Pipeline, RunStats, INTERACTION_MARKER};
pub use crate::resolver::{
    Ip2Location, OwnerLookup, OwnershipResolver, OwnershipResult, UNKNOWN_OWNER,
};
pub use field_extract::{ExtractedFields, FieldExtractor};
