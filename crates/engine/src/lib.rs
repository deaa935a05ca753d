//! `listmerge-engine`: merge contact lists from many tabular files.
//!
//! Sources are read through `listmerge-io`, normalized to a canonical
//! `Record` by fuzzy header matching, deduplicated by email and optionally
//! filtered against a reference list before being written back out as CSV.
//! Progress and skip reasons go to an injected [`LogSink`].

pub mod aggregate;
pub mod error;
pub mod extract;
pub mod filter;
pub mod headers;
pub mod inspect;
pub mod log;
pub mod model;
pub mod pipeline;
pub mod sources;
pub mod writer;

pub use aggregate::{AggregateOptions, SourceReport, SourceStatus};
pub use error::MergeError;
pub use filter::ReferenceSet;
pub use inspect::{inspect_headers, TableHeaders};
pub use log::{ChannelSink, LogLevel, LogLine, LogSink, MemorySink, TracingSink};
pub use model::{AggregatedSet, CanonicalField, Overflow, Record};
pub use pipeline::{run_combine, run_filter, IncompatiblePolicy, RunOptions, RunReport, SourceSpec};
pub use writer::WriteMode;
