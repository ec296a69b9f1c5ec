//! Data model for the read path
//!
//! Labels and matchers select series; requests bound them in time; the
//! series types are what replicas send back in either response shape.

mod labels;
mod matcher;
mod request;
mod series;

pub use labels::{Label, Labels, METRIC_NAME};
pub use matcher::{metric_name_matcher, CompiledMatcher, MatchType, Matcher};
pub use request::{QueryRequest, TimeRange};
pub use series::{
    Chunk, ChunkSeries, Matrix, QueryResponse, QueryStreamResponse, Sample, SampleStream,
    TimeSeries,
};
