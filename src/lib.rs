pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod metrics;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod projection;
pub mod record;
pub mod scheduler;
pub mod source;
pub mod status;
