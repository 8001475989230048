pub mod config;
pub mod format;
pub mod indexer;
pub mod pipeline;
pub mod replay;
pub mod tokens;

pub use config::Config;
pub use indexer::{classify, ChainhookPayload, TokenAmount};
pub use pipeline::{EventSink, IngestPipeline, IngestSummary};
pub use replay::{BlockSelector, ReplayClient, ReplayError};
