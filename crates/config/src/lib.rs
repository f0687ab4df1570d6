mod config;
pub mod error;
mod metadata;

pub use crate::config::{COLL_PLACEHOLDER, Config, ENV_PREFIX, RecorderConfig, UpstreamConfig};
pub use crate::metadata::{Metadata, MetadataCache};
