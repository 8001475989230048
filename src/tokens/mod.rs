pub mod registry;

pub use registry::{AssetMatcher, AssetPredicate, TokenRegistry};
