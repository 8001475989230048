pub mod amount;
pub mod classifier;
pub mod decoder;
pub mod payload;
pub mod types;

pub use amount::TokenAmount;
pub use classifier::classify;
pub use payload::ChainhookPayload;
