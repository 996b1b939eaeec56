pub mod classification;
pub mod retry;
pub mod types;

pub use classification::ErrorClassification;
pub use types::EngineError;

pub type Result<T> = std::result::Result<T, EngineError>;
