pub mod api_error;
pub mod extraction;
pub mod instance;
pub mod throughput;

pub use api_error::{retry_policy, ApiErrorKind, RetryDecision};
pub use extraction::{ApiErrorBody, ExtractionRequest, ExtractionResponse, ExtractionResult};
pub use instance::Instance;
pub use throughput::{format_rate, RateMeter};
