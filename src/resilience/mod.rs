pub mod fallback;
pub mod retry;

pub use fallback::{FallbackChain, FallbackStats};
pub use retry::{classify_error_kind, retry, ErrorKind};
