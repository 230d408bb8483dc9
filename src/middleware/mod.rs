pub mod rate_limit;
pub mod validation;

pub use rate_limit::{RateClass, RateLimit, RateLimiter};
pub use validation::RequestValidation;
