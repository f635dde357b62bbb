pub mod clock;
pub mod logger;
pub mod rate_limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limiter::RateLimiter;
