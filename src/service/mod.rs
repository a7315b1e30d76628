//! Leaf services consumed by the endpoint pipelines: the token registry
//! (component A), token minting (component B), and the device-flow rate
//! limiter (part of component J).

pub mod minting;
pub mod rate_limit;
pub mod registry;

pub use minting::TokenMinter;
pub use rate_limit::RateLimiter;
pub use registry::TokenRegistry;
