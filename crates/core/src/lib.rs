pub mod cache;
pub mod circuit_breaker;
pub mod executor;
pub mod layout;
pub mod mailer;
pub mod models;
pub mod notifier;
pub mod query_engine;
pub mod repository;

pub use cache::{Cache, CacheError};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use executor::{CachedExecutor, Priority};
pub use query_engine::{QueryEngineClient, QueryEngineError, QueryResult};
