//! Flare Consul Resolver
//!
//! Watches a service in Consul with blocking queries and delivers the freshest
//! ranked address set to a consumer, e.g. a load-balanced tonic channel.

pub mod config;
pub mod discovery;
pub mod error;
pub mod retry;

// Re-exports
pub use config::{ResolverConfig, WatchConfig};
pub use error::{ResolverError, Result};

pub use discovery::{
    AddressSnapshot, BalancedChannel, BalancerHandle, ConsulGateway, EndpointDiff, QueryGateway,
    QueryMeta, QueryOptions, QueryResult, Resolver, ServiceInstance, SortStrategy, Target,
    WatchGuard, WatchHandle,
};
pub use retry::ExponentialBackoff;

pub use tokio_util::sync::CancellationToken;
