//! 基于 Consul 阻塞查询的服务发现模块
//!
//! 持续监听指定服务的实例变化，经过排序截断后以完整地址快照的形式推送给消费方，
//! 并提供与 tonic 负载均衡 Channel 对接的适配层。

pub mod backend;
pub mod balance;
pub mod instance;
pub mod rank;
pub mod resolver;
pub mod target;
pub mod watch;

pub use backend::QueryGateway;
pub use backend::consul::ConsulGateway;
pub use balance::{BalancedChannel, BalancerHandle, EndpointDiff, populate_endpoints};
pub use instance::{QueryMeta, QueryOptions, QueryResult, ServiceInstance};
pub use rank::{SortStrategy, rank};
pub use resolver::Resolver;
pub use target::{DEFAULT_NEAR, SCHEME, Target, parse_duration};
pub use watch::{AddressSnapshot, DELIVERY_BUFFER, WatchGuard, WatchHandle, project_addresses};
