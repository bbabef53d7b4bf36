use std::fmt;
use weft::status::Status;

/// One resolved network address a transport can connect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Translates a logical target into candidate endpoints.
///
/// Resolution re-runs on explicit refresh and when the channel exhausts
/// its endpoints; implementations backed by discovery systems can also be
/// re-queried on their own TTL schedule.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, target: &str) -> Result<Vec<Endpoint>, Status>;
}

/// A resolver over a fixed endpoint list; the baseline, and what tests
/// use.
pub struct StaticResolver {
    endpoints: Vec<Endpoint>,
}

impl StaticResolver {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }
}

#[async_trait::async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, target: &str) -> Result<Vec<Endpoint>, Status> {
        if self.endpoints.is_empty() {
            return Err(Status::unavailable(format!(
                "no endpoints configured for target {target}"
            )));
        }
        Ok(self.endpoints.clone())
    }
}
