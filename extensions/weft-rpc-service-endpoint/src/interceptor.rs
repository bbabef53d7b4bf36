use futures::future::BoxFuture;
use std::sync::Arc;
use weft::metadata::Metadata;
use weft::status::Status;

/// The accepted call as server interceptors see it: the routed method path
/// and the client's initial metadata, mutable before the handler runs.
#[derive(Debug, Clone)]
pub struct ServerCallContext {
    pub path: String,
    pub metadata: Metadata,
}

pub type ServerNextFuture = BoxFuture<'static, Result<(), Status>>;

/// The innermost stage: runs the registered handler to completion.
pub type ServerTerminalFn = dyn Fn(ServerCallContext) -> ServerNextFuture + Send + Sync;

/// The capability to continue dispatch. Consumed by `run`, so each
/// interceptor continues at most once; returning without calling it
/// short-circuits the call with the interceptor's status.
pub struct ServerNext<'a> {
    chain: &'a [Arc<dyn ServerInterceptor>],
    terminal: &'a ServerTerminalFn,
}

impl<'a> ServerNext<'a> {
    pub fn new(chain: &'a [Arc<dyn ServerInterceptor>], terminal: &'a ServerTerminalFn) -> Self {
        Self { chain, terminal }
    }

    pub async fn run(self, ctx: ServerCallContext) -> Result<(), Status> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = ServerNext {
                    chain: rest,
                    terminal: self.terminal,
                };
                head.intercept(ctx, next).await
            }
            None => (self.terminal)(ctx).await,
        }
    }
}

/// Composable middleware around inbound dispatch, the mirror of the client
/// chain: the first registered interceptor is entered first when a call
/// arrives, the last registered runs closest to the handler.
#[async_trait::async_trait]
pub trait ServerInterceptor: Send + Sync {
    async fn intercept(&self, ctx: ServerCallContext, next: ServerNext<'_>) -> Result<(), Status>;
}
