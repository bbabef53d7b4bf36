use crate::call_options::CallOptions;
use crate::caller_interface::RpcServiceCallerInterface;
use crate::interceptor::{CallReply, ClientCallContext, ClientInterceptor, Next, OutboundPayload};
use crate::picker::{EndpointState, RoundRobinPicker};
use crate::resolver::{Endpoint, Resolver};
use crate::shapes::{RpcClientStreamCall, RpcDuplexCall, RpcResponseStream};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use weft::status::{Status, StatusCode};
use weft_rpc_service::{
    LbPolicy, MethodDescriptor, RpcMethodClientStreaming, RpcMethodDuplex,
    RpcMethodServerStreaming, RpcMethodUnary, ServiceConfig,
};

/// Establishes a connected caller for an endpoint. Implemented by the
/// concrete transport crates.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Caller: RpcServiceCallerInterface + Send + Sync + 'static;

    async fn connect(&self, endpoint: &Endpoint) -> std::io::Result<Arc<Self::Caller>>;
}

/// A client channel over a logical target.
///
/// Ties together the resolver (target → endpoints), the picker (endpoint
/// per call), a connection pool (one transport per endpoint), the service
/// config (per-method deadlines and retry policy), and the client
/// interceptor chain. The pick made for a call is fixed for that call's
/// lifetime; failures re-dispatch to another endpoint only within the
/// configured retry policy and only when the full request payload is
/// still buffered for replay.
pub struct RpcChannel<C: Connector> {
    target: String,
    resolver: Arc<dyn Resolver>,
    connector: C,
    picker: RoundRobinPicker,
    config: ServiceConfig,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
    conns: Mutex<HashMap<Endpoint, Arc<C::Caller>>>,
}

impl<C: Connector> RpcChannel<C> {
    pub fn new(target: impl Into<String>, resolver: Arc<dyn Resolver>, connector: C) -> Self {
        Self {
            target: target.into(),
            resolver,
            connector,
            picker: RoundRobinPicker::new(),
            config: ServiceConfig::default(),
            interceptors: Vec::new(),
            conns: Mutex::new(HashMap::new()),
        }
    }

    /// Applies a service config. Read-only from here on; a later
    /// re-resolution may carry a replacement but nothing mutates it in
    /// place.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends an interceptor. Registration order is invocation order;
    /// the last registered runs closest to the wire.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn ClientInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Re-runs resolution and swaps the picker's endpoint snapshot.
    pub async fn refresh(&self) -> Result<(), Status> {
        let endpoints = self.resolver.resolve(&self.target).await?;
        self.picker.update(endpoints);
        Ok(())
    }

    async fn ensure_resolved(&self) -> Result<(), Status> {
        if self.picker.is_empty() {
            self.refresh().await?;
        }
        Ok(())
    }

    fn pick_endpoint(&self) -> Option<Arc<EndpointState>> {
        match self.config.lb_policy {
            LbPolicy::RoundRobin => self.picker.pick(),
            LbPolicy::PickFirst => self.picker.pick_first(),
        }
    }

    /// Picks an endpoint and returns a connected caller for it, marking
    /// endpoints down as they fail and re-resolving once when the whole
    /// set is exhausted.
    async fn pick_connected(&self) -> Result<(Arc<EndpointState>, Arc<C::Caller>), Status> {
        self.ensure_resolved().await?;

        for round in 0..2 {
            let candidates = self.picker.len();
            for _ in 0..candidates {
                let Some(state) = self.pick_endpoint() else {
                    break;
                };

                {
                    let mut conns = self.conns.lock().await;
                    if let Some(conn) = conns.get(state.endpoint()) {
                        if conn.is_connected() {
                            return Ok((state, conn.clone()));
                        }
                        conns.remove(state.endpoint());
                    }
                }

                match self.connector.connect(state.endpoint()).await {
                    Ok(conn) => {
                        self.picker.mark_up(state.endpoint());
                        self.conns
                            .lock()
                            .await
                            .insert(state.endpoint().clone(), conn.clone());
                        return Ok((state, conn));
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %state.endpoint(), error = %e, "connect failed");
                        self.picker.mark_down(state.endpoint());
                    }
                }
            }

            if round == 0 {
                // Every known endpoint failed; ask the resolver again
                // before giving up.
                self.refresh().await?;
            }
        }

        Err(Status::unavailable(format!(
            "no reachable endpoint for target {}",
            self.target
        )))
    }

    fn effective_options(&self, path: &str, mut options: CallOptions) -> CallOptions {
        if options.deadline.is_none() {
            options.deadline = self.config.default_timeout(path);
        }
        options
    }

    /// Runs one dispatch through the interceptor chain on `caller`.
    async fn invoke(
        &self,
        caller: Arc<C::Caller>,
        ctx: ClientCallContext,
        payload: OutboundPayload,
    ) -> Result<CallReply, Status> {
        let terminal = move |ctx: ClientCallContext, payload: OutboundPayload| {
            let caller = caller.clone();
            let fut = async move {
                let call = caller
                    .start_call(
                        &ctx.path,
                        ctx.client_streaming,
                        ctx.server_streaming,
                        ctx.options,
                    )
                    .await?;

                match payload {
                    OutboundPayload::Unary(bytes) if !ctx.server_streaming => {
                        call.sink.send(bytes).await?;
                        call.sink.close()?;
                        let mut inbound = call.inbound;
                        let reply = inbound.recv_single().await?;
                        Ok(CallReply::Unary(reply))
                    }
                    OutboundPayload::Unary(bytes) => {
                        call.sink.send(bytes).await?;
                        call.sink.close()?;
                        Ok(CallReply::Streaming(call))
                    }
                    OutboundPayload::Streaming => Ok(CallReply::Streaming(call)),
                }
            };
            let boxed: futures::future::BoxFuture<'static, Result<CallReply, Status>> =
                Box::pin(fut);
            boxed
        };

        Next::new(&self.interceptors, &terminal)
            .run(ctx, payload)
            .await
    }

    fn context(&self, descriptor: &MethodDescriptor, options: CallOptions) -> ClientCallContext {
        ClientCallContext {
            path: descriptor.path.to_string(),
            client_streaming: descriptor.client_streaming,
            server_streaming: descriptor.server_streaming,
            options: self.effective_options(descriptor.path, options),
        }
    }

    fn attempts_allowed(&self, path: &str) -> u32 {
        self.config
            .retry_policy(path)
            .map(|r| r.max_attempts.max(1))
            .unwrap_or(1)
    }

    fn is_retryable(&self, path: &str, status: &Status) -> bool {
        self.config
            .retry_policy(path)
            .is_some_and(|r| r.retryable_codes.contains(&status.code()))
    }

    async fn note_failure(&self, endpoint: &Endpoint, status: &Status) {
        if status.code() == StatusCode::Unavailable {
            self.picker.mark_down(endpoint);
            self.conns.lock().await.remove(endpoint);
        }
    }

    pub async fn call_unary<M>(
        &self,
        input: M::Input,
        options: CallOptions,
    ) -> Result<M::Output, Status>
    where
        M: RpcMethodUnary + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let payload = M::encode_request(input)
            .map_err(|e| Status::internal(format!("request encode failed: {e}")))?;
        let path = M::DESCRIPTOR.path;
        let attempts = self.attempts_allowed(path);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (state, caller) = self.pick_connected().await?;
            let ctx = self.context(&M::DESCRIPTOR, options.clone());

            match self
                .invoke(caller, ctx, OutboundPayload::Unary(payload.clone()))
                .await
            {
                Ok(CallReply::Unary(bytes)) => {
                    return M::decode_response(&bytes)
                        .map_err(|e| Status::internal(format!("response decode failed: {e}")));
                }
                Ok(CallReply::Streaming(_)) => {
                    return Err(Status::internal(
                        "interceptor returned a streaming reply for a unary call",
                    ));
                }
                Err(status) => {
                    self.note_failure(state.endpoint(), &status).await;
                    if attempt >= attempts || !self.is_retryable(path, &status) {
                        return Err(status);
                    }
                    tracing::debug!(%path, attempt, code = ?status.code(), "retrying call");
                }
            }
        }
    }

    /// Server-streaming dispatch. Retries cover call startup only; once a
    /// response stream is handed out, failures on it are final.
    pub async fn call_server_streaming<M>(
        &self,
        input: M::Input,
        options: CallOptions,
    ) -> Result<RpcResponseStream<M>, Status>
    where
        M: RpcMethodServerStreaming + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let payload = M::encode_request(input)
            .map_err(|e| Status::internal(format!("request encode failed: {e}")))?;
        let path = M::DESCRIPTOR.path;
        let attempts = self.attempts_allowed(path);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (state, caller) = self.pick_connected().await?;
            let ctx = self.context(&M::DESCRIPTOR, options.clone());

            match self
                .invoke(caller, ctx, OutboundPayload::Unary(payload.clone()))
                .await
            {
                Ok(CallReply::Streaming(call)) => {
                    return Ok(RpcResponseStream::new(call.inbound));
                }
                Ok(CallReply::Unary(_)) => {
                    return Err(Status::internal(
                        "interceptor returned a unary reply for a streaming call",
                    ));
                }
                Err(status) => {
                    self.note_failure(state.endpoint(), &status).await;
                    if attempt >= attempts || !self.is_retryable(path, &status) {
                        return Err(status);
                    }
                    tracing::debug!(%path, attempt, code = ?status.code(), "retrying call");
                }
            }
        }
    }

    /// Client-streaming dispatch. Never retried: streamed request messages
    /// are not buffered for replay.
    pub async fn call_client_streaming<M>(
        &self,
        options: CallOptions,
    ) -> Result<RpcClientStreamCall<M>, Status>
    where
        M: RpcMethodClientStreaming + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let (_state, caller) = self.pick_connected().await?;
        let ctx = self.context(&M::DESCRIPTOR, options);

        match self.invoke(caller, ctx, OutboundPayload::Streaming).await? {
            CallReply::Streaming(call) => Ok(RpcClientStreamCall::new(call)),
            CallReply::Unary(_) => Err(Status::internal(
                "interceptor returned a unary reply for a streaming call",
            )),
        }
    }

    /// Duplex dispatch. Never retried, for the same reason as
    /// client-streaming.
    pub async fn call_duplex<M>(&self, options: CallOptions) -> Result<RpcDuplexCall<M>, Status>
    where
        M: RpcMethodDuplex + Send + Sync + 'static,
        M::Input: Send + 'static,
        M::Output: Send + 'static,
    {
        let (_state, caller) = self.pick_connected().await?;
        let ctx = self.context(&M::DESCRIPTOR, options);

        match self.invoke(caller, ctx, OutboundPayload::Streaming).await? {
            CallReply::Streaming(call) => Ok(RpcDuplexCall::new(call)),
            CallReply::Unary(_) => Err(Status::internal(
                "interceptor returned a unary reply for a streaming call",
            )),
        }
    }
}
