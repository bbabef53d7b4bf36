use crate::handler::ServerHandlerFn;
use crate::interceptor::ServerInterceptor;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use weft_rpc_service::MethodDescriptor;

/// One registered method: its wire descriptor plus the erased handler.
pub struct RegisteredMethod<C> {
    pub(crate) descriptor: MethodDescriptor,
    pub(crate) handler: ServerHandlerFn<C>,
}

impl<C> Clone for RegisteredMethod<C> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor,
            handler: self.handler.clone(),
        }
    }
}

/// A concrete RPC service endpoint, generic over a connection context `C`.
///
/// The context is whatever the transport wants every handler to see for a
/// connection (typically a handle for sending out-of-band messages to that
/// client).
pub struct RpcServiceEndpoint<C>
where
    C: Send + Sync + Clone + 'static,
{
    pub(crate) handlers: Arc<Mutex<HashMap<String, RegisteredMethod<C>>>>,
    pub(crate) interceptors: Arc<Mutex<Vec<Arc<dyn ServerInterceptor>>>>,
    _context: PhantomData<C>,
}

impl<C> Default for RpcServiceEndpoint<C>
where
    C: Send + Sync + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RpcServiceEndpoint<C>
where
    C: Send + Sync + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            interceptors: Arc::new(Mutex::new(Vec::new())),
            _context: PhantomData,
        }
    }
}
