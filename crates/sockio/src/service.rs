//! A tower [`Service`] for Socket.IO, a thin wrapper delegating the protocol
//! plumbing to the underlying [`EngineIoService`].

use std::sync::Arc;
use std::task::{Context, Poll};

use engio::service::{EngineIoService, NotFoundService};
use http::{Request, Response};
use http_body::Body;
use tower::Service;

use crate::{channel::ChannelLayer, client::Client};

pub struct SockIoService<S = NotFoundService, L: ChannelLayer = crate::channel::LocalLayer> {
    engine_svc: EngineIoService<Client<L>, S>,
}

impl<S: Clone, L: ChannelLayer> SockIoService<S, L> {
    pub(crate) fn with_client(inner: S, client: Arc<Client<L>>) -> Self {
        let config = client.config.engine_config.clone();
        Self {
            engine_svc: EngineIoService::with_config_inner(inner, client, config),
        }
    }

    /// Convert into a hyper MakeService.
    pub fn into_make_service(
        self,
    ) -> engio::service::MakeEngineIoService<Client<L>, S> {
        self.engine_svc.into_make_service()
    }
}

impl<ReqBody, ResBody, S, L> Service<Request<ReqBody>> for SockIoService<S, L>
where
    ReqBody: Body + Send + 'static + std::fmt::Debug,
    ReqBody::Error: std::fmt::Debug,
    ReqBody::Data: Send,
    ResBody: Body + Send + 'static,
    S: tower::Service<Request<ReqBody>, Response = Response<ResBody>>,
    L: ChannelLayer,
{
    type Response = <EngineIoService<Client<L>, S> as Service<Request<ReqBody>>>::Response;
    type Error = S::Error;
    type Future = <EngineIoService<Client<L>, S> as Service<Request<ReqBody>>>::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.engine_svc.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        self.engine_svc.call(req)
    }
}

impl<S: Clone, L: ChannelLayer> Clone for SockIoService<S, L> {
    fn clone(&self) -> Self {
        Self {
            engine_svc: self.engine_svc.clone(),
        }
    }
}

impl<S, L: ChannelLayer> std::fmt::Debug for SockIoService<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SockIoService").finish()
    }
}
