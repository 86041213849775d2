use std::sync::Arc;

use tower::Layer;

use crate::{channel::ChannelLayer, client::Client, service::SockIoService};

/// A tower [`Layer`] mounting a [`SockIoService`] in front of an inner
/// service.
pub struct SockIoLayer<L: ChannelLayer = crate::channel::LocalLayer> {
    client: Arc<Client<L>>,
}

impl<L: ChannelLayer> SockIoLayer<L> {
    pub(crate) fn from_client(client: Arc<Client<L>>) -> Self {
        Self { client }
    }
}

impl<L: ChannelLayer> Clone for SockIoLayer<L> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<S: Clone, L: ChannelLayer> Layer<S> for SockIoLayer<L> {
    type Service = SockIoService<S, L>;

    fn layer(&self, inner: S) -> Self::Service {
        SockIoService::with_client(inner, self.client.clone())
    }
}
