use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::Stream;
use tokio::sync::mpsc;

use super::{Channel, Delivery, Error};

/// Deliveries of one `Basic.Consume` subscription
///
/// The stream ends when the consumer is cancelled, by either side, or when the channel
/// closes.
#[derive(Debug)]
pub struct Consumer {
    tag: String,
    channel: Channel,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
}

impl Consumer {
    pub(crate) fn new(
        tag: String,
        channel: Channel,
        deliveries: mpsc::UnboundedReceiver<Delivery>,
    ) -> Self {
        Self {
            tag,
            channel,
            deliveries,
        }
    }

    /// Consumer tag, as confirmed by the server
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The channel the consumer lives on
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Receive the next delivery, `None` once the consumer has ended
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }

    /// Cancel the subscription with `Basic.Cancel`
    pub async fn cancel(self) -> Result<(), Error> {
        self.channel.basic_cancel(&self.tag).await
    }
}

impl Stream for Consumer {
    type Item = Delivery;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().deliveries.poll_recv(cx)
    }
}
