//! Implements AMQP 0-9-1 channels
//!
//! A [`Channel`] is a cheap, cloneable handle. Synchronous methods go through the
//! channel's single call slot: a second call on the same channel waits until the first
//! one's reply has been resolved.

mod consumer;
mod content;
mod correlator;
mod error;
mod options;
pub(crate) mod shared;

pub use consumer::Consumer;
pub use content::{Delivery, Returned};
pub(crate) use error::ProtocolViolation;
pub use error::Error;
pub use options::{
    ConsumeOptions, ExchangeDeclareOptions, ExchangeKind, PublishOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};

use std::sync::Arc;

use amqp091_types::{
    definitions::{DeliveryTag, ReplyCode},
    methods::{basic, channel, exchange, queue, AmqpMethod},
    primitives::FieldTable,
};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::frames::{Frame, FrameCodec};

use self::{
    content::content_frames,
    correlator::ReplyResult,
    shared::{ChannelShared, CloseReason},
};

/// A logical channel multiplexed over a connection
#[derive(Debug, Clone)]
pub struct Channel {
    shared: Arc<ChannelShared>,
    outgoing: mpsc::Sender<Vec<Frame>>,
    frame_max: u32,
}

impl Channel {
    pub(crate) fn new(
        shared: Arc<ChannelShared>,
        outgoing: mpsc::Sender<Vec<Frame>>,
        frame_max: u32,
    ) -> Self {
        Self {
            shared,
            outgoing,
            frame_max,
        }
    }

    /// Channel number
    pub fn number(&self) -> u16 {
        self.shared.number()
    }

    /// Whether the channel accepts operations
    pub fn is_open(&self) -> bool {
        self.shared.ensure_open().is_ok()
    }

    /// Whether the server currently allows content to flow, as last set by `Channel.Flow`
    pub fn flow_active(&self) -> bool {
        self.shared.flow_active()
    }

    /// Messages the server returns because they could not be routed
    ///
    /// Only the receiver of the latest call gets returned messages. Returned messages
    /// are logged and dropped while nobody listens.
    pub fn returns(&self) -> mpsc::UnboundedReceiver<Returned> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.set_returns(tx);
        rx
    }

    /// Fails unless every frame can be written within the negotiated frame-max
    fn check(&self, frames: &[Frame]) -> Result<(), Error> {
        let codec = FrameCodec::new(self.frame_max);
        frames.iter().try_for_each(|frame| codec.check(frame))?;
        Ok(())
    }

    /// Wait for room in the outgoing queue
    async fn reserve(&self) -> Result<mpsc::Permit<'_, Vec<Frame>>, Error> {
        self.outgoing.reserve().await.map_err(|_| {
            self.shared
                .close(CloseReason::Connection, Error::ConnectionClosed);
            Error::ConnectionClosed
        })
    }

    async fn send(&self, frames: Vec<Frame>) -> Result<(), Error> {
        self.check(&frames)?;
        self.reserve().await?.send(frames);
        Ok(())
    }

    async fn wait_reply<R: AmqpMethod>(
        reply: oneshot::Receiver<ReplyResult>,
    ) -> Result<R, Error> {
        let method = reply.await.map_err(|_| Error::ConnectionClosed)??;
        R::try_from(method).map_err(|found| Error::UnexpectedReply {
            expected: R::ID,
            found: found.id(),
        })
    }

    /// Send `method` and wait for its reply
    async fn call<M, R>(&self, method: M) -> Result<R, Error>
    where
        M: AmqpMethod,
        R: AmqpMethod,
    {
        let frames = vec![Frame::method(self.number(), method)];
        self.check(&frames)?;

        let permit = self.shared.acquire().await;
        self.shared.ensure_callable(R::ID)?;
        // Nothing is awaited between registering the reply and queueing the request
        let slot = self.reserve().await?;
        let reply = self.shared.register(permit, R::ID)?;
        slot.send(frames);
        Self::wait_reply(reply).await
    }

    /// Send a method that has no reply
    async fn cast<M: AmqpMethod>(&self, method: M) -> Result<(), Error> {
        self.shared.ensure_open()?;
        self.send(vec![Frame::method(self.number(), method)]).await
    }

    #[instrument(skip(self), fields(channel = self.number()))]
    pub(crate) async fn open(&self) -> Result<(), Error> {
        let result = self
            .call::<_, channel::OpenOk>(channel::Open::default())
            .await;
        if result.is_err() {
            self.shared.close(CloseReason::Local, Error::OperationOnClosedChannel);
        }
        result.map(|_| ())
    }

    /// Close the channel with `Channel.Close` and wait for `Channel.CloseOk`
    ///
    /// Closing a channel that is not open fails with
    /// [`Error::OperationOnClosedChannel`] and sends nothing.
    pub async fn close(&self) -> Result<(), Error> {
        let close = channel::Close::new(ReplyCode::Success, "Goodbye", None);
        let permit = self.shared.acquire().await;
        self.shared.ensure_open()?;
        let slot = self.reserve().await?;
        let reply = self.shared.begin_close(permit)?;
        slot.send(vec![Frame::method(self.number(), close)]);

        match Self::wait_reply::<channel::CloseOk>(reply).await {
            // The server closed the channel at the same time
            Ok(_) | Err(Error::ChannelClosed { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Ask the server to pause (`false`) or restart (`true`) deliveries
    pub async fn flow(&self, active: bool) -> Result<bool, Error> {
        let ok: channel::FlowOk = self.call(channel::Flow { active }).await?;
        Ok(ok.active)
    }

    /// Declare an exchange
    pub async fn exchange_declare(
        &self,
        exchange: impl Into<String>,
        kind: ExchangeKind,
        options: ExchangeDeclareOptions,
    ) -> Result<(), Error> {
        let declare = exchange::Declare {
            reserved_1: 0,
            exchange: exchange.into(),
            kind: kind.as_str().to_string(),
            passive: options.passive,
            durable: options.durable,
            auto_delete: options.auto_delete,
            internal: options.internal,
            no_wait: false,
            arguments: options.arguments,
        };
        self.call::<_, exchange::DeclareOk>(declare).await?;
        Ok(())
    }

    /// Delete an exchange
    pub async fn exchange_delete(
        &self,
        exchange: impl Into<String>,
        if_unused: bool,
    ) -> Result<(), Error> {
        let delete = exchange::Delete {
            reserved_1: 0,
            exchange: exchange.into(),
            if_unused,
            no_wait: false,
        };
        self.call::<_, exchange::DeleteOk>(delete).await?;
        Ok(())
    }

    /// Bind exchange `destination` to exchange `source`
    pub async fn exchange_bind(
        &self,
        destination: impl Into<String>,
        source: impl Into<String>,
        routing_key: impl Into<String>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let bind = exchange::Bind {
            reserved_1: 0,
            destination: destination.into(),
            source: source.into(),
            routing_key: routing_key.into(),
            no_wait: false,
            arguments,
        };
        self.call::<_, exchange::BindOk>(bind).await?;
        Ok(())
    }

    /// Remove an exchange to exchange binding
    pub async fn exchange_unbind(
        &self,
        destination: impl Into<String>,
        source: impl Into<String>,
        routing_key: impl Into<String>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let unbind = exchange::Unbind {
            reserved_1: 0,
            destination: destination.into(),
            source: source.into(),
            routing_key: routing_key.into(),
            no_wait: false,
            arguments,
        };
        self.call::<_, exchange::UnbindOk>(unbind).await?;
        Ok(())
    }

    /// Declare a queue. An empty name lets the server pick one, which is returned in
    /// the reply.
    pub async fn queue_declare(
        &self,
        queue: impl Into<String>,
        options: QueueDeclareOptions,
    ) -> Result<queue::DeclareOk, Error> {
        let declare = queue::Declare {
            reserved_1: 0,
            queue: queue.into(),
            passive: options.passive,
            durable: options.durable,
            exclusive: options.exclusive,
            auto_delete: options.auto_delete,
            no_wait: false,
            arguments: options.arguments,
        };
        self.call(declare).await
    }

    /// Bind a queue to an exchange
    pub async fn queue_bind(
        &self,
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let bind = queue::Bind {
            reserved_1: 0,
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            no_wait: false,
            arguments,
        };
        self.call::<_, queue::BindOk>(bind).await?;
        Ok(())
    }

    /// Remove a queue binding
    pub async fn queue_unbind(
        &self,
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let unbind = queue::Unbind {
            reserved_1: 0,
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            arguments,
        };
        self.call::<_, queue::UnbindOk>(unbind).await?;
        Ok(())
    }

    /// Remove all ready messages from a queue, returns how many were removed
    pub async fn queue_purge(&self, queue: impl Into<String>) -> Result<u32, Error> {
        let purge = queue::Purge {
            reserved_1: 0,
            queue: queue.into(),
            no_wait: false,
        };
        let ok: queue::PurgeOk = self.call(purge).await?;
        Ok(ok.message_count)
    }

    /// Delete a queue, returns the number of messages it held
    pub async fn queue_delete(
        &self,
        queue: impl Into<String>,
        options: QueueDeleteOptions,
    ) -> Result<u32, Error> {
        let delete = queue::Delete {
            reserved_1: 0,
            queue: queue.into(),
            if_unused: options.if_unused,
            if_empty: options.if_empty,
            no_wait: false,
        };
        let ok: queue::DeleteOk = self.call(delete).await?;
        Ok(ok.message_count)
    }

    /// Limit the unacknowledged messages the server sends
    pub async fn basic_qos(
        &self,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error> {
        let qos = basic::Qos::new(prefetch_size, prefetch_count, global);
        self.call::<_, basic::QosOk>(qos).await?;
        Ok(())
    }

    /// Start consuming from a queue
    ///
    /// The consumer is registered under the tag the server confirms, which is the one
    /// in `options` unless that is empty.
    pub async fn basic_consume(
        &self,
        queue: impl Into<String>,
        options: ConsumeOptions,
    ) -> Result<Consumer, Error> {
        let consume = basic::Consume {
            reserved_1: 0,
            queue: queue.into(),
            consumer_tag: options.consumer_tag,
            no_local: options.no_local,
            no_ack: options.no_ack,
            exclusive: options.exclusive,
            no_wait: false,
            arguments: options.arguments,
        };

        let frames = vec![Frame::method(self.number(), consume)];
        self.check(&frames)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let permit = self.shared.acquire().await;
        self.shared.ensure_open()?;
        let slot = self.reserve().await?;
        let reply = self.shared.register_consumer(permit, tx)?;
        slot.send(frames);
        let ok: basic::ConsumeOk = Self::wait_reply(reply).await?;
        Ok(Consumer::new(ok.consumer_tag, self.clone(), rx))
    }

    /// Cancel a consumer
    pub async fn basic_cancel(&self, consumer_tag: &str) -> Result<(), Error> {
        self.shared.ensure_open()?;
        if !self.shared.has_consumer(consumer_tag) {
            return Err(Error::ConsumerNotFound(consumer_tag.to_string()));
        }
        let cancel = basic::Cancel {
            consumer_tag: consumer_tag.to_string(),
            no_wait: false,
        };
        self.call::<_, basic::CancelOk>(cancel).await?;
        Ok(())
    }

    /// Publish a message
    ///
    /// The method, header and body frames are written as one group, so frames of two
    /// publishes never interleave.
    pub async fn basic_publish(
        &self,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        body: impl Into<Bytes>,
        options: PublishOptions,
    ) -> Result<(), Error> {
        self.shared.ensure_open()?;
        let publish = basic::Publish {
            reserved_1: 0,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            mandatory: options.mandatory,
            immediate: options.immediate,
        };
        let frames = content_frames(
            self.number(),
            publish,
            options.properties,
            body.into(),
            self.frame_max,
        );
        self.send(frames).await
    }

    /// Acknowledge one message, or every message up to `delivery_tag` if `multiple`
    pub async fn basic_ack(&self, delivery_tag: DeliveryTag, multiple: bool) -> Result<(), Error> {
        self.cast(basic::Ack {
            delivery_tag,
            multiple,
        })
        .await
    }

    /// Reject one message
    pub async fn basic_reject(
        &self,
        delivery_tag: DeliveryTag,
        requeue: bool,
    ) -> Result<(), Error> {
        self.cast(basic::Reject {
            delivery_tag,
            requeue,
        })
        .await
    }

    /// Redeliver all unacknowledged messages of the channel
    pub async fn basic_recover(&self, requeue: bool) -> Result<(), Error> {
        self.call::<_, basic::RecoverOk>(basic::Recover { requeue })
            .await?;
        Ok(())
    }
}
