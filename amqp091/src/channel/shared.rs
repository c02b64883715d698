//! State of a channel shared between its handles and the connection engine
//!
//! The engine calls [`ChannelShared::on_incoming`] for every frame of the channel, strictly
//! in arrival order. Handles register their pending call through the same lock, so a call
//! is either registered before the channel closes, and then failed by the close, or it
//! sees the closed state and never sends anything.

use std::{collections::HashMap, sync::Arc};

use amqp091_types::{
    definitions::{ReplyCode, CLASS_CHANNEL},
    methods::{
        basic::{self, BasicMethod},
        channel::{self, ChannelMethod},
        AmqpMethod, Method, MethodId,
    },
    properties::ContentHeader,
};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, OwnedMutexGuard};
use tracing::{debug, trace, warn};

use crate::frames::FrameBody;

use super::{
    content::{Content, ContentMethod, Delivery, Reassembler, Returned},
    correlator::{Correlation, Correlator, ReplyResult},
    error::ProtocolViolation,
    Error,
};

pub(crate) type DeliverySender = mpsc::UnboundedSender<Delivery>;
pub(crate) type ReturnedSender = mpsc::UnboundedSender<Returned>;

/// Why a channel ended up closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// Closed by this client
    Local,

    /// Closed by the server with `Channel.Close`
    Remote { code: ReplyCode, text: String },

    /// The connection went away
    Connection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChannelState {
    Opening,
    Open,
    Closing,
    Closed(CloseReason),
}

#[derive(Debug)]
pub(crate) struct ChannelShared {
    number: u16,
    gate: Arc<tokio::sync::Mutex<()>>,
    inner: Mutex<ChannelInner>,
}

#[derive(Debug)]
struct ChannelInner {
    state: ChannelState,
    correlator: Correlator,
    reassembler: Reassembler,

    /// Deliveries sender of a `Basic.Consume` waiting for its `ConsumeOk`
    pending_consumer: Option<DeliverySender>,
    consumers: HashMap<String, DeliverySender>,
    returns: Option<ReturnedSender>,
    flow_active: bool,
}

impl ChannelShared {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            inner: Mutex::new(ChannelInner {
                state: ChannelState::Opening,
                correlator: Correlator::default(),
                reassembler: Reassembler::default(),
                pending_consumer: None,
                consumers: HashMap::new(),
                returns: None,
                flow_active: true,
            }),
        }
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    #[cfg(test)]
    pub fn state(&self) -> ChannelState {
        self.inner.lock().state.clone()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.inner.lock().state, ChannelState::Closed(_))
    }

    pub fn flow_active(&self) -> bool {
        self.inner.lock().flow_active
    }

    pub fn has_consumer(&self, consumer_tag: &str) -> bool {
        self.inner.lock().consumers.contains_key(consumer_tag)
    }

    /// Wait until no other call is in flight on this channel
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.gate.clone().lock_owned().await
    }

    /// Fails fast unless the channel is open
    pub fn ensure_open(&self) -> Result<(), Error> {
        self.inner.lock().ensure_usable(false)
    }

    /// Fails fast unless a call waiting for `expected` may be sent
    pub fn ensure_callable(&self, expected: MethodId) -> Result<(), Error> {
        self.inner.lock().ensure_usable(expected == channel::OpenOk::ID)
    }

    /// Register the reply of the call about to be sent
    pub fn register(
        &self,
        permit: OwnedMutexGuard<()>,
        expected: MethodId,
    ) -> Result<oneshot::Receiver<ReplyResult>, Error> {
        let mut inner = self.inner.lock();
        inner.ensure_usable(expected == channel::OpenOk::ID)?;
        Ok(inner.correlator.expect(expected, permit))
    }

    /// Like [`register`](Self::register) for `Basic.Consume`, parking the deliveries sender
    /// until the consumer tag is known
    pub fn register_consumer(
        &self,
        permit: OwnedMutexGuard<()>,
        deliveries: DeliverySender,
    ) -> Result<oneshot::Receiver<ReplyResult>, Error> {
        let mut inner = self.inner.lock();
        inner.ensure_usable(false)?;
        inner.pending_consumer = Some(deliveries);
        Ok(inner.correlator.expect(basic::ConsumeOk::ID, permit))
    }

    /// Move to `Closing` and register the `Channel.CloseOk`
    pub fn begin_close(
        &self,
        permit: OwnedMutexGuard<()>,
    ) -> Result<oneshot::Receiver<ReplyResult>, Error> {
        let mut inner = self.inner.lock();
        inner.ensure_usable(false)?;
        inner.state = ChannelState::Closing;
        inner.reassembler.clear();
        debug!(channel = self.number, "Closing");
        Ok(inner.correlator.expect(channel::CloseOk::ID, permit))
    }

    pub fn set_returns(&self, returns: ReturnedSender) {
        self.inner.lock().returns = Some(returns);
    }

    /// Close the channel and fail whatever is waiting on it
    pub fn close(&self, reason: CloseReason, error: Error) {
        self.inner.lock().close(reason, error);
    }

    /// Handle one incoming frame. Returns the method to send back, if any.
    pub fn on_incoming(&self, body: FrameBody) -> Result<Option<Method>, ProtocolViolation> {
        let mut inner = self.inner.lock();
        match body {
            FrameBody::Method(method) => inner.on_method(self.number, method),
            FrameBody::Header(header) => inner.on_header(self.number, header),
            FrameBody::Body(chunk) => inner.on_body(self.number, chunk),
            FrameBody::Heartbeat => Err(ProtocolViolation::new(
                ReplyCode::FrameError,
                "FRAME_ERROR - heartbeat on a non-zero channel",
                None,
            )),
        }
    }
}

impl ChannelInner {
    fn ensure_usable(&self, opening: bool) -> Result<(), Error> {
        match &self.state {
            ChannelState::Open => Ok(()),
            ChannelState::Opening if opening => Ok(()),
            ChannelState::Closed(CloseReason::Connection) => {
                Err(Error::OperationOnClosedConnection)
            }
            _ => Err(Error::OperationOnClosedChannel),
        }
    }

    fn close(&mut self, reason: CloseReason, error: Error) {
        if !matches!(self.state, ChannelState::Closed(_)) {
            self.state = ChannelState::Closed(reason);
        }
        self.correlator.fail(error);
        self.reassembler.clear();
        self.pending_consumer = None;
        self.consumers.clear();
        self.returns = None;
    }

    fn on_method(
        &mut self,
        channel: u16,
        method: Method,
    ) -> Result<Option<Method>, ProtocolViolation> {
        if self.state == ChannelState::Closing
            && !matches!(
                method,
                Method::Channel(ChannelMethod::Close(_) | ChannelMethod::CloseOk(_))
            )
        {
            trace!(channel, method = method.name(), "Discarded while closing");
            return Ok(None);
        }

        if self.reassembler.is_in_progress()
            && !matches!(method, Method::Channel(ChannelMethod::Close(_)))
        {
            return Err(ProtocolViolation::new(
                ReplyCode::UnexpectedFrame,
                format!(
                    "UNEXPECTED_FRAME - {} received while content was expected",
                    method.name()
                ),
                Some(method.id()),
            ));
        }

        match method {
            Method::Basic(BasicMethod::Deliver(deliver)) => {
                self.reassembler.start(ContentMethod::Deliver(deliver))?;
                Ok(None)
            }
            Method::Basic(BasicMethod::Return(returned)) => {
                self.reassembler.start(ContentMethod::Return(returned))?;
                Ok(None)
            }
            Method::Basic(BasicMethod::Cancel(cancel)) => {
                debug!(channel, consumer_tag = %cancel.consumer_tag, "Consumer cancelled by server");
                self.consumers.remove(&cancel.consumer_tag);
                match cancel.no_wait {
                    true => Ok(None),
                    false => Ok(Some(
                        basic::CancelOk {
                            consumer_tag: cancel.consumer_tag,
                        }
                        .into(),
                    )),
                }
            }
            Method::Channel(ChannelMethod::Close(close)) => {
                let code = close.code();
                warn!(channel, %code, text = %close.reply_text, "Channel closed by server");
                self.close(
                    CloseReason::Remote {
                        code,
                        text: close.reply_text.clone(),
                    },
                    Error::ChannelClosed {
                        code,
                        text: close.reply_text,
                    },
                );
                Ok(Some(channel::CloseOk.into()))
            }
            Method::Channel(ChannelMethod::Flow(flow)) => {
                debug!(channel, active = flow.active, "Flow");
                self.flow_active = flow.active;
                Ok(Some(channel::FlowOk { active: flow.active }.into()))
            }
            Method::Connection(_) => Err(ProtocolViolation::new(
                ReplyCode::CommandInvalid,
                format!(
                    "COMMAND_INVALID - {} on channel {}",
                    method.name(),
                    channel
                ),
                Some(method.id()),
            )),
            reply => {
                self.on_reply(channel, reply)?;
                Ok(None)
            }
        }
    }

    fn on_reply(&mut self, channel: u16, reply: Method) -> Result<(), ProtocolViolation> {
        let found = reply.id();
        match self.correlator.take(found) {
            Correlation::Expected(pending) => {
                self.on_expected_reply(channel, &reply);
                pending.complete(Ok(reply));
                Ok(())
            }
            Correlation::Mismatch(pending) => {
                let expected = pending.expected();
                warn!(channel, %expected, %found, "Unexpected reply");
                self.pending_consumer = None;
                if self.state == ChannelState::Opening {
                    self.state = ChannelState::Closed(CloseReason::Local);
                }
                pending.complete(Err(Error::UnexpectedReply { expected, found }));
                Ok(())
            }
            Correlation::Unsolicited if found.class_id == CLASS_CHANNEL => {
                // A CloseOk crossing a server Close, or a FlowOk nobody asked for
                trace!(channel, method = reply.name(), "Discarded");
                Ok(())
            }
            Correlation::Unsolicited => Err(ProtocolViolation::unsolicited(found)),
        }
    }

    /// State changes that take effect together with the reply
    fn on_expected_reply(&mut self, channel: u16, reply: &Method) {
        match reply {
            Method::Channel(ChannelMethod::OpenOk(_)) => {
                debug!(channel, "Opened");
                self.state = ChannelState::Open;
            }
            Method::Channel(ChannelMethod::CloseOk(_)) => {
                debug!(channel, "Closed");
                self.close(CloseReason::Local, Error::OperationOnClosedChannel);
            }
            Method::Basic(BasicMethod::ConsumeOk(ok)) => {
                if let Some(deliveries) = self.pending_consumer.take() {
                    self.consumers.insert(ok.consumer_tag.clone(), deliveries);
                }
            }
            Method::Basic(BasicMethod::CancelOk(ok)) => {
                self.consumers.remove(&ok.consumer_tag);
            }
            _ => {}
        }
    }

    fn on_header(
        &mut self,
        channel: u16,
        header: ContentHeader,
    ) -> Result<Option<Method>, ProtocolViolation> {
        if self.state == ChannelState::Closing {
            trace!(channel, "Content header discarded while closing");
            return Ok(None);
        }
        if let Some(content) = self.reassembler.on_header(header)? {
            self.route(channel, content);
        }
        Ok(None)
    }

    fn on_body(&mut self, channel: u16, chunk: Bytes) -> Result<Option<Method>, ProtocolViolation> {
        if self.state == ChannelState::Closing {
            trace!(channel, "Content body discarded while closing");
            return Ok(None);
        }
        if let Some(content) = self.reassembler.on_body(chunk)? {
            self.route(channel, content);
        }
        Ok(None)
    }

    fn route(&mut self, channel: u16, content: Content) {
        match content {
            Content::Delivery(delivery) => {
                let consumer_tag = delivery.consumer_tag().to_string();
                match self.consumers.get(&consumer_tag) {
                    Some(deliveries) => {
                        if deliveries.send(delivery).is_err() {
                            warn!(channel, %consumer_tag, "Consumer dropped, delivery discarded");
                            self.consumers.remove(&consumer_tag);
                        }
                    }
                    None => {
                        warn!(channel, %consumer_tag, "Delivery for unknown consumer discarded")
                    }
                }
            }
            Content::Returned(returned) => match &self.returns {
                Some(returns) => {
                    if returns.send(returned).is_err() {
                        warn!(channel, "Returned message discarded");
                        self.returns = None;
                    }
                }
                None => warn!(
                    channel,
                    code = %returned.reply_code(),
                    routing_key = returned.routing_key(),
                    "Returned message discarded"
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use amqp091_types::{
        definitions::ReplyCode,
        methods::{basic, channel, queue, AmqpMethod, Method},
        properties::{BasicProperties, ContentHeader},
    };
    use bytes::Bytes;
    use tokio::sync::mpsc;

    use crate::{channel::Error, frames::FrameBody};

    use super::{ChannelShared, ChannelState, CloseReason};

    async fn open_channel() -> ChannelShared {
        let shared = ChannelShared::new(1);
        let reply = shared
            .register(shared.acquire().await, channel::OpenOk::ID)
            .unwrap();
        let sent_back = shared
            .on_incoming(FrameBody::Method(channel::OpenOk::default().into()))
            .unwrap();
        assert!(sent_back.is_none());
        assert!(reply.await.unwrap().is_ok());
        assert_eq!(shared.state(), ChannelState::Open);
        shared
    }

    fn deliver(consumer_tag: &str, delivery_tag: u64) -> FrameBody {
        FrameBody::Method(
            basic::Deliver {
                consumer_tag: consumer_tag.to_string(),
                delivery_tag,
                redelivered: false,
                exchange: String::new(),
                routing_key: String::from("test"),
            }
            .into(),
        )
    }

    #[tokio::test]
    async fn only_channel_open_is_allowed_while_opening() {
        let shared = ChannelShared::new(1);
        let result = shared.register(shared.acquire().await, queue::DeclareOk::ID);
        assert!(matches!(result, Err(Error::OperationOnClosedChannel)));
    }

    #[tokio::test]
    async fn mismatched_reply_leaves_channel_open() {
        let shared = open_channel().await;
        let reply = shared
            .register(shared.acquire().await, queue::DeclareOk::ID)
            .unwrap();
        shared
            .on_incoming(FrameBody::Method(queue::BindOk.into()))
            .unwrap();

        assert_eq!(
            reply.await.unwrap(),
            Err(Error::UnexpectedReply {
                expected: queue::DeclareOk::ID,
                found: queue::BindOk::ID,
            })
        );
        assert_eq!(shared.state(), ChannelState::Open);

        let reply = shared
            .register(shared.acquire().await, queue::PurgeOk::ID)
            .unwrap();
        shared
            .on_incoming(FrameBody::Method(queue::PurgeOk { message_count: 0 }.into()))
            .unwrap();
        assert!(reply.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn unsolicited_reply_is_a_violation() {
        let shared = open_channel().await;
        let violation = shared
            .on_incoming(FrameBody::Method(queue::BindOk.into()))
            .unwrap_err();
        assert_eq!(violation.code, ReplyCode::UnexpectedFrame);
        assert_eq!(violation.method, Some(queue::BindOk::ID));
    }

    #[tokio::test]
    async fn server_close_fails_the_pending_call() {
        let shared = open_channel().await;
        let reply = shared
            .register(shared.acquire().await, basic::QosOk::ID)
            .unwrap();

        let close = channel::Close::new(ReplyCode::NotFound, "NOT_FOUND - no queue", None);
        let sent_back = shared
            .on_incoming(FrameBody::Method(close.into()))
            .unwrap();
        assert_eq!(sent_back, Some(Method::from(channel::CloseOk)));

        assert_eq!(
            reply.await.unwrap(),
            Err(Error::ChannelClosed {
                code: ReplyCode::NotFound,
                text: String::from("NOT_FOUND - no queue"),
            })
        );
        assert!(shared.is_closed());
        assert!(matches!(
            shared.register(shared.acquire().await, basic::QosOk::ID),
            Err(Error::OperationOnClosedChannel)
        ));
    }

    #[tokio::test]
    async fn second_close_is_rejected() {
        let shared = open_channel().await;
        let _reply = shared.begin_close(shared.acquire().await).unwrap();
        assert_eq!(shared.state(), ChannelState::Closing);

        // The gate is held by the pending close
        assert!(shared.gate.try_lock().is_err());
        shared
            .on_incoming(FrameBody::Method(channel::CloseOk.into()))
            .unwrap();
        assert_eq!(shared.state(), ChannelState::Closed(CloseReason::Local));

        assert!(matches!(
            shared.begin_close(shared.acquire().await),
            Err(Error::OperationOnClosedChannel)
        ));
    }

    #[tokio::test]
    async fn frames_other_than_close_are_discarded_while_closing() {
        let shared = open_channel().await;
        let _reply = shared.begin_close(shared.acquire().await).unwrap();
        assert_eq!(
            shared.on_incoming(deliver("ctag", 1)).unwrap(),
            None
        );
        assert_eq!(
            shared
                .on_incoming(FrameBody::Method(queue::BindOk.into()))
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn consume_then_deliver() {
        let shared = open_channel().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reply = shared
            .register_consumer(shared.acquire().await, tx)
            .unwrap();
        shared
            .on_incoming(FrameBody::Method(
                basic::ConsumeOk {
                    consumer_tag: String::from("amq.ctag-1"),
                }
                .into(),
            ))
            .unwrap();
        assert!(reply.await.unwrap().is_ok());
        assert!(shared.has_consumer("amq.ctag-1"));

        shared.on_incoming(deliver("amq.ctag-1", 1)).unwrap();
        shared
            .on_incoming(FrameBody::Header(ContentHeader::new(
                0,
                BasicProperties::default(),
            )))
            .unwrap();
        shared.on_incoming(deliver("amq.ctag-1", 2)).unwrap();
        shared
            .on_incoming(FrameBody::Header(ContentHeader::new(
                5,
                BasicProperties::default(),
            )))
            .unwrap();
        shared
            .on_incoming(FrameBody::Body(Bytes::from_static(b"he")))
            .unwrap();
        shared
            .on_incoming(FrameBody::Body(Bytes::from_static(b"llo")))
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.delivery_tag(), 1);
        assert!(first.body().is_empty());
        let second = rx.recv().await.unwrap();
        assert_eq!(second.delivery_tag(), 2);
        assert_eq!(&second.body()[..], b"hello");
    }

    #[tokio::test]
    async fn method_in_the_middle_of_content_is_a_violation() {
        let shared = open_channel().await;
        shared.on_incoming(deliver("ctag", 1)).unwrap();
        let violation = shared
            .on_incoming(FrameBody::Method(queue::BindOk.into()))
            .unwrap_err();
        assert_eq!(violation.code, ReplyCode::UnexpectedFrame);
    }

    #[tokio::test]
    async fn server_cancel_ends_the_consumer() {
        let shared = open_channel().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _reply = shared
            .register_consumer(shared.acquire().await, tx)
            .unwrap();
        shared
            .on_incoming(FrameBody::Method(
                basic::ConsumeOk {
                    consumer_tag: String::from("ctag"),
                }
                .into(),
            ))
            .unwrap();

        let sent_back = shared
            .on_incoming(FrameBody::Method(
                basic::Cancel {
                    consumer_tag: String::from("ctag"),
                    no_wait: false,
                }
                .into(),
            ))
            .unwrap();
        assert_eq!(
            sent_back,
            Some(Method::from(basic::CancelOk {
                consumer_tag: String::from("ctag")
            }))
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn flow_is_answered() {
        let shared = open_channel().await;
        let sent_back = shared
            .on_incoming(FrameBody::Method(channel::Flow { active: false }.into()))
            .unwrap();
        assert_eq!(
            sent_back,
            Some(Method::from(channel::FlowOk { active: false }))
        );
        assert!(!shared.flow_active());
    }

    #[tokio::test]
    async fn connection_loss_fails_the_pending_call() {
        let shared = open_channel().await;
        let reply = shared
            .register(shared.acquire().await, basic::QosOk::ID)
            .unwrap();
        shared.close(CloseReason::Connection, Error::ConnectionClosed);

        assert_eq!(reply.await.unwrap(), Err(Error::ConnectionClosed));
        assert!(matches!(
            shared.register(shared.acquire().await, basic::QosOk::ID),
            Err(Error::OperationOnClosedConnection)
        ));
    }
}
