//! Message content: the method + header + body frame sequence

use amqp091_types::{
    definitions::{DeliveryTag, ReplyCode, FRAME_OVERHEAD},
    methods::basic,
    properties::{BasicProperties, ContentHeader},
};
use bytes::{Bytes, BytesMut};

use crate::frames::{Frame, FrameBody};

/// Upper bound of the buffer reserved up front for an incoming body
const MAX_PREALLOCATION: usize = 1024 * 1024;

/// A message delivered to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    deliver: basic::Deliver,
    properties: BasicProperties,
    body: Bytes,
}

impl Delivery {
    /// Tag of the consumer the message was delivered to
    pub fn consumer_tag(&self) -> &str {
        &self.deliver.consumer_tag
    }

    /// Delivery tag, used to acknowledge or reject the message
    pub fn delivery_tag(&self) -> DeliveryTag {
        self.deliver.delivery_tag
    }

    /// Whether the message was delivered before
    pub fn redelivered(&self) -> bool {
        self.deliver.redelivered
    }

    /// Exchange the message was published to
    pub fn exchange(&self) -> &str {
        &self.deliver.exchange
    }

    /// Routing key the message was published with
    pub fn routing_key(&self) -> &str {
        &self.deliver.routing_key
    }

    /// Message properties
    pub fn properties(&self) -> &BasicProperties {
        &self.properties
    }

    /// Message body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consumes the delivery and returns the body
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// A message the server could not route and sent back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Returned {
    method: basic::Return,
    properties: BasicProperties,
    body: Bytes,
}

impl Returned {
    /// Why the message was returned
    pub fn reply_code(&self) -> ReplyCode {
        self.method.code()
    }

    /// Reply text sent by the server
    pub fn reply_text(&self) -> &str {
        &self.method.reply_text
    }

    /// Exchange the message was published to
    pub fn exchange(&self) -> &str {
        &self.method.exchange
    }

    /// Routing key the message was published with
    pub fn routing_key(&self) -> &str {
        &self.method.routing_key
    }

    /// Message properties
    pub fn properties(&self) -> &BasicProperties {
        &self.properties
    }

    /// Message body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consumes the returned message and returns the body
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// Method that opens an incoming content sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ContentMethod {
    Deliver(basic::Deliver),
    Return(basic::Return),
}

/// A fully reassembled incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Content {
    Delivery(Delivery),
    Returned(Returned),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ContentError {
    #[error("content method received before the previous content was complete")]
    Interleaved,

    #[error("content header received without a content method")]
    UnexpectedHeader,

    #[error("content body received without a content header")]
    UnexpectedBody,

    #[error("content body larger than the declared size of {declared} bytes")]
    BodyOverflow { declared: u64 },
}

#[derive(Debug)]
struct InProgress {
    method: ContentMethod,
    header: Option<(u64, BasicProperties)>,
    body: BytesMut,
}

impl InProgress {
    fn finish(self, properties: BasicProperties) -> Content {
        let body = self.body.freeze();
        match self.method {
            ContentMethod::Deliver(deliver) => Content::Delivery(Delivery {
                deliver,
                properties,
                body,
            }),
            ContentMethod::Return(method) => Content::Returned(Returned {
                method,
                properties,
                body,
            }),
        }
    }
}

/// Collects the header and body frames that follow a content method
#[derive(Debug, Default)]
pub(crate) struct Reassembler {
    in_progress: Option<InProgress>,
}

impl Reassembler {
    pub fn start(&mut self, method: ContentMethod) -> Result<(), ContentError> {
        if self.in_progress.is_some() {
            return Err(ContentError::Interleaved);
        }
        self.in_progress = Some(InProgress {
            method,
            header: None,
            body: BytesMut::new(),
        });
        Ok(())
    }

    pub fn on_header(&mut self, header: ContentHeader) -> Result<Option<Content>, ContentError> {
        let mut in_progress = match self.in_progress.take() {
            Some(in_progress) if in_progress.header.is_none() => in_progress,
            _ => return Err(ContentError::UnexpectedHeader),
        };

        if header.body_size == 0 {
            return Ok(Some(in_progress.finish(header.properties)));
        }

        let capacity = usize::try_from(header.body_size)
            .unwrap_or(usize::MAX)
            .min(MAX_PREALLOCATION);
        in_progress.body.reserve(capacity);
        in_progress.header = Some((header.body_size, header.properties));
        self.in_progress = Some(in_progress);
        Ok(None)
    }

    pub fn on_body(&mut self, chunk: Bytes) -> Result<Option<Content>, ContentError> {
        let in_progress = match &mut self.in_progress {
            Some(in_progress) => in_progress,
            None => return Err(ContentError::UnexpectedBody),
        };
        let declared = match &in_progress.header {
            Some((declared, _)) => *declared,
            None => return Err(ContentError::UnexpectedBody),
        };

        let received = in_progress.body.len() as u64 + chunk.len() as u64;
        if received > declared {
            self.in_progress = None;
            return Err(ContentError::BodyOverflow { declared });
        }
        in_progress.body.extend_from_slice(&chunk);
        if received < declared {
            return Ok(None);
        }

        match self.in_progress.take() {
            Some(mut in_progress) => {
                let properties = in_progress
                    .header
                    .take()
                    .map(|(_, properties)| properties)
                    .unwrap_or_default();
                Ok(Some(in_progress.finish(properties)))
            }
            None => Ok(None),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.is_some()
    }

    /// Drops any partially received content
    pub fn clear(&mut self) {
        self.in_progress = None;
    }
}

/// Splits an outgoing message into its method, header and body frames
///
/// Each body frame carries at most `frame_max - 8` bytes, a zero `frame_max` means a
/// single body frame. An empty body produces no body frames.
pub(crate) fn content_frames(
    channel: u16,
    publish: basic::Publish,
    properties: BasicProperties,
    body: Bytes,
    frame_max: u32,
) -> Vec<Frame> {
    let chunk_size = match frame_max as usize {
        0 => body.len().max(1),
        frame_max => frame_max.saturating_sub(FRAME_OVERHEAD).max(1),
    };

    let mut frames = Vec::with_capacity(2 + body.len() / chunk_size + 1);
    frames.push(Frame::method(channel, publish));
    frames.push(Frame::new(
        channel,
        FrameBody::Header(ContentHeader::new(body.len() as u64, properties)),
    ));

    let mut offset = 0;
    while offset < body.len() {
        let end = (offset + chunk_size).min(body.len());
        frames.push(Frame::new(channel, FrameBody::Body(body.slice(offset..end))));
        offset = end;
    }
    frames
}
