//! Options of the channel operations that take more than a name

use amqp091_types::{primitives::FieldTable, properties::BasicProperties};

/// Exchange type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExchangeKind {
    /// Routes on an exact routing key match
    #[default]
    Direct,

    /// Routes to every bound queue
    Fanout,

    /// Routes on a routing key pattern
    Topic,

    /// Routes on message header values
    Headers,

    /// A broker specific type, eg. "x-delayed-message"
    Custom(String),
}

impl ExchangeKind {
    /// Name of the type on the wire
    pub fn as_str(&self) -> &str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
            ExchangeKind::Custom(kind) => kind,
        }
    }
}

impl From<&str> for ExchangeKind {
    fn from(value: &str) -> Self {
        match value {
            "direct" => ExchangeKind::Direct,
            "fanout" => ExchangeKind::Fanout,
            "topic" => ExchangeKind::Topic,
            "headers" => ExchangeKind::Headers,
            other => ExchangeKind::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of `Exchange.Declare`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeDeclareOptions {
    /// Only check that the exchange exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Delete once the last binding is gone
    pub auto_delete: bool,

    /// Not publishable by clients
    pub internal: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

impl ExchangeDeclareOptions {
    /// Durable exchange
    pub fn durable() -> Self {
        Self {
            durable: true,
            ..Default::default()
        }
    }
}

/// Options of `Queue.Declare`
///
/// The defaults declare a transient queue that is neither exclusive nor auto-deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDeclareOptions {
    /// Only check that the queue exists
    pub passive: bool,

    /// Survive a broker restart
    pub durable: bool,

    /// Only usable by this connection, deleted when it closes
    pub exclusive: bool,

    /// Delete once the last consumer is cancelled
    pub auto_delete: bool,

    /// Extra arguments, eg. "x-message-ttl"
    pub arguments: FieldTable,
}

impl QueueDeclareOptions {
    /// Durable queue
    pub fn durable() -> Self {
        Self {
            durable: true,
            ..Default::default()
        }
    }

    /// Exclusive, auto-deleted queue
    pub fn exclusive() -> Self {
        Self {
            exclusive: true,
            auto_delete: true,
            ..Default::default()
        }
    }
}

/// Options of `Queue.Delete`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDeleteOptions {
    /// Only delete if the queue has no consumers
    pub if_unused: bool,

    /// Only delete if the queue has no messages
    pub if_empty: bool,
}

/// Options of `Basic.Consume`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Consumer tag, empty to let the server pick one
    pub consumer_tag: String,

    /// Do not receive messages published on this connection
    pub no_local: bool,

    /// Messages are acknowledged on delivery
    pub no_ack: bool,

    /// Be the only consumer of the queue
    pub exclusive: bool,

    /// Extra arguments
    pub arguments: FieldTable,
}

impl ConsumeOptions {
    /// Consume with the given tag
    pub fn with_tag(consumer_tag: impl Into<String>) -> Self {
        Self {
            consumer_tag: consumer_tag.into(),
            ..Default::default()
        }
    }

    /// Set `no_ack`
    pub fn no_ack(mut self, no_ack: bool) -> Self {
        self.no_ack = no_ack;
        self
    }
}

/// Options of `Basic.Publish`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Return the message if no queue is bound to receive it
    pub mandatory: bool,

    /// Return the message if it cannot reach a consumer right away
    pub immediate: bool,

    /// Message properties
    pub properties: BasicProperties,
}

impl PublishOptions {
    /// Set `mandatory`
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    /// Set the message properties
    pub fn properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }
}
