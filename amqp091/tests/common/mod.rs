//! An in-memory broker that plays the server side of the protocol frame by frame

#![allow(dead_code)]

use amqp091::{
    frames::{Frame, FrameBody, FrameCodec},
    types::{
        definitions::PROTOCOL_HEADER,
        methods::{channel, connection, AmqpMethod, Method},
        primitives::FieldTable,
    },
    Builder, Channel, Connection,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{duplex, AsyncReadExt, DuplexStream};
use tokio_util::codec::Framed;

const DUPLEX_BUFFER: usize = 256 * 1024;

pub struct MockBroker {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl MockBroker {
    /// Read and check the client's protocol header
    pub async fn accept(mut io: DuplexStream) -> Self {
        let mut header = [0u8; 8];
        io.read_exact(&mut header).await.unwrap();
        assert_eq!(header, PROTOCOL_HEADER);
        Self {
            framed: Framed::new(io, FrameCodec::new(0)),
        }
    }

    pub async fn send_frame(&mut self, frame: Frame) {
        self.framed.send(frame).await.unwrap();
    }

    pub async fn send(&mut self, channel: u16, method: impl Into<Method>) {
        self.send_frame(Frame::method(channel, method)).await;
    }

    /// Next frame from the client, heartbeats included. `None` once the client hung up.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.framed.next().await.map(|frame| frame.unwrap())
    }

    /// Next method from the client on `channel`, skipping heartbeats
    pub async fn expect<M: AmqpMethod + std::fmt::Debug>(&mut self, channel: u16) -> M {
        loop {
            let frame = self.recv_frame().await.expect("client hung up");
            match frame.body {
                FrameBody::Heartbeat => continue,
                FrameBody::Method(method) => {
                    assert_eq!(frame.channel, channel, "{:?} on wrong channel", method);
                    return M::try_from(method)
                        .unwrap_or_else(|found| panic!("expected {} found {:?}", M::NAME, found));
                }
                body => panic!("expected {} found {:?}", M::NAME, body),
            }
        }
    }

    /// Run the server side of the handshake and return what the client sent
    pub async fn handshake(&mut self, tune: connection::Tune) -> (connection::StartOk, connection::Open) {
        self.send(0, start("PLAIN AMQPLAIN")).await;
        let start_ok: connection::StartOk = self.expect(0).await;

        self.send(0, tune).await;
        let _: connection::TuneOk = self.expect(0).await;

        let open: connection::Open = self.expect(0).await;
        self.send(0, connection::OpenOk::default()).await;
        (start_ok, open)
    }

    /// Answer the `Channel.Open` of `channel`
    pub async fn open_channel(&mut self, channel: u16) {
        let _: channel::Open = self.expect(channel).await;
        self.send(channel, channel::OpenOk::default()).await;
    }
}

pub fn start(mechanisms: &str) -> connection::Start {
    connection::Start {
        version_major: 0,
        version_minor: 9,
        server_properties: FieldTable::new().with("product", "MockBroker"),
        mechanisms: mechanisms.to_string(),
        locales: String::from("en_US"),
    }
}

/// A connected pair without heartbeats
pub async fn connect(tune: connection::Tune) -> (Connection, MockBroker) {
    connect_with(Builder::new().heartbeat(0), tune).await
}

pub async fn connect_with(builder: Builder, tune: connection::Tune) -> (Connection, MockBroker) {
    connect_over(builder, tune, DUPLEX_BUFFER).await
}

/// Like [`connect_with`] over a pipe that holds at most `max_buf_size` unread bytes
pub async fn connect_over(
    builder: Builder,
    tune: connection::Tune,
    max_buf_size: usize,
) -> (Connection, MockBroker) {
    let (client, server) = duplex(max_buf_size);
    let (connection, broker) = tokio::join!(builder.open_with_stream(client), async move {
        let mut broker = MockBroker::accept(server).await;
        broker.handshake(tune).await;
        broker
    });
    (connection.unwrap(), broker)
}

pub async fn create_channel(connection: &Connection, broker: &mut MockBroker) -> Channel {
    let (channel, _) = tokio::join!(connection.create_channel(), async {
        // Numbers are handed out in order, so peek at the frame to learn which one
        let frame = broker.recv_frame().await.expect("client hung up");
        let number = frame.channel;
        match frame.body {
            FrameBody::Method(Method::Channel(channel::ChannelMethod::Open(_))) => {}
            body => panic!("expected Channel.Open found {:?}", body),
        }
        broker.send(number, channel::OpenOk::default()).await;
    });
    channel.unwrap()
}
