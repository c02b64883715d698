//! Drives the client against an in-memory broker

use std::time::Duration;

use amqp091::{
    channel::Error as ChannelError,
    connection::{Error, OpenError},
    frames::{Frame, FrameBody},
    types::{
        definitions::{ReplyCode, FRAME_MIN_SIZE, PROTOCOL_HEADER},
        methods::{basic, channel, connection, queue, AmqpMethod},
        primitives::FieldTable,
        properties::{BasicProperties, ContentHeader},
    },
    Builder, ConsumeOptions, PublishOptions, QueueDeclareOptions, Tuning,
};
use bytes::Bytes;
use tokio::{io::AsyncWriteExt, time::timeout};

mod common;
use common::{connect, connect_over, connect_with, create_channel, start, MockBroker};

fn tune() -> connection::Tune {
    connection::Tune::new(2047, 131_072, 0)
}

#[tokio::test]
async fn handshake_negotiates_tuning() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let builder = Builder::new()
        .connection_name("orders")
        .credentials("user", "secret")
        .virtual_host("staging")
        .channel_max(100)
        .heartbeat(0);

    let (connection, (start_ok, open)) = tokio::join!(builder.open_with_stream(client), async {
        let mut broker = MockBroker::accept(server).await;
        broker.handshake(connection::Tune::new(0, 65_536, 0)).await
    });
    let connection = connection.unwrap();

    assert_eq!(start_ok.mechanism, "PLAIN");
    assert_eq!(&start_ok.response[..], b"\0user\0secret");
    assert_eq!(start_ok.locale, "en_US");
    assert_eq!(
        start_ok
            .client_properties
            .get("connection_name")
            .and_then(|v| v.as_str()),
        Some("orders")
    );
    assert_eq!(open.virtual_host, "staging");

    assert_eq!(
        connection.tuning(),
        Tuning {
            channel_max: 100,
            frame_max: 65_536,
            heartbeat: 0,
        }
    );
    assert_eq!(
        connection
            .server_properties()
            .get("product")
            .and_then(|v| v.as_str()),
        Some("MockBroker")
    );
}

#[tokio::test]
async fn handshake_fails_without_a_common_mechanism() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (connection, _broker) = tokio::join!(Builder::new().open_with_stream(client), async {
        let mut broker = MockBroker::accept(server).await;
        broker.send(0, start("AMQPLAIN")).await;
        broker
    });

    match connection {
        Err(OpenError::MechanismNotSupported { mechanism, offered }) => {
            assert_eq!(mechanism, "PLAIN");
            assert_eq!(offered, "AMQPLAIN");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn handshake_reports_refused_credentials() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (connection, _) = tokio::join!(Builder::new().open_with_stream(client), async {
        let mut broker = MockBroker::accept(server).await;
        broker.send(0, start("PLAIN")).await;
        let _: connection::StartOk = broker.expect(0).await;
        let refused = connection::Close::new(
            ReplyCode::AccessRefused,
            "ACCESS_REFUSED - Login was refused",
            None,
        );
        broker.send(0, refused).await;
        let _: connection::CloseOk = broker.expect(0).await;
    });

    match connection {
        Err(OpenError::RemoteClosed { code, .. }) => assert_eq!(code, ReplyCode::AccessRefused),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn handshake_detects_protocol_header_mismatch() {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let (connection, _) = tokio::join!(Builder::new().open_with_stream(client), async move {
        let mut header = [0u8; 8];
        tokio::io::AsyncReadExt::read_exact(&mut server, &mut header)
            .await
            .unwrap();
        assert_eq!(header, PROTOCOL_HEADER);
        server.write_all(b"AMQP\x01\x01\x00\x0a").await.unwrap();
        server
    });

    match connection {
        Err(OpenError::ProtocolHeaderMismatch(header)) => {
            assert_eq!(&header, b"AMQP\x01\x01\x00\x0a")
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn channels_are_numbered_from_one() {
    let (connection, mut broker) = connect(tune()).await;

    let first = create_channel(&connection, &mut broker).await;
    let second = create_channel(&connection, &mut broker).await;
    assert_eq!(first.number(), 1);
    assert_eq!(second.number(), 2);
    assert!(first.is_open());
}

#[tokio::test]
async fn channel_max_limits_allocation() {
    let (connection, mut broker) = connect(connection::Tune::new(1, 131_072, 0)).await;

    let _first = create_channel(&connection, &mut broker).await;
    let second = connection.create_channel().await;
    assert!(matches!(second, Err(ChannelError::ChannelMaxReached)));
}

#[tokio::test]
async fn queue_declare_returns_counts() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let (declared, _) = tokio::join!(
        channel.queue_declare("test", QueueDeclareOptions::durable()),
        async {
            let declare: queue::Declare = broker.expect(1).await;
            assert_eq!(declare.queue, "test");
            assert!(declare.durable);
            broker
                .send(
                    1,
                    queue::DeclareOk {
                        queue: String::from("test"),
                        message_count: 3,
                        consumer_count: 1,
                    },
                )
                .await;
        }
    );

    let declared = declared.unwrap();
    assert_eq!(declared.queue, "test");
    assert_eq!(declared.message_count, 3);
    assert_eq!(declared.consumer_count, 1);
}

#[tokio::test]
async fn mismatched_reply_keeps_channel_usable() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let (result, _) = tokio::join!(channel.basic_qos(0, 10, false), async {
        let _: basic::Qos = broker.expect(1).await;
        broker.send(1, queue::PurgeOk { message_count: 0 }).await;
    });
    assert_eq!(
        result,
        Err(ChannelError::UnexpectedReply {
            expected: basic::QosOk::ID,
            found: queue::PurgeOk::ID,
        })
    );
    assert!(channel.is_open());

    let (result, _) = tokio::join!(channel.basic_qos(0, 10, false), async {
        let _: basic::Qos = broker.expect(1).await;
        broker.send(1, basic::QosOk).await;
    });
    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn calls_on_one_channel_take_turns() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let (first, second, _) = tokio::join!(
        channel.queue_purge("first"),
        channel.queue_purge("second"),
        async {
            let purge: queue::Purge = broker.expect(1).await;
            assert_eq!(purge.queue, "first");
            // The second request stays with the client until the first is answered
            assert!(timeout(Duration::from_millis(100), broker.recv_frame())
                .await
                .is_err());
            broker.send(1, queue::PurgeOk { message_count: 1 }).await;

            let purge: queue::Purge = broker.expect(1).await;
            assert_eq!(purge.queue, "second");
            broker.send(1, queue::PurgeOk { message_count: 2 }).await;
        }
    );
    assert_eq!(first, Ok(1));
    assert_eq!(second, Ok(2));
}

#[tokio::test]
async fn unencodable_argument_fails_only_the_call() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let result = channel
        .queue_declare("q".repeat(300), QueueDeclareOptions::default())
        .await;
    assert_eq!(
        result,
        Err(ChannelError::InvalidArgument(
            amqp091::types::Error::ShortStringTooLong(300)
        ))
    );
    assert!(channel.is_open());

    // Nothing reached the wire, the next frame the broker sees is the Qos
    let (result, _) = tokio::join!(channel.basic_qos(0, 10, false), async {
        let qos: basic::Qos = broker.expect(1).await;
        assert_eq!(qos.prefetch_count, 10);
        broker.send(1, basic::QosOk).await;
    });
    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn oversized_content_header_is_rejected() {
    let builder = Builder::new().heartbeat(0).frame_max(FRAME_MIN_SIZE);
    let (connection, mut broker) = connect_with(builder, tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let headers = FieldTable::new().with("x-trace", "t".repeat(5000));
    let options = PublishOptions::default().properties(BasicProperties {
        headers: Some(headers),
        ..Default::default()
    });
    let result = channel.basic_publish("", "orders", "body", options).await;
    assert_eq!(result, Err(ChannelError::FrameTooLarge));
    assert!(channel.is_open());

    channel
        .basic_publish("", "orders", "body", PublishOptions::default())
        .await
        .unwrap();
    let publish: basic::Publish = broker.expect(1).await;
    assert_eq!(publish.routing_key, "orders");
}

#[tokio::test(start_paused = true)]
async fn abandoned_call_does_not_block_the_channel() {
    let builder = Builder::new().heartbeat(0).buffer_size(1);
    let (connection, mut broker) = connect_over(builder, tune(), 64).await;
    let channel = create_channel(&connection, &mut broker).await;

    // The broker stops reading. The first publish stalls the writer, the second fills
    // the outgoing queue.
    let body = Bytes::from(vec![1u8; 1000]);
    for _ in 0..2 {
        channel
            .basic_publish("", "orders", body.clone(), PublishOptions::default())
            .await
            .unwrap();
    }
    let abandoned = timeout(Duration::from_millis(100), channel.basic_qos(0, 1, false)).await;
    assert!(abandoned.is_err());

    for _ in 0..2 {
        let _: basic::Publish = broker.expect(1).await;
        let mut received = 0;
        while received < body.len() {
            match broker.recv_frame().await.unwrap().body {
                FrameBody::Header(header) => assert_eq!(header.body_size, 1000),
                FrameBody::Body(chunk) => received += chunk.len(),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    let (purged, _) = tokio::join!(
        timeout(Duration::from_secs(2), channel.queue_purge("orders")),
        async {
            let purge: queue::Purge = broker.expect(1).await;
            assert_eq!(purge.queue, "orders");
            broker.send(1, queue::PurgeOk { message_count: 0 }).await;
        }
    );
    assert_eq!(purged.unwrap(), Ok(0));
}

#[tokio::test]
async fn server_channel_close_fails_the_pending_call() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let options = QueueDeclareOptions {
        passive: true,
        ..Default::default()
    };
    let (result, _) = tokio::join!(channel.queue_declare("missing", options), async {
        let _: queue::Declare = broker.expect(1).await;
        let close = channel::Close::new(
            ReplyCode::NotFound,
            "NOT_FOUND - no queue 'missing'",
            Some(queue::Declare::ID),
        );
        broker.send(1, close).await;
        let _: channel::CloseOk = broker.expect(1).await;
    });

    match result {
        Err(ChannelError::ChannelClosed { code, text }) => {
            assert_eq!(code, ReplyCode::NotFound);
            assert_eq!(text, "NOT_FOUND - no queue 'missing'");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(!channel.is_open());
    assert_eq!(
        channel.basic_qos(0, 1, false).await,
        Err(ChannelError::OperationOnClosedChannel)
    );
}

#[tokio::test]
async fn connection_close_fails_pending_calls() {
    let (mut connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let (result, _) = tokio::join!(channel.basic_qos(0, 10, false), async {
        let _: basic::Qos = broker.expect(1).await;
        let forced =
            connection::Close::new(ReplyCode::ConnectionForced, "CONNECTION_FORCED", None);
        broker.send(0, forced).await;
        let _: connection::CloseOk = broker.expect(0).await;
    });
    assert_eq!(result, Err(ChannelError::ConnectionClosed));

    assert_eq!(
        channel.basic_qos(0, 10, false).await,
        Err(ChannelError::OperationOnClosedConnection)
    );
    assert!(matches!(
        connection.create_channel().await,
        Err(ChannelError::OperationOnClosedConnection)
    ));
    match connection.close().await {
        Err(Error::Remote { code, .. }) => assert_eq!(code, ReplyCode::ConnectionForced),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn closing_a_channel_twice_fails() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let (result, _) = tokio::join!(channel.close(), async {
        let close: channel::Close = broker.expect(1).await;
        assert_eq!(close.code(), ReplyCode::Success);
        broker.send(1, channel::CloseOk).await;
    });
    assert_eq!(result, Ok(()));
    assert!(!channel.is_open());
    assert_eq!(
        channel.close().await,
        Err(ChannelError::OperationOnClosedChannel)
    );
}

#[tokio::test]
async fn publish_is_split_into_body_frames() {
    let builder = Builder::new().heartbeat(0).frame_max(FRAME_MIN_SIZE);
    let (connection, mut broker) = connect_with(builder, tune()).await;
    assert_eq!(connection.tuning().frame_max, 4096);
    let channel = create_channel(&connection, &mut broker).await;

    let body = Bytes::from(vec![7u8; 10_000]);
    let options = PublishOptions::default()
        .properties(BasicProperties::default().with_content_type("application/octet-stream"));
    channel
        .basic_publish("", "orders", body.clone(), options)
        .await
        .unwrap();

    let publish: basic::Publish = broker.expect(1).await;
    assert_eq!(publish.routing_key, "orders");

    match broker.recv_frame().await.unwrap().body {
        FrameBody::Header(header) => {
            assert_eq!(header.body_size, 10_000);
            assert_eq!(
                header.properties.content_type.as_deref(),
                Some("application/octet-stream")
            );
        }
        body => panic!("unexpected {:?}", body),
    }

    let mut received = Vec::new();
    let mut sizes = Vec::new();
    while received.len() < body.len() {
        match broker.recv_frame().await.unwrap().body {
            FrameBody::Body(chunk) => {
                sizes.push(chunk.len());
                received.extend_from_slice(&chunk);
            }
            body => panic!("unexpected {:?}", body),
        }
    }
    assert_eq!(sizes, vec![4088, 4088, 1824]);
    assert_eq!(received, body);
}

fn deliver(delivery_tag: u64) -> basic::Deliver {
    basic::Deliver {
        consumer_tag: String::from("ctag"),
        delivery_tag,
        redelivered: false,
        exchange: String::new(),
        routing_key: String::from("orders"),
    }
}

#[tokio::test]
async fn consumer_receives_reassembled_deliveries() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;

    let (consumer, _) = tokio::join!(
        channel.basic_consume("orders", ConsumeOptions::with_tag("ctag")),
        async {
            let consume: basic::Consume = broker.expect(1).await;
            assert_eq!(consume.queue, "orders");
            assert_eq!(consume.consumer_tag, "ctag");
            let ok = basic::ConsumeOk {
                consumer_tag: String::from("ctag"),
            };
            broker.send(1, ok).await;
        }
    );
    let mut consumer = consumer.unwrap();
    assert_eq!(consumer.tag(), "ctag");

    // An empty message has no body frames
    broker.send(1, deliver(1)).await;
    let header = ContentHeader::new(0, BasicProperties::default());
    broker.send_frame(Frame::new(1u16, FrameBody::Header(header))).await;

    broker.send(1, deliver(2)).await;
    let header = ContentHeader::new(6, BasicProperties::default());
    broker.send_frame(Frame::new(1u16, FrameBody::Header(header))).await;
    broker
        .send_frame(Frame::new(1u16, FrameBody::Body(Bytes::from_static(b"hel"))))
        .await;
    broker
        .send_frame(Frame::new(1u16, FrameBody::Body(Bytes::from_static(b"lo!"))))
        .await;

    let empty = consumer.recv().await.unwrap();
    assert_eq!(empty.delivery_tag(), 1);
    assert!(empty.body().is_empty());

    let hello = consumer.recv().await.unwrap();
    assert_eq!(hello.delivery_tag(), 2);
    assert_eq!(hello.routing_key(), "orders");
    assert_eq!(&hello.body()[..], b"hello!");

    channel.basic_ack(hello.delivery_tag(), true).await.unwrap();
    let ack: basic::Ack = broker.expect(1).await;
    assert_eq!(ack.delivery_tag, 2);
    assert!(ack.multiple);

    let (cancelled, _) = tokio::join!(consumer.cancel(), async {
        let cancel: basic::Cancel = broker.expect(1).await;
        assert_eq!(cancel.consumer_tag, "ctag");
        let ok = basic::CancelOk {
            consumer_tag: String::from("ctag"),
        };
        broker.send(1, ok).await;
    });
    assert_eq!(cancelled, Ok(()));
    assert_eq!(
        channel.basic_cancel("ctag").await,
        Err(ChannelError::ConsumerNotFound(String::from("ctag")))
    );
}

#[tokio::test]
async fn unroutable_messages_are_returned() {
    let (connection, mut broker) = connect(tune()).await;
    let channel = create_channel(&connection, &mut broker).await;
    let mut returns = channel.returns();

    channel
        .basic_publish("", "nowhere", "lost", PublishOptions::default().mandatory(true))
        .await
        .unwrap();
    let publish: basic::Publish = broker.expect(1).await;
    assert!(publish.mandatory);

    let returned = basic::Return {
        reply_code: ReplyCode::NoRoute.into(),
        reply_text: String::from("NO_ROUTE"),
        exchange: String::new(),
        routing_key: String::from("nowhere"),
    };
    broker.send(1, returned).await;
    let header = ContentHeader::new(4, BasicProperties::default());
    broker.send_frame(Frame::new(1u16, FrameBody::Header(header))).await;
    broker
        .send_frame(Frame::new(1u16, FrameBody::Body(Bytes::from_static(b"lost"))))
        .await;

    let returned = returns.recv().await.unwrap();
    assert_eq!(returned.reply_code(), ReplyCode::NoRoute);
    assert_eq!(returned.routing_key(), "nowhere");
    assert_eq!(&returned.body()[..], b"lost");
}

#[tokio::test]
async fn frame_on_unknown_channel_closes_the_connection() {
    let (mut connection, mut broker) = connect(tune()).await;

    broker.send(7, channel::OpenOk::default()).await;
    let close: connection::Close = broker.expect(0).await;
    assert_eq!(close.code(), ReplyCode::ChannelError);
    assert_eq!(close.failing_method(), Some(channel::OpenOk::ID));

    match connection.on_close().await {
        Err(Error::Local { code, .. }) => assert_eq!(code, ReplyCode::ChannelError),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn closing_the_connection_twice_fails() {
    let (mut connection, mut broker) = connect(tune()).await;

    let (result, _) = tokio::join!(connection.close(), async {
        let close: connection::Close = broker.expect(0).await;
        assert_eq!(close.code(), ReplyCode::Success);
        broker.send(0, connection::CloseOk).await;
    });
    assert!(result.is_ok());
    assert!(matches!(connection.close().await, Err(Error::AlreadyClosed)));
}

#[tokio::test(start_paused = true)]
async fn idle_client_sends_heartbeats() {
    let builder = Builder::new().heartbeat(1);
    let (mut connection, mut broker) =
        connect_with(builder, connection::Tune::new(2047, 131_072, 1)).await;
    assert_eq!(connection.tuning().heartbeat, 1);

    // Keep the client from timing out while waiting for its heartbeat
    let frame = loop {
        match timeout(Duration::from_millis(500), broker.recv_frame()).await {
            Ok(frame) => break frame.unwrap(),
            Err(_) => broker.send_frame(Frame::heartbeat()).await,
        }
    };
    assert_eq!(frame.channel, 0);
    assert_eq!(frame.body, FrameBody::Heartbeat);

    // Silence from the server ends the connection after two intervals
    match connection.on_close().await {
        Err(Error::IdleTimeout) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn writes_suppress_heartbeats() {
    let builder = Builder::new().heartbeat(2);
    let (connection, mut broker) =
        connect_with(builder, connection::Tune::new(2047, 131_072, 2)).await;
    assert_eq!(connection.tuning().heartbeat, 2);
    let channel = create_channel(&connection, &mut broker).await;

    let client = async {
        for delivery_tag in 1..=20 {
            tokio::time::sleep(Duration::from_millis(500)).await;
            channel.basic_ack(delivery_tag, false).await.unwrap();
        }
    };
    let server = async {
        let mut heartbeats = 0;
        let mut acks = 0;
        while acks < 20 {
            let frame = broker.recv_frame().await.unwrap();
            match frame.body {
                FrameBody::Heartbeat => heartbeats += 1,
                FrameBody::Method(method) => {
                    assert!(basic::Ack::try_from(method).is_ok());
                    acks += 1;
                }
                other => panic!("unexpected {:?}", other),
            }
            broker.send_frame(Frame::heartbeat()).await;
        }
        heartbeats
    };
    let ((), heartbeats) = tokio::join!(client, server);
    assert_eq!(heartbeats, 0);

    // Once the client falls silent its heartbeats resume
    let frame = loop {
        match timeout(Duration::from_millis(500), broker.recv_frame()).await {
            Ok(frame) => break frame.unwrap(),
            Err(_) => broker.send_frame(Frame::heartbeat()).await,
        }
    };
    assert_eq!(frame.body, FrameBody::Heartbeat);
}
