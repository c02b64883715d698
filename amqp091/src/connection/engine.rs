//! The engine owns the byte stream. It performs the handshake, then routes every incoming
//! frame to the connection itself or to a channel, writes outgoing frame groups, and keeps
//! the heartbeat going.

use std::{collections::BTreeMap, io, sync::Arc, time::Duration};

use amqp091_types::{
    definitions::{ReplyCode, CONTROL_CHANNEL, FRAME_MIN_SIZE},
    methods::{
        connection::{self, ConnectionMethod},
        AmqpMethod, Method, MethodId,
    },
    primitives::FieldTable,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::Receiver,
    task::JoinHandle,
};
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    channel::{
        self,
        shared::{ChannelShared, CloseReason},
        ProtocolViolation,
    },
    control::ConnectionControl,
    frames::{self, Frame, FrameBody},
    sasl::SaslProfile,
    transport::{self, protocol_header::ProtocolHeader, Transport},
    util::Running,
};

use super::{heartbeat::HeartBeat, Error, OpenError, Tuning};

/// What the client brings to the handshake
#[derive(Debug, Clone)]
pub(crate) struct Handshake {
    pub sasl_profile: SaslProfile,
    pub virtual_host: String,
    pub locale: String,
    pub client_properties: FieldTable,
    pub tuning: Tuning,
}

/// What the handshake settled on
#[derive(Debug, Clone)]
pub(crate) struct Negotiated {
    pub tuning: Tuning,
    pub server_properties: FieldTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Open,
    CloseSent,
}

#[derive(Debug)]
pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    control: Receiver<ConnectionControl>,
    outgoing: Receiver<Vec<Frame>>,
    heartbeat: HeartBeat,
    channels: BTreeMap<u16, Arc<ChannelShared>>,
    next_channel: u32,
    tuning: Tuning,
    state: EngineState,

    /// Set by every flush, cleared by every heartbeat tick
    wrote_since_tick: bool,
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Open the connection without starting the event loop
    pub(crate) async fn open(
        mut io: Io,
        handshake: Handshake,
        control: Receiver<ConnectionControl>,
        outgoing: Receiver<Vec<Frame>>,
    ) -> Result<(Self, Negotiated), OpenError> {
        Transport::send_proto_header(&mut io, ProtocolHeader::amqp091()).await?;
        let transport = Transport::bind(io, FRAME_MIN_SIZE, None);

        let mut engine = Self {
            transport,
            control,
            outgoing,
            heartbeat: HeartBeat::never(),
            channels: BTreeMap::new(),
            next_channel: 1,
            tuning: handshake.tuning,
            state: EngineState::Open,
            wrote_since_tick: false,
        };
        let negotiated = engine.handshake(handshake).await?;
        Ok((engine, negotiated))
    }

    pub(crate) fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn handshake(&mut self, handshake: Handshake) -> Result<Negotiated, OpenError> {
        let Handshake {
            sasl_profile,
            virtual_host,
            locale,
            client_properties,
            tuning,
        } = handshake;

        let start: connection::Start = self.recv_connection_method().await?;
        debug!(
            version_major = start.version_major,
            version_minor = start.version_minor,
            "Start received"
        );
        let mechanism = sasl_profile.mechanism();
        if !start.offers_mechanism(mechanism) {
            return Err(OpenError::MechanismNotSupported {
                mechanism,
                offered: start.mechanisms.clone(),
            });
        }
        if !start.offers_locale(&locale) {
            warn!(%locale, "Locale is not offered by the server");
        }

        let start_ok = connection::StartOk {
            client_properties,
            mechanism: mechanism.to_string(),
            response: sasl_profile.response(),
            locale,
        };
        self.send_frames(vec![Frame::method(CONTROL_CHANNEL, start_ok)])
            .await?;

        let tune: connection::Tune = self.recv_connection_method().await?;
        let tuning = tuning.negotiate(&tune);
        debug!(
            channel_max = tuning.channel_max,
            frame_max = tuning.frame_max,
            heartbeat = tuning.heartbeat,
            "Tuned"
        );
        let tune_ok = connection::TuneOk::from(tuning);
        self.send_frames(vec![Frame::method(CONTROL_CHANNEL, tune_ok)])
            .await?;

        self.tuning = tuning;
        self.transport.set_max_frame_size(tuning.frame_max);
        self.transport
            .set_idle_timeout(Duration::from_secs(u64::from(tuning.heartbeat) * 2));

        self.send_frames(vec![Frame::method(
            CONTROL_CHANNEL,
            connection::Open::new(virtual_host),
        )])
        .await?;
        let _: connection::OpenOk = self.recv_connection_method().await?;
        debug!("Opened");

        self.heartbeat = HeartBeat::from_secs(tuning.heartbeat);
        Ok(Negotiated {
            tuning,
            server_properties: start.server_properties,
        })
    }

    /// Wait for the next method on channel 0, skipping heartbeats
    async fn recv_connection_method<M: AmqpMethod>(&mut self) -> Result<M, OpenError> {
        loop {
            let frame = match self.transport.next().await {
                Some(frame) => frame?,
                None => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            };
            trace_incoming(&frame);

            let Frame { channel, body } = frame;
            match (channel, body) {
                (_, FrameBody::Heartbeat) => continue,
                (
                    CONTROL_CHANNEL,
                    FrameBody::Method(Method::Connection(ConnectionMethod::Close(close))),
                ) => {
                    let ok = Frame::method(CONTROL_CHANNEL, connection::CloseOk);
                    if let Err(err) = self.send_frames(vec![ok]).await {
                        warn!(?err, "Failed to send CloseOk");
                    }
                    return Err(OpenError::RemoteClosed {
                        code: close.code(),
                        text: close.reply_text,
                    });
                }
                (CONTROL_CHANNEL, FrameBody::Method(method)) => {
                    return M::try_from(method).map_err(|found| OpenError::UnexpectedMethod {
                        expected: M::ID,
                        found: found.id(),
                    })
                }
                (channel, body) => {
                    return Err(OpenError::UnexpectedFrame {
                        channel,
                        frame_type: body.frame_type(),
                    })
                }
            }
        }
    }

    /// Write a group of frames back to back and flush once
    #[instrument(name = "SEND", skip_all)]
    async fn send_frames(&mut self, frames: Vec<Frame>) -> Result<(), transport::Error> {
        for frame in frames {
            trace!(channel = frame.channel(), frame = ?frame.body());
            self.transport.feed(frame).await?;
        }
        self.transport.flush().await?;
        self.wrote_since_tick = true;
        Ok(())
    }

    fn allocate_channel(&mut self) -> Result<Arc<ChannelShared>, channel::Error> {
        if self.state != EngineState::Open {
            return Err(channel::Error::OperationOnClosedConnection);
        }
        self.channels.retain(|_, channel| !channel.is_closed());

        if self.next_channel > u32::from(self.tuning.effective_channel_max()) {
            return Err(channel::Error::ChannelMaxReached);
        }
        let number = self.next_channel as u16;
        self.next_channel += 1;

        let channel = Arc::new(ChannelShared::new(number));
        self.channels.insert(number, channel.clone());
        debug!(channel = number, "Channel allocated");
        Ok(channel)
    }

    fn fail_all_channels(&mut self) {
        for (_, channel) in std::mem::take(&mut self.channels) {
            channel.close(CloseReason::Connection, channel::Error::ConnectionClosed);
        }
    }

    /// Stop the heartbeat, send `Connection.Close` and wait for `Connection.CloseOk`
    async fn begin_close(
        &mut self,
        code: ReplyCode,
        text: impl Into<String>,
        method: Option<MethodId>,
    ) -> Result<(), Error> {
        self.heartbeat = HeartBeat::never();
        self.fail_all_channels();
        let close = connection::Close::new(code, text, method);
        self.send_frames(vec![Frame::method(CONTROL_CHANNEL, close)])
            .await?;
        self.state = EngineState::CloseSent;
        debug!("Close sent");
        Ok(())
    }

    async fn on_violation(&mut self, violation: ProtocolViolation) -> Result<Running, Error> {
        error!(code = %violation.code, text = %violation.text, "Protocol violation");
        self.fail_all_channels();
        let close =
            connection::Close::new(violation.code, violation.text.clone(), violation.method);
        if let Err(err) = self
            .send_frames(vec![Frame::method(CONTROL_CHANNEL, close)])
            .await
        {
            warn!(?err, "Failed to send Close");
        }
        Err(Error::Local {
            code: violation.code,
            text: violation.text,
        })
    }

    #[instrument(name = "RECV", skip_all)]
    async fn on_incoming(
        &mut self,
        incoming: Result<Frame, transport::Error>,
    ) -> Result<Running, Error> {
        let frame = incoming?;
        trace!(channel = frame.channel(), frame = ?frame.body());

        let Frame { channel, body } = frame;
        if channel == CONTROL_CHANNEL {
            return self.on_connection_frame(body).await;
        }

        if self.state == EngineState::CloseSent {
            trace!(channel, "Discarded while closing");
            return Ok(Running::Continue);
        }

        let shared = match self.channels.get(&channel) {
            Some(shared) => shared.clone(),
            None => {
                let method = match &body {
                    FrameBody::Method(method) => Some(method.id()),
                    _ => None,
                };
                let violation = ProtocolViolation::new(
                    ReplyCode::ChannelError,
                    format!("CHANNEL_ERROR - unknown channel {}", channel),
                    method,
                );
                return self.on_violation(violation).await;
            }
        };

        match shared.on_incoming(body) {
            Ok(Some(reply)) => {
                self.send_frames(vec![Frame::method(channel, reply)])
                    .await?
            }
            Ok(None) => {}
            Err(violation) => return self.on_violation(violation).await,
        }

        if shared.is_closed() {
            self.channels.remove(&channel);
            debug!(channel, "Channel removed");
        }
        Ok(Running::Continue)
    }

    async fn on_connection_frame(&mut self, body: FrameBody) -> Result<Running, Error> {
        let method = match body {
            FrameBody::Heartbeat => return Ok(Running::Continue),
            FrameBody::Method(method) => method,
            body => {
                let violation = ProtocolViolation::new(
                    ReplyCode::UnexpectedFrame,
                    format!(
                        "UNEXPECTED_FRAME - frame of type {} on channel 0",
                        body.frame_type()
                    ),
                    None,
                );
                return self.on_violation(violation).await;
            }
        };

        match (self.state, method) {
            (state, Method::Connection(ConnectionMethod::Close(close))) => {
                let code = close.code();
                warn!(%code, text = %close.reply_text, "Connection closed by server");
                self.fail_all_channels();
                let ok = Frame::method(CONTROL_CHANNEL, connection::CloseOk);
                if let Err(err) = self.send_frames(vec![ok]).await {
                    warn!(?err, "Failed to send CloseOk");
                }
                match state {
                    // Both sides closed at the same time
                    EngineState::CloseSent => Ok(Running::Stop),
                    EngineState::Open => Err(Error::Remote {
                        code,
                        text: close.reply_text,
                    }),
                }
            }
            (EngineState::CloseSent, Method::Connection(ConnectionMethod::CloseOk(_))) => {
                debug!("CloseOk received");
                Ok(Running::Stop)
            }
            (EngineState::CloseSent, method) => {
                trace!(method = method.name(), "Discarded while closing");
                Ok(Running::Continue)
            }
            (EngineState::Open, method) => {
                let violation = ProtocolViolation::new(
                    ReplyCode::CommandInvalid,
                    format!("COMMAND_INVALID - unexpected {} on channel 0", method.name()),
                    Some(method.id()),
                );
                self.on_violation(violation).await
            }
        }
    }

    async fn on_control(&mut self, control: ConnectionControl) -> Result<Running, Error> {
        match control {
            ConnectionControl::CreateChannel { responder } => {
                let result = self.allocate_channel();
                // The caller may have given up waiting
                let _ = responder.send(result);
            }
            ConnectionControl::Close => {
                self.begin_close(ReplyCode::Success, "Goodbye", None)
                    .await?
            }
        }
        Ok(Running::Continue)
    }

    async fn on_outgoing(&mut self, frames: Vec<Frame>) -> Result<Running, Error> {
        let channel = frames.first().map(Frame::channel);
        match channel {
            Some(channel) if self.channels.contains_key(&channel) => {
                self.send_frames(frames).await?;
            }
            Some(channel) => warn!(channel, "Frames for a removed channel discarded"),
            None => {}
        }
        Ok(Running::Continue)
    }

    async fn on_heartbeat(&mut self) -> Result<Running, Error> {
        if std::mem::take(&mut self.wrote_since_tick) {
            return Ok(Running::Continue);
        }
        self.send_frames(vec![Frame::heartbeat()]).await?;
        self.wrote_since_tick = false;
        Ok(Running::Continue)
    }

    /// Best effort `Connection.Close` after the incoming byte stream could not be decoded
    async fn close_on_framing_error(&mut self, err: &frames::Error) {
        let code = match err {
            frames::Error::Io(_) => return,
            frames::Error::Codec(_) => ReplyCode::SyntaxError,
            _ => ReplyCode::FrameError,
        };
        let close = connection::Close::new(code, err.to_string(), None);
        if let Err(err) = self
            .send_frames(vec![Frame::method(CONTROL_CHANNEL, close)])
            .await
        {
            warn!(?err, "Failed to send Close");
        }
    }

    async fn event_loop(mut self) -> Result<(), Error> {
        let outcome = loop {
            let result = tokio::select! {
                _ = self.heartbeat.next() => self.on_heartbeat().await,
                incoming = self.transport.next() => match incoming {
                    Some(incoming) => self.on_incoming(incoming).await,
                    None => match self.state {
                        EngineState::CloseSent => Ok(Running::Stop),
                        EngineState::Open => Err(Error::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "Connection closed by peer",
                        ))),
                    },
                },
                control = self.control.recv(), if self.state == EngineState::Open => {
                    match control {
                        Some(control) => self.on_control(control).await,
                        // The handle is gone
                        None => self.on_control(ConnectionControl::Close).await,
                    }
                },
                frames = self.outgoing.recv(), if self.state == EngineState::Open => {
                    match frames {
                        Some(frames) => self.on_outgoing(frames).await,
                        // The handle and every channel are gone
                        None => self.on_control(ConnectionControl::Close).await,
                    }
                },
            };

            match result {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break Ok(()),
                Err(error) => {
                    if let Error::Framing(err) = &error {
                        self.close_on_framing_error(err).await;
                    }
                    error!(?error);
                    break Err(error);
                }
            }
        };

        self.fail_all_channels();
        debug!("Stopped");
        outcome
    }
}

fn trace_incoming(frame: &Frame) {
    let span = tracing::trace_span!("RECV");
    let _enter = span.enter();
    trace!(channel = frame.channel(), frame = ?frame.body());
}
