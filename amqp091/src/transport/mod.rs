//! Implements low level transport framing
//!
//! The protocol header is written to the raw byte stream before anything else. After that
//! the stream is wrapped into a `Framed` with a [`FrameCodec`] and exposed as a
//! `Sink<Frame>` plus a `Stream` of frames.

pub mod protocol_header;

mod error;
pub use error::Error;

use std::{task::Poll, time::Duration};

use futures_util::{Future, Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use crate::{
    frames::{Frame, FrameCodec},
    util::IdleTimeout,
};

use protocol_header::ProtocolHeader;

pin_project! {
    /// Framed byte stream with an optional idle timeout on the receiving half
    #[derive(Debug)]
    pub struct Transport<Io> {
        #[pin]
        framed: Framed<Io, FrameCodec>,
        #[pin]
        idle_timeout: Option<IdleTimeout>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Write the protocol header onto the raw byte stream
    pub async fn send_proto_header(
        io: &mut Io,
        proto_header: ProtocolHeader,
    ) -> Result<(), Error> {
        let buf: [u8; 8] = proto_header.into();
        io.write_all(&buf).await?;
        io.flush().await?;
        Ok(())
    }

    /// Wrap the byte stream. A zero `max_frame_size` means no limit, a zero or absent
    /// `idle_timeout` disables idle detection.
    pub fn bind(io: Io, max_frame_size: u32, idle_timeout: Option<Duration>) -> Self {
        let framed = Framed::new(io, FrameCodec::new(max_frame_size));
        let idle_timeout = idle_timeout
            .filter(|duration| !duration.is_zero())
            .map(IdleTimeout::new);

        Self {
            framed,
            idle_timeout,
        }
    }

    /// The current frame size limit
    pub fn max_frame_size(&self) -> u32 {
        self.framed.codec().max_frame_size()
    }

    /// Change the frame size limit
    pub fn set_max_frame_size(&mut self, max_frame_size: u32) -> &mut Self {
        self.framed.codec_mut().set_max_frame_size(max_frame_size);
        self
    }

    /// Change the idle timeout, zero disables it
    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        self.idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };
        self
    }
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_ready(cx).map_err(Into::into)
    }

    fn start_send(self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let this = self.project();
        this.framed.start_send(item).map_err(Into::into)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_close(cx).map_err(Into::into)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.framed.poll_next(cx) {
            Poll::Ready(next) => {
                if let Some(mut delay) = this.idle_timeout.as_pin_mut() {
                    delay.reset();
                }
                Poll::Ready(next.map(|item| item.map_err(Into::into)))
            }
            Poll::Pending => match this.idle_timeout.as_pin_mut() {
                Some(delay) => match delay.poll(cx) {
                    Poll::Ready(()) => Poll::Ready(Some(Err(Error::IdleTimeout))),
                    Poll::Pending => Poll::Pending,
                },
                None => Poll::Pending,
            },
        }
    }
}
