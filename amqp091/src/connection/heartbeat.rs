//! Implements an asynchronous heartbeat

use std::{task::Poll, time::Duration};

use futures_util::Stream;
use pin_project_lite::pin_project;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

/// Delay before the first heartbeat tick
pub const HEARTBEAT_INITIAL_DELAY: Duration = Duration::from_secs(1);

pin_project! {
    /// A wrapper over an `Option<IntervalStream>` which will never tick ready if the underlying
    /// `Interval` is `None`
    #[derive(Debug)]
    pub struct HeartBeat {
        #[pin]
        interval: Option<IntervalStream>
    }
}

impl HeartBeat {
    /// A [`HeartBeat`] that will never yield `Poll::Ready(_)` with `StreamExt::next()`
    pub fn never() -> Self {
        Self { interval: None }
    }

    /// A [`HeartBeat`] that first ticks after `delay` and then once every `period`
    pub fn new(delay: Duration, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(IntervalStream::new(interval)),
        }
    }

    /// Ticks every `heartbeat` seconds after [`HEARTBEAT_INITIAL_DELAY`], or never if the
    /// negotiated heartbeat is zero
    pub fn from_secs(heartbeat: u16) -> Self {
        match heartbeat {
            0 => Self::never(),
            secs => Self::new(
                HEARTBEAT_INITIAL_DELAY,
                Duration::from_secs(u64::from(secs)),
            ),
        }
    }

    /// Whether the heartbeat ever ticks
    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }
}

impl Stream for HeartBeat {
    type Item = Instant;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.project();
        match this.interval.as_pin_mut() {
            Some(stream) => stream.poll_next(cx),
            None => Poll::Pending,
        }
    }
}
