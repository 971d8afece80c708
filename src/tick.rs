//! Pacing between tracker cycles.
//!
//! [`Tracker::run`](crate::Tracker::run) waits on any [`Stream`] between two
//! cycles, and stops once that stream ends. [`Pause`] is the real-time one.

use std::future::Future;
use std::pin::Pin;
use std::task;
use std::time::Duration;

use futures_util::ready;
use futures_util::stream::Stream as FuturesStream;
use pin_project_lite::pin_project;
use tokio::time::{sleep, Sleep};

pin_project! {
/// Yields once per fixed pause, forever.
///
/// The pause starts when the stream is first polled after its previous tick,
/// not when that tick was yielded, so time spent in a cycle does not shorten
/// the pause that follows it.
#[derive(Debug)]
pub struct Pause {
    #[pin]
    sleep: Option<Sleep>,
    period: Duration,
}
}

impl Pause {
    /// Creates the ticker. No timer is registered until it is first polled,
    /// so this may be called outside of a runtime.
    pub fn new(period: Duration) -> Self {
        Pause {
            sleep: None,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl FuturesStream for Pause {
    type Item = ();

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        let mut this = self.project();

        if this.sleep.is_none() {
            this.sleep.set(Some(sleep(*this.period)));
        }

        if let Some(pending) = this.sleep.as_mut().as_pin_mut() {
            ready!(pending.poll(cx));
        }
        this.sleep.set(None);

        task::Poll::Ready(Some(()))
    }
}
