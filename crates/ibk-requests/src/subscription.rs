use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::error;

use crate::repository::{Registration, RequestPlan, Signal};
use crate::{RequestError, RequestKey, RequestRepository};

enum State {
    Idle(RequestRepository, RequestPlan),
    Active {
        rx: UnboundedReceiver<Signal>,
        registration: Registration,
    },
    Done,
}

/// Lazy, cancellable sequence of results for one request.
///
/// The first poll (or [`Subscription::start`]) activates the request.
/// The sequence ends after completion or after its first error; dropping
/// the subscription cancels the request.
pub struct Subscription<T> {
    state: State,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Subscription<T> {
    pub(crate) fn new(repo: RequestRepository, plan: RequestPlan) -> Self {
        Self {
            state: State::Idle(repo, plan),
            _item: std::marker::PhantomData,
        }
    }

    /// Activate now instead of on first poll. Activation failures are
    /// returned here and the sequence is finished.
    pub fn start(&mut self) -> Result<(), RequestError> {
        let State::Idle(repo, plan) = &self.state else {
            return Ok(());
        };
        match repo.activate(plan) {
            Ok((rx, registration)) => {
                self.state = State::Active { rx, registration };
                Ok(())
            }
            Err(err) => {
                self.state = State::Done;
                Err(err)
            }
        }
    }

    pub fn key(&self) -> Option<RequestKey> {
        match &self.state {
            State::Active { registration, .. } => Some(registration.key()),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Cancel explicitly. Equivalent to dropping.
    pub fn cancel(&mut self) {
        self.state = State::Done;
    }

    /// Non-blocking receive for synchronous callers. `None` means nothing is
    /// buffered right now, or the sequence is finished (see
    /// [`Subscription::is_finished`]).
    pub fn try_next(&mut self) -> Option<Result<T, RequestError>> {
        if let Err(err) = self.start() {
            return Some(Err(err));
        }
        loop {
            let State::Active { rx, .. } = &mut self.state else {
                return None;
            };
            match rx.try_recv() {
                Ok(signal) => match self.accept(signal) {
                    Some(item) => return item,
                    None => continue,
                },
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.state = State::Done;
                    return None;
                }
            }
        }
    }

    /// Blocking receive for synchronous callers. Must not be called from
    /// inside an async runtime. `None` means the sequence has ended.
    pub fn next_blocking(&mut self) -> Option<Result<T, RequestError>> {
        if let Err(err) = self.start() {
            return Some(Err(err));
        }
        loop {
            let State::Active { rx, .. } = &mut self.state else {
                return None;
            };
            let Some(signal) = rx.blocking_recv() else {
                self.state = State::Done;
                return None;
            };
            if let Some(item) = self.accept(signal) {
                return item;
            }
        }
    }

    /// Map one signal to an item. The outer `None` means "skip", the inner
    /// `None` means "ended".
    #[allow(clippy::option_option)]
    fn accept(&mut self, signal: Signal) -> Option<Option<Result<T, RequestError>>> {
        match signal {
            Signal::Next(value) => match value.downcast::<T>() {
                Ok(value) => Some(Some(Ok(*value))),
                Err(_) => {
                    error!(
                        request = ?self.key(),
                        expected = std::any::type_name::<T>(),
                        "delivered value has a different type, dropped"
                    );
                    None
                }
            },
            Signal::Error(err) => {
                self.state = State::Done;
                Some(Some(Err(err)))
            }
            Signal::Complete => {
                self.state = State::Done;
                Some(None)
            }
        }
    }
}

impl<T: Send + 'static> Stream for Subscription<T> {
    type Item = Result<T, RequestError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Err(err) = this.start() {
            return Poll::Ready(Some(Err(err)));
        }
        loop {
            let State::Active { rx, .. } = &mut this.state else {
                return Poll::Ready(None);
            };
            let Some(signal) = ready!(rx.poll_recv(cx)) else {
                this.state = State::Done;
                return Poll::Ready(None);
            };
            if let Some(item) = this.accept(signal) {
                return Poll::Ready(item);
            }
        }
    }
}
