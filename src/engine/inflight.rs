use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Waker};

/// Asynchronous work owned by a task and advanced from the job's tick.
///
/// Nothing spawns the future: [`poll`](Self::poll) is called from
/// `Task::poll`, so the work only moves while the runner ticks the job. It is
/// polled with a no-op waker. Futures using tokio resources must be polled on
/// a thread inside a tokio runtime.
#[derive(Default)]
pub struct InFlight {
    future: Option<Pin<Box<dyn Future<Output = ()>>>>,
}

impl InFlight {
    pub fn new(future: impl Future<Output = ()> + 'static) -> Self {
        Self {
            future: Some(Box::pin(future)),
        }
    }

    /// Replaces any unfinished work.
    pub fn set(&mut self, future: impl Future<Output = ()> + 'static) {
        self.future = Some(Box::pin(future));
    }

    pub fn is_idle(&self) -> bool {
        self.future.is_none()
    }

    /// Polls the work once and drops it once it has finished.
    pub fn poll(&mut self) {
        let Some(future) = self.future.as_mut() else {
            return;
        };
        let mut cx = Context::from_waker(Waker::noop());
        if future.as_mut().poll(&mut cx).is_ready() {
            self.future = None;
        }
    }
}
