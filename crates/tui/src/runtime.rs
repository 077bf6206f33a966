use std::sync::Arc;
use std::time::Duration;

use qwatch_core::auto_reload::{PollTab, ReloadTimer};
use qwatch_core::gateway::{execute, DataGateway, FetchCompletion, FetchRequest};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum RuntimeEvent {
    Fetched(FetchCompletion),
    ReloadDue(PollTab),
}

/// [`ReloadTimer`] backed by a tokio task per polling tab. Cancelling aborts
/// the task, so no further firings are sent.
#[derive(Debug, Clone)]
pub struct TokioReloadTimer {
    events: mpsc::Sender<RuntimeEvent>,
}

impl TokioReloadTimer {
    #[must_use]
    pub fn new(events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { events }
    }
}

impl ReloadTimer for TokioReloadTimer {
    type Handle = JoinHandle<()>;

    fn start(&mut self, tab: PollTab, period: Duration) -> Self::Handle {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the session already
            // issued that reload itself.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if events.send(RuntimeEvent::ReloadDue(tab)).await.is_err() {
                    debug!(?tab, "event loop gone, reload timer exits");
                    break;
                }
            }
        })
    }

    fn cancel(&mut self, handle: Self::Handle) {
        handle.abort();
    }
}

#[derive(Debug)]
pub struct FetchDispatcher<G: ?Sized> {
    gateway: Arc<G>,
    events: mpsc::Sender<RuntimeEvent>,
}

impl<G: ?Sized> Clone for FetchDispatcher<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            events: self.events.clone(),
        }
    }
}

impl<G> FetchDispatcher<G>
where
    G: DataGateway + ?Sized + 'static,
{
    #[must_use]
    pub fn new(gateway: Arc<G>, events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { gateway, events }
    }

    pub fn dispatch(&self, request: FetchRequest) {
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        tokio::spawn(async move {
            let completion = execute(gateway.as_ref(), request).await;
            if events.send(RuntimeEvent::Fetched(completion)).await.is_err() {
                debug!("event loop gone, completion dropped");
            }
        });
    }

    pub fn dispatch_all(&self, requests: impl IntoIterator<Item = FetchRequest>) {
        for request in requests {
            self.dispatch(request);
        }
    }
}
