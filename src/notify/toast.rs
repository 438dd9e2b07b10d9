//! Toast stack: the in-process display surface for notifications.
//!
//! Mounting subscribes to the channel and spawns a pump task. Each event
//! joins the visible stack (most recent last) and is retired on its own
//! timer after the display duration, or earlier via [`ToastStack::dismiss`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};

use super::{NotificationChannel, NotificationEvent, Subscription};

type Visible = Arc<Mutex<Vec<NotificationEvent>>>;

/// Called once per event as it becomes visible.
pub type Renderer = Box<dyn Fn(&NotificationEvent) + Send + Sync>;

pub struct ToastStack {
    visible: Visible,
    pump: JoinHandle<()>,
    channel: NotificationChannel,
    subscriber_id: u64,
}

impl ToastStack {
    /// Mount onto `channel`. Must be called inside a tokio runtime.
    pub fn mount(channel: &NotificationChannel, duration: Duration) -> Self {
        Self::mount_with_renderer(channel, duration, None)
    }

    pub fn mount_with_renderer(
        channel: &NotificationChannel,
        duration: Duration,
        renderer: Option<Renderer>,
    ) -> Self {
        let subscription = channel.subscribe();
        let subscriber_id = subscription.id();
        let visible: Visible = Arc::new(Mutex::new(Vec::new()));
        let pump = tokio::spawn(run_pump(
            subscription,
            Arc::clone(&visible),
            duration,
            renderer,
        ));
        log::debug!("Toast stack mounted (subscriber {})", subscriber_id);
        Self {
            visible,
            pump,
            channel: channel.clone(),
            subscriber_id,
        }
    }

    /// Snapshot of the visible stack, oldest first.
    pub fn visible(&self) -> Vec<NotificationEvent> {
        lock(&self.visible).clone()
    }

    /// Remove an event before its timer fires. Returns whether it was visible.
    pub fn dismiss(&self, id: u64) -> bool {
        retire(&self.visible, id)
    }
}

impl Drop for ToastStack {
    fn drop(&mut self) {
        self.channel.inner.unregister(self.subscriber_id);
        self.pump.abort();
        log::debug!("Toast stack unmounted (subscriber {})", self.subscriber_id);
    }
}

async fn run_pump(
    mut subscription: Subscription,
    visible: Visible,
    duration: Duration,
    renderer: Option<Renderer>,
) {
    let mut timers = JoinSet::new();
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                if let Some(render) = &renderer {
                    render(&event);
                }
                let id = event.id;
                lock(&visible).push(event);

                let visible = Arc::clone(&visible);
                timers.spawn(async move {
                    tokio::time::sleep(duration).await;
                    retire(&visible, id);
                });
            }
            Some(_) = timers.join_next(), if !timers.is_empty() => {}
        }
    }

    // Replaced by a newer surface: stop taking events, but still retire the
    // ones already on screen.
    while timers.join_next().await.is_some() {}
}

fn retire(visible: &Visible, id: u64) -> bool {
    let mut events = lock(visible);
    let before = events.len();
    events.retain(|e| e.id != id);
    events.len() != before
}

fn lock(visible: &Visible) -> MutexGuard<'_, Vec<NotificationEvent>> {
    visible.lock().unwrap_or_else(PoisonError::into_inner)
}
