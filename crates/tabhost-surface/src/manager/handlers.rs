use std::sync::Arc;

use tabhost_common::{Event, TabId};
use tracing::debug;

use crate::events::{HostSignal, SignalSink};
use crate::host::HostSurfaceId;

use super::{Inner, ViewLifecycleManager};

impl ViewLifecycleManager {
    /// Build the sink handed to the host for `surface`. Holds the manager
    /// weakly so a host outliving the manager cannot keep it alive.
    pub(super) fn sink_for(&self, surface: HostSurfaceId) -> SignalSink {
        let inner = Arc::downgrade(&self.inner);
        SignalSink::new(surface, move |id, signal| {
            if let Some(inner) = inner.upgrade() {
                inner.on_host_signal(id, signal);
            }
        })
    }
}

impl Inner {
    pub(super) fn on_host_signal(&self, surface: HostSurfaceId, signal: HostSignal) {
        let event = {
            let mut reg = self.lock();
            let Some(tab_id) = reg.tab_for(surface).cloned() else {
                debug!(%surface, ?signal, "dropping signal from released surface");
                return;
            };
            if let Some(slot) = reg.get_mut(&tab_id) {
                match &signal {
                    HostSignal::LoadStarted { url }
                    | HostSignal::LoadFinished { url, .. }
                    | HostSignal::UrlChanged { url } => slot.url.clone_from(url),
                    _ => {}
                }
            }
            translate(tab_id, signal)
        };
        self.bus.publish(event);
    }
}

fn translate(tab_id: TabId, signal: HostSignal) -> Event {
    match signal {
        HostSignal::LoadStarted { url } => Event::LoadStarted { tab_id, url },
        HostSignal::LoadFinished { url, title } => Event::LoadFinished { tab_id, url, title },
        HostSignal::UrlChanged { url } => Event::UrlChanged { tab_id, url },
        HostSignal::TitleChanged { title } => Event::TitleChanged { tab_id, title },
        HostSignal::FaviconChanged { favicon_url } => Event::FaviconChanged {
            tab_id,
            favicon_url,
        },
        HostSignal::NavigationFlags {
            can_go_back,
            can_go_forward,
        } => Event::NavigationFlagsChanged {
            tab_id,
            can_go_back,
            can_go_forward,
        },
    }
}
