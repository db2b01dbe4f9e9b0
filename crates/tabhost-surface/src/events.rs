//! Signals a host reports about one of its surfaces.

use std::fmt;
use std::sync::Arc;

use crate::host::HostSurfaceId;

/// Activity reported by the host for a single surface.
#[derive(Debug, Clone, PartialEq)]
pub enum HostSignal {
    LoadStarted { url: String },
    LoadFinished { url: String, title: String },
    UrlChanged { url: String },
    TitleChanged { title: String },
    FaviconChanged { favicon_url: Option<String> },
    NavigationFlags { can_go_back: bool, can_go_forward: bool },
}

type SinkFn = Arc<dyn Fn(HostSurfaceId, HostSignal) + Send + Sync>;

/// Per-surface channel back into the lifecycle manager, handed to the host
/// when the surface is created. Signals emitted after the surface has been
/// replaced or released are dropped by the receiver.
#[derive(Clone)]
pub struct SignalSink {
    surface: HostSurfaceId,
    deliver: SinkFn,
}

impl SignalSink {
    pub fn new<F>(surface: HostSurfaceId, deliver: F) -> Self
    where
        F: Fn(HostSurfaceId, HostSignal) + Send + Sync + 'static,
    {
        Self {
            surface,
            deliver: Arc::new(deliver),
        }
    }

    /// A sink that discards everything.
    pub fn noop(surface: HostSurfaceId) -> Self {
        Self::new(surface, |_, _| {})
    }

    pub fn surface(&self) -> HostSurfaceId {
        self.surface
    }

    pub fn emit(&self, signal: HostSignal) {
        (self.deliver)(self.surface, signal);
    }
}

impl fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink")
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sink_tags_signals_with_its_surface() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sink = SignalSink::new(HostSurfaceId(7), move |id, sig| {
            s.lock().unwrap().push((id, sig));
        });

        sink.emit(HostSignal::TitleChanged {
            title: "Docs".into(),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, HostSurfaceId(7));
        assert_eq!(
            seen[0].1,
            HostSignal::TitleChanged {
                title: "Docs".into()
            }
        );
    }

    #[test]
    fn noop_sink_accepts_signals() {
        let sink = SignalSink::noop(HostSurfaceId(1));
        sink.emit(HostSignal::UrlChanged {
            url: "about:blank".into(),
        });
        assert_eq!(sink.surface(), HostSurfaceId(1));
    }
}
