//! Media binding: the state rendering code observes for one media slot.
//!
//! A binding holds the current (reference, options) identity and publishes a
//! [`MediaView`] whenever it changes. Resolution results that arrive after the
//! identity moved on are discarded.
//!
//! Two variants exist because device stores differ in capability.
//! [`SyncMediaBinding`] probes a synchronous device store before deciding to
//! show a loading state. [`AsyncMediaBinding`] only probes process memory and
//! reads the device store as the first step of the background resolution, so a
//! warm device cache still shows a brief pending state.

mod view;

pub use view::MediaView;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::trace;

use crate::application::services::{MediaResolver, ResolvedMedia};
use crate::domain::entities::{MediaReference, NormalizedTransform, TransformOptions};
use crate::domain::errors::MediaResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeMode {
    MemoryAndDevice,
    MemoryOnly,
}

type Identity = (MediaReference, NormalizedTransform);

#[derive(Default)]
struct Current {
    identity: Option<Identity>,
    generation: u64,
}

struct BindingCore {
    resolver: MediaResolver,
    runtime: Handle,
    fallback: String,
    mode: ProbeMode,
    current: Mutex<Current>,
    state: watch::Sender<MediaView>,
}

impl BindingCore {
    fn new(resolver: MediaResolver, runtime: Handle, fallback: String, mode: ProbeMode) -> Arc<Self> {
        let (state, _) = watch::channel(MediaView::empty(&fallback));
        Arc::new(Self {
            resolver,
            runtime,
            fallback,
            mode,
            current: Mutex::new(Current::default()),
            state,
        })
    }

    fn bind(self: &Arc<Self>, reference: MediaReference, options: TransformOptions) {
        let identity = (reference.clone(), options.normalized());
        let mut current = self.current.lock();
        if current.identity.as_ref() == Some(&identity) {
            return;
        }
        current.identity = Some(identity);
        current.generation += 1;
        let generation = current.generation;

        if reference.is_empty() {
            self.state.send_replace(MediaView::empty(&self.fallback));
            return;
        }

        let hit = match self.mode {
            ProbeMode::MemoryAndDevice => self.resolver.probe(&reference, &options),
            ProbeMode::MemoryOnly => self.resolver.peek(&reference, &options),
        };
        if let Some(url) = hit {
            trace!(generation, "Binding resolved without loading");
            self.state.send_replace(MediaView::resolved(url));
            return;
        }

        self.state.send_replace(MediaView::pending(&self.fallback));
        drop(current);

        let core = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = core.resolver.try_resolve(&reference, &options).await;
            core.settle(generation, result);
        });
    }

    fn settle(&self, generation: u64, result: MediaResult<ResolvedMedia>) {
        let current = self.current.lock();
        if current.generation != generation {
            trace!(
                generation,
                current = current.generation,
                "Discarding resolution for stale identity"
            );
            return;
        }

        let view = match result {
            Ok(resolved) => MediaView::resolved(resolved.url),
            Err(e) => MediaView::failed(&self.fallback, e),
        };
        self.state.send_replace(view);
    }

    fn detach(&self) {
        let mut current = self.current.lock();
        current.identity = None;
        current.generation += 1;
    }
}

macro_rules! media_binding {
    ($(#[$meta:meta])* $name:ident, $mode:expr) => {
        $(#[$meta])*
        pub struct $name {
            core: Arc<BindingCore>,
        }

        impl $name {
            /// Creates a binding showing `fallback` until a URL is resolved.
            /// Background resolutions are spawned on `runtime`.
            #[must_use]
            pub fn new(resolver: MediaResolver, runtime: Handle, fallback: impl Into<String>) -> Self {
                Self {
                    core: BindingCore::new(resolver, runtime, fallback.into(), $mode),
                }
            }

            /// Points the binding at a reference. Equivalent identities are a no-op.
            pub fn bind(&self, reference: impl Into<MediaReference>, options: TransformOptions) {
                self.core.bind(reference.into(), options);
            }

            /// Current view.
            #[must_use]
            pub fn view(&self) -> MediaView {
                self.core.state.borrow().clone()
            }

            /// Receives every published view.
            #[must_use]
            pub fn subscribe(&self) -> watch::Receiver<MediaView> {
                self.core.state.subscribe()
            }

            /// Fallback URL shown when nothing is resolved.
            #[must_use]
            pub fn fallback(&self) -> &str {
                &self.core.fallback
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.core.detach();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("view", &self.view())
                    .finish_non_exhaustive()
            }
        }
    };
}

media_binding!(
    /// Binding for deployments whose device store answers without suspension.
    ///
    /// Already-cached media never passes through the pending state.
    SyncMediaBinding,
    ProbeMode::MemoryAndDevice
);

media_binding!(
    /// Binding for deployments whose device store must be awaited.
    AsyncMediaBinding,
    ProbeMode::MemoryOnly
);
