//! Releasable subscriptions over asynchronous chain feeds

use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A live feed plus the hook that tears it down on the remote side.
///
/// The hook runs exactly once: on `release`, or on drop if the subscription
/// was never released explicitly.
pub struct Subscription<T> {
    stream: BoxStream<'static, T>,
    on_release: Option<ReleaseHook>,
}

impl<T> Subscription<T> {
    pub fn new(stream: impl Stream<Item = T> + Send + 'static) -> Self {
        Self {
            stream: stream.boxed(),
            on_release: None,
        }
    }

    /// Attach the unsubscribe hook
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub async fn next(&mut self) -> Option<T> {
        self.stream.next().await
    }

    pub fn is_released(&self) -> bool {
        self.on_release.is_none()
    }

    /// Stop listening and run the unsubscribe hook
    pub fn release(mut self) {
        self.run_release_hook();
    }

    fn run_release_hook(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.run_release_hook();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts how often a subscription's release hook ran
    #[derive(Clone, Default)]
    pub struct ReleaseCounter(Arc<AtomicUsize>);

    impl ReleaseCounter {
        pub fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }

        /// Subscription over a fixed list of items, wired to this counter
        pub fn subscription<T: Send + 'static>(&self, items: Vec<T>) -> Subscription<T> {
            self.attach(Subscription::new(futures::stream::iter(items)))
        }

        /// Like `subscription`, but the feed stays open after the last item
        pub fn open_subscription<T: Send + 'static>(&self, items: Vec<T>) -> Subscription<T> {
            let stream = futures::stream::iter(items).chain(futures::stream::pending());
            self.attach(Subscription::new(stream))
        }

        fn attach<T>(&self, subscription: Subscription<T>) -> Subscription<T> {
            let counter = self.0.clone();
            subscription.with_release_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        }
    }
}
