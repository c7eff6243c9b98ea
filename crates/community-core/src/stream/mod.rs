// ── Reactive entry streams ──
//
// Consumer side of a cache slot's watch channel.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::CacheEntry;

/// A subscription to one cache entry.
///
/// Provides point-in-time access and change notification via `changed()`
/// or by converting to a `Stream`. Ends when the entry is evicted.
pub struct EntryStream {
    current: CacheEntry,
    receiver: watch::Receiver<CacheEntry>,
}

impl EntryStream {
    pub(crate) fn new(receiver: watch::Receiver<CacheEntry>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The entry as of creation or the last `changed()`.
    pub fn current(&self) -> &CacheEntry {
        &self.current
    }

    /// The entry right now (may have changed since creation).
    pub fn latest(&self) -> CacheEntry {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the entry is evicted.
    pub async fn changed(&mut self) -> Option<CacheEntry> {
        self.receiver.changed().await.ok()?;
        let entry = self.receiver.borrow_and_update().clone();
        self.current = entry.clone();
        Some(entry)
    }

    /// Convert into a `Stream`. Yields the current entry first.
    pub fn into_stream(self) -> EntryWatchStream {
        EntryWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct EntryWatchStream {
    inner: WatchStream<CacheEntry>,
}

impl Stream for EntryWatchStream {
    type Item = CacheEntry;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
