use crate::db::{LocalStore, BOOK_ADDED_KEY};
use crate::error::Result;
use crate::models::BookAddedMarker;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_FRESHNESS_MS: i64 = 5_000;

/// Best-effort, at-least-once "a book was just added" signal between screens.
/// Markers older than the freshness window are dropped silently.
pub trait BookAddedNotifier {
    fn publish(&self, marker: &BookAddedMarker) -> Result<()>;

    /// Consumes pending markers and returns one only if it is still fresh.
    fn take_fresh(&self, now_ms: i64) -> Result<Option<BookAddedMarker>>;
}

/// Marker left in shared local storage and picked up by polling.
pub struct StorageNotifier {
    store: Rc<LocalStore>,
    freshness_ms: i64,
}

impl StorageNotifier {
    pub fn new(store: Rc<LocalStore>, freshness_ms: i64) -> Self {
        StorageNotifier { store, freshness_ms }
    }
}

impl BookAddedNotifier for StorageNotifier {
    fn publish(&self, marker: &BookAddedMarker) -> Result<()> {
        self.store.set_json(BOOK_ADDED_KEY, marker)
    }

    fn take_fresh(&self, now_ms: i64) -> Result<Option<BookAddedMarker>> {
        let Some(raw) = self.store.get_raw(BOOK_ADDED_KEY)? else {
            return Ok(None);
        };
        // Cleared regardless of age so a stale marker never re-triggers.
        self.store.remove(BOOK_ADDED_KEY)?;

        let marker: BookAddedMarker = match serde_json::from_str(&raw) {
            Ok(marker) => marker,
            Err(err) => {
                log::warn!("[sync] dropping unreadable marker error={}", err);
                return Ok(None);
            }
        };
        Ok(keep_if_fresh(marker, now_ms, self.freshness_ms))
    }
}

/// In-process channel for screens living in the same process.
pub struct ChannelNotifier {
    tx: Sender<BookAddedMarker>,
    rx: Receiver<BookAddedMarker>,
    freshness_ms: i64,
}

impl ChannelNotifier {
    pub fn new(freshness_ms: i64) -> Self {
        let (tx, rx) = mpsc::channel();
        ChannelNotifier { tx, rx, freshness_ms }
    }

    pub fn sender(&self) -> Sender<BookAddedMarker> {
        self.tx.clone()
    }
}

impl BookAddedNotifier for ChannelNotifier {
    fn publish(&self, marker: &BookAddedMarker) -> Result<()> {
        // The receiver lives in self, so the channel cannot be disconnected.
        let _ = self.tx.send(marker.clone());
        Ok(())
    }

    fn take_fresh(&self, now_ms: i64) -> Result<Option<BookAddedMarker>> {
        let mut freshest: Option<BookAddedMarker> = None;
        loop {
            match self.rx.try_recv() {
                Ok(marker) => {
                    if let Some(marker) = keep_if_fresh(marker, now_ms, self.freshness_ms) {
                        if freshest
                            .as_ref()
                            .map(|current| marker.timestamp >= current.timestamp)
                            .unwrap_or(true)
                        {
                            freshest = Some(marker);
                        }
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(freshest)
    }
}

fn keep_if_fresh(marker: BookAddedMarker, now_ms: i64, freshness_ms: i64) -> Option<BookAddedMarker> {
    if marker.is_fresh(now_ms, freshness_ms) {
        log::info!(
            "[sync] book added elsewhere id={} titulo=\"{}\"",
            marker.id,
            marker.titulo
        );
        Some(marker)
    } else {
        log::debug!(
            "[sync] dropping stale marker id={} age_ms={}",
            marker.id,
            marker.age_ms(now_ms)
        );
        None
    }
}
