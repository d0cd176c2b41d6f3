use crate::models::BookView;
use std::sync::Arc;

/// Identifies one reload from the moment it starts fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReloadTicket(u64);

/// Page-lifetime state shared by the library view and the registration form.
///
/// The cache is only ever replaced as a whole. Overlapping reloads are
/// sequenced: a reload that finishes after a newer one has already been
/// committed is discarded instead of overwriting fresher data.
#[derive(Debug, Default)]
pub struct AppState {
    views: Arc<Vec<BookView>>,
    issued: u64,
    committed: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.issued += 1;
        ReloadTicket(self.issued)
    }

    /// Returns false when the result was stale and dropped.
    pub fn commit(&mut self, ticket: ReloadTicket, views: Vec<BookView>) -> bool {
        if !self.is_current(ticket) {
            log::info!(
                "[state] discarding stale reload ticket={} committed={}",
                ticket.0,
                self.committed
            );
            return false;
        }
        self.committed = ticket.0;
        self.views = Arc::new(views);
        true
    }

    /// True while no newer reload has been committed.
    pub fn is_current(&self, ticket: ReloadTicket) -> bool {
        ticket.0 > self.committed
    }

    pub fn views(&self) -> Arc<Vec<BookView>> {
        Arc::clone(&self.views)
    }
}
