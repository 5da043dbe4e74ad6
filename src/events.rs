//! Where change events go: a closure, a channel, or nowhere.

use crossbeam_channel::Sender;

use crate::CatalogChangeEvent;

/// Receives every event of a run, in order, on the syncing thread.
pub trait EventSink {
    fn emit(&mut self, event: &CatalogChangeEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&CatalogChangeEvent),
{
    fn emit(&mut self, event: &CatalogChangeEvent) {
        self(event)
    }
}

/// Discards events.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&mut self, _event: &CatalogChangeEvent) {}
}

/// Forwards clones to another thread. A dropped receiver is ignored.
pub struct ChannelSink(pub Sender<CatalogChangeEvent>);

impl EventSink for ChannelSink {
    fn emit(&mut self, event: &CatalogChangeEvent) {
        let _ = self.0.send(event.clone());
    }
}
