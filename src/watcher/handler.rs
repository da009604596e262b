//! Listener trait for delivered change notifications.

use std::path::Path;

use super::inotify::EventMask;

/// Receives one callback per decoded notification record.
///
/// The listener is invoked synchronously from the event-loop context with
/// the full path of the affected entry and the raw event mask. It sees
/// every record the engine decodes — including kinds it never asked for,
/// such as the create/delete events the engine registers for its own
/// bookkeeping — and is responsible for filtering down to the kinds it
/// cares about. A slow listener delays all subsequent records and can let
/// the kernel queue overflow.
pub trait EventListener {
    fn on_event(&mut self, path: &Path, mask: EventMask);
}

impl<F> EventListener for F
where
    F: FnMut(&Path, EventMask),
{
    fn on_event(&mut self, path: &Path, mask: EventMask) {
        self(path, mask)
    }
}
