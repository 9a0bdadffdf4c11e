//! Background liveness capability.
//!
//! The host platform decides how to keep the process scheduled while the
//! pipeline runs (wake lock, foreground notification, nothing at all). The
//! pipeline only asks for it: acquire at start, release at stop.

/// "Keep this background worker alive" token.
///
/// Both calls must be idempotent: acquiring twice holds once, releasing
/// something not held is a no-op.
pub trait KeepAlive: Send {
    fn acquire(&mut self);
    fn release(&mut self);
    fn is_held(&self) -> bool;
}

impl<T: KeepAlive + ?Sized> KeepAlive for Box<T> {
    fn acquire(&mut self) {
        (**self).acquire()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_held(&self) -> bool {
        (**self).is_held()
    }
}

/// For hosts where nothing needs to be held.
#[derive(Debug, Default)]
pub struct NoopKeepAlive {
    held: bool,
}

impl KeepAlive for NoopKeepAlive {
    fn acquire(&mut self) {
        self.held = true;
    }

    fn release(&mut self) {
        self.held = false;
    }

    fn is_held(&self) -> bool {
        self.held
    }
}
