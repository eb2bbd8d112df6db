//! Thread I/O policy normalization.
//!
//! Transport threads may arrive with blocking disk access disallowed. The
//! dispatcher grants it for the duration of one call and restores whatever
//! policy the thread carried before, on every exit path.

use std::cell::Cell;

thread_local! {
    static BLOCKING_IO: Cell<bool> = const { Cell::new(true) };
}

/// Whether the current thread may perform blocking store I/O.
pub fn blocking_allowed() -> bool {
    BLOCKING_IO.with(|flag| flag.get())
}

/// Set the current thread's I/O policy. Transports that forbid blocking I/O
/// on their dispatch threads call this before handing calls over.
pub fn set_blocking_allowed(allowed: bool) {
    BLOCKING_IO.with(|flag| flag.set(allowed));
}

/// Scoped grant of blocking I/O; restores the prior policy on drop.
pub struct IoGrant {
    prev: bool,
}

impl IoGrant {
    pub fn acquire() -> Self {
        let prev = BLOCKING_IO.with(|flag| flag.replace(true));
        IoGrant { prev }
    }
}

impl Drop for IoGrant {
    fn drop(&mut self) {
        BLOCKING_IO.with(|flag| flag.set(self.prev));
    }
}
