//! Calling-identity arithmetic and scoped identity elevation.
//!
//! A uid encodes both a user-space block and an application id within that
//! block: `uid = user * PER_USER_RANGE + app_id`. Per-user queries filter on
//! the inclusive range `[user_uid(user, 0), user_uid(user,
//! LAST_APPLICATION_ID)]`; this range check is the sole mechanism for
//! scoping assignments to a user.

use std::cell::Cell;

/// Numeric caller identity as furnished by the transport.
pub type Uid = u32;

/// User-space index (the block a uid falls in).
pub type UserId = u32;

/// App id of the privileged system identity.
pub const SYSTEM_UID: Uid = 1000;

/// Highest application id within a user block.
pub const LAST_APPLICATION_ID: Uid = 99_999;

/// Size of one user block.
pub const PER_USER_RANGE: Uid = LAST_APPLICATION_ID + 1;

/// User-space index of a uid.
pub fn user_id(uid: Uid) -> UserId {
    uid / PER_USER_RANGE
}

/// Application id of a uid within its user block.
pub fn app_id(uid: Uid) -> Uid {
    uid % PER_USER_RANGE
}

/// Compose a uid from a user index and an application id.
pub fn user_uid(user: UserId, app: Uid) -> Uid {
    user * PER_USER_RANGE + app
}

/// Per-call identity context.
///
/// `caller` is the transport-verified identity and never changes. The
/// effective identity is what collaborator calls observe; it can be
/// temporarily elevated to [`SYSTEM_UID`] through [`CallContext::elevate`].
/// Contexts live on the dispatching thread for the duration of one call and
/// are never shared.
pub struct CallContext {
    caller: Uid,
    effective: Cell<Uid>,
}

impl CallContext {
    pub fn new(caller: Uid) -> Self {
        Self {
            caller,
            effective: Cell::new(caller),
        }
    }

    /// The transport-verified calling identity.
    pub fn caller(&self) -> Uid {
        self.caller
    }

    /// The identity collaborator calls currently observe.
    pub fn effective(&self) -> Uid {
        self.effective.get()
    }

    /// Temporarily assume the system identity.
    ///
    /// The previous effective identity is restored when the returned guard
    /// drops, on every exit path, including `?` returns and panics.
    pub fn elevate(&self) -> IdentityGuard<'_> {
        let prev = self.effective.replace(SYSTEM_UID);
        IdentityGuard { ctx: self, prev }
    }
}

/// Restores the prior effective identity on drop.
pub struct IdentityGuard<'a> {
    ctx: &'a CallContext,
    prev: Uid,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        self.ctx.effective.set(self.prev);
    }
}
