//! External collaborator interfaces.
//!
//! The service never enumerates installed applications, stops processes, or
//! renders notifications itself; those concerns live behind these traits.
//! Every method takes the acting identity explicitly; the dispatcher passes
//! its elevated identity where the underlying lookup would otherwise expose
//! its permission requirements to the caller.

use crate::error::Result;
use crate::identity::{Uid, UserId};
use serde::{Deserialize, Serialize};

/// One installed application as reported by the application directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub package_name: String,
    pub uid: Uid,
    pub label: String,
    pub enabled: bool,
    pub persistent: bool,
}

/// Installed-application directory and process lifecycle.
pub trait AppDirectory: Send + Sync {
    /// All applications installed for `user`.
    fn installed_apps(&self, acting: Uid, user: UserId) -> Result<Vec<AppInfo>>;

    /// The uid a package runs as.
    fn package_uid(&self, acting: Uid, package: &str) -> Result<Uid>;

    /// The installed version of a package.
    fn package_version(&self, acting: Uid, package: &str) -> Result<i32>;

    /// Terminate all of a package's processes for one user.
    fn force_stop(&self, acting: Uid, package: &str, user: UserId) -> Result<()>;
}

/// Outbound notifications. Fire-and-forget; failures are the collaborator's
/// concern, not the caller's.
pub trait Notifier: Send + Sync {
    /// Broadcast that assignment data changed for (package, uid).
    fn data_changed(&self, package: &str, uid: Uid);

    /// Surface a hook exception to the user.
    fn exception_raised(&self, package: &str, uid: Uid, hook: &str, message: &str);
}
