//! Call dispatcher: the single synchronous entry point.
//!
//! The transport hands every request over as an operation name, a flat JSON
//! argument payload, and the verified calling identity. The dispatcher
//! routes to a handler, enforcing owner privilege where the operation
//! requires it. Unknown operation names yield an empty result rather than an
//! error; that permissive default is part of the contract.

use crate::config::ServiceConfig;
use crate::directory::{AppDirectory, Notifier};
use crate::error::{Error, Result};
use crate::identity::{self, CallContext, Uid, SYSTEM_UID};
use crate::model::{App, Assignment, Hook};
use crate::policy::IoGrant;
use crate::registry::HookRegistry;
use crate::settings::Settings;
use crate::store::{ReportUpdate, Store};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Operation names recognized by [`Service::call`].
pub mod ops {
    pub const GET_VERSION: &str = "getVersion";
    pub const PUT_HOOKS: &str = "putHooks";
    pub const GET_HOOKS: &str = "getHooks";
    pub const GET_APPS: &str = "getApps";
    pub const ASSIGN_HOOKS: &str = "assignHooks";
    pub const GET_ASSIGNED_HOOKS: &str = "getAssignedHooks";
    pub const REPORT: &str = "report";
    pub const GET_SETTING: &str = "getSetting";
    pub const PUT_SETTING: &str = "putSetting";
    pub const CLEAR_DATA: &str = "clearData";
}

/// The privileged store service.
///
/// Owns the hook registry and the persistent store exclusively; callers only
/// ever see call results. `Send + Sync`: the transport may invoke
/// [`Service::call`] from arbitrarily many threads concurrently.
pub struct Service {
    config: ServiceConfig,
    version: i32,
    registry: HookRegistry,
    store: Store,
    directory: Arc<dyn AppDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl Service {
    /// Construct the service: resolve the host package version, load the
    /// hook registry from the bundled definitions file, and open the store.
    ///
    /// This is the one-time initialization step; it runs before the service
    /// is shared, so no lazy setup or initialization lock is needed at call
    /// time.
    pub fn bootstrap(
        config: ServiceConfig,
        directory: Arc<dyn AppDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let _grant = IoGrant::acquire();

        let ctx = CallContext::new(SYSTEM_UID);
        let version = {
            let _sys = ctx.elevate();
            directory.package_version(ctx.effective(), &config.package_name)?
        };
        info!("Loaded module version {version}");

        let registry = HookRegistry::load(&config.definitions_path)?;
        let store = Store::open(&config.data_dir)?;

        Ok(Self {
            config,
            version,
            registry,
            store,
            directory,
            notifier,
        })
    }

    /// The cached host package version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Typed convenience accessor for boolean settings.
    pub fn settings(&self) -> Settings<'_> {
        Settings::new(self)
    }

    /// Dispatch one operation.
    ///
    /// `caller` is the transport-verified calling identity; `args` is the
    /// flat argument payload. Returns the flat result payload, or an error
    /// that rejects the whole call with no partial effects.
    pub fn call(&self, caller: Uid, op: &str, args: Value) -> Result<Value> {
        info!("Call {op} cuid={caller}");
        let _grant = IoGrant::acquire();
        let ctx = CallContext::new(caller);

        match op {
            ops::GET_VERSION => Ok(json!({ "version": self.version })),
            ops::PUT_HOOKS => self.put_hooks(&ctx, args),
            ops::GET_HOOKS => Ok(json!({ "hooks": self.registry.all()? })),
            ops::GET_APPS => self.get_apps(&ctx),
            ops::ASSIGN_HOOKS => self.assign_hooks(&ctx, args),
            ops::GET_ASSIGNED_HOOKS => self.get_assigned_hooks(args),
            ops::REPORT => self.report(&ctx, args),
            ops::GET_SETTING => self.get_setting(args),
            ops::PUT_SETTING => self.put_setting(&ctx, args),
            ops::CLEAR_DATA => self.clear_data(&ctx, args),
            _ => {
                debug!("Unknown operation {op}");
                Ok(json!({}))
            }
        }
    }

    /// Owner gate: the caller's app id must be the system identity or the
    /// app id of the service's own package. The package uid lookup runs
    /// elevated so its permission requirements are not exposed to the
    /// caller; any failure there is itself a permission failure.
    fn enforce_owner(&self, ctx: &CallContext) -> Result<()> {
        let caller_app = identity::app_id(ctx.caller());
        if caller_app == SYSTEM_UID {
            return Ok(());
        }

        let own_uid = {
            let _sys = ctx.elevate();
            self.directory
                .package_uid(ctx.effective(), &self.config.package_name)
                .map_err(|e| Error::permission(format!("Error determining package uid: {e}")))?
        };

        if caller_app == identity::app_id(own_uid) {
            Ok(())
        } else {
            Err(Error::permission(format!(
                "Calling uid {caller_app} <> package uid {}",
                identity::app_id(own_uid)
            )))
        }
    }

    fn put_hooks(&self, ctx: &CallContext, args: Value) -> Result<Value> {
        self.enforce_owner(ctx)?;

        let args: PutHooksArgs = parse_args(ops::PUT_HOOKS, args)?;
        self.registry.replace_all(args.hooks)?;

        Ok(json!({}))
    }

    fn get_apps(&self, ctx: &CallContext) -> Result<Value> {
        let user = identity::user_id(ctx.caller());

        let installed = {
            let _sys = ctx.elevate();
            self.directory.installed_apps(ctx.effective(), user)?
        };
        info!("Installed apps={} cuid={}", installed.len(), ctx.caller());

        let mut apps: HashMap<(String, Uid), App> = installed
            .into_iter()
            .map(|info| {
                (
                    (info.package_name.clone(), info.uid),
                    App {
                        package_name: info.package_name,
                        uid: info.uid,
                        label: info.label,
                        enabled: info.enabled,
                        persistent: info.persistent,
                        assignments: Vec::new(),
                    },
                )
            })
            .collect();

        let start = identity::user_uid(user, 0);
        let end = identity::user_uid(user, identity::LAST_APPLICATION_ID);
        for row in self.store.assignments_in_range(start, end)? {
            let Some(app) = apps.get_mut(&(row.package.clone(), row.uid)) else {
                debug!("Package {}:{} not found", row.package, row.uid);
                continue;
            };
            match self.registry.get(&row.hook)? {
                Some(hook) => {
                    let mut assignment = Assignment::new(hook);
                    assignment.installed = row.installed;
                    assignment.used = row.used;
                    assignment.restricted = row.restricted;
                    assignment.exception = row.exception;
                    app.assignments.push(assignment);
                }
                None => warn!("Hook {} not found", row.hook),
            }
        }

        let mut apps: Vec<App> = apps.into_values().collect();
        apps.sort_by(|a, b| (&a.package_name, a.uid).cmp(&(&b.package_name, b.uid)));

        Ok(json!({ "apps": apps }))
    }

    fn assign_hooks(&self, ctx: &CallContext, args: Value) -> Result<Value> {
        self.enforce_owner(ctx)?;

        let args: AssignHooksArgs = parse_args(ops::ASSIGN_HOOKS, args)?;
        self.store
            .assign(&args.hooks, &args.package_name, args.uid, args.delete)?;

        if args.kill {
            let _sys = ctx.elevate();
            self.directory.force_stop(
                ctx.effective(),
                &args.package_name,
                identity::user_id(args.uid),
            )?;
        }

        Ok(json!({}))
    }

    fn get_assigned_hooks(&self, args: Value) -> Result<Value> {
        let args: QueryAssignedArgs = parse_args(ops::GET_ASSIGNED_HOOKS, args)?;

        let mut assigned = Vec::new();
        for hook_id in self.store.assigned_hook_ids(&args.package_name, args.uid)? {
            let Some(mut hook) = self.registry.get(&hook_id)? else {
                warn!("Hook {hook_id} not found");
                continue;
            };
            if hook.target == Hook::DYNAMIC_TARGET {
                if let Some(class) = &self.config.dynamic_target_class {
                    self.registry.rewrite_target(&hook_id, class)?;
                    hook.target = class.clone();
                    info!("{hook_id} class name={class}");
                }
            }
            assigned.push(hook);
        }

        Ok(json!({ "hooks": assigned }))
    }

    fn report(&self, ctx: &CallContext, args: Value) -> Result<Value> {
        let args: ReportArgs = parse_args(ops::REPORT, args)?;

        // Self-report only: one identity cannot report on another's behalf.
        if args.uid != ctx.caller() {
            return Err(Error::permission(format!(
                "Report uid {} <> calling uid {}",
                args.uid,
                ctx.caller()
            )));
        }

        info!(
            "Hook {} pkg={}:{} event={}",
            args.hook, args.package_name, args.uid, args.event
        );

        let now = Utc::now().timestamp_millis();
        let mut update = ReportUpdate::default();
        match args.event.as_str() {
            "install" => update.installed = Some(now),
            "use" => {
                update.used = Some(now);
                if let Some(restricted) = args.data.get("restricted") {
                    update.restricted = Some(truthy(restricted));
                }
            }
            other => {
                return Err(Error::Validation {
                    field: "event".to_string(),
                    message: format!("expected install or use, got {other}"),
                })
            }
        }
        let exception = args.data.get("exception").and_then(Value::as_str);
        if let Some(exception) = exception {
            update.exception = Some(exception.to_string());
        }

        let rows = self
            .store
            .record_report(&args.package_name, args.uid, &args.hook, &update)?;
        if rows == 0 {
            info!(
                "{}:{}/{} not updated",
                args.package_name, args.uid, args.hook
            );
        }

        {
            let _sys = ctx.elevate();
            self.notifier.data_changed(&args.package_name, args.uid);
            if let Some(exception) = exception {
                self.notifier
                    .exception_raised(&args.package_name, args.uid, &args.hook, exception);
            }
        }

        Ok(json!({}))
    }

    fn get_setting(&self, args: Value) -> Result<Value> {
        let args: SettingKeyArgs = parse_args(ops::GET_SETTING, args)?;
        let value = self.store.get_setting(args.user, &args.category, &args.name)?;
        debug!(
            "Get setting {}:{}:{}={:?}",
            args.user, args.category, args.name, value
        );
        Ok(json!({ "value": value }))
    }

    fn put_setting(&self, ctx: &CallContext, args: Value) -> Result<Value> {
        self.enforce_owner(ctx)?;

        let args: PutSettingArgs = parse_args(ops::PUT_SETTING, args)?;
        info!(
            "Put setting {}:{}:{}={:?}",
            args.user, args.category, args.name, args.value
        );
        self.store
            .put_setting(args.user, &args.category, &args.name, args.value.as_deref())?;

        Ok(json!({}))
    }

    fn clear_data(&self, ctx: &CallContext, args: Value) -> Result<Value> {
        self.enforce_owner(ctx)?;

        let args: ClearDataArgs = parse_args(ops::CLEAR_DATA, args)?;
        info!("Clearing data user={}", args.user);
        self.store.clear(args.user)?;

        Ok(json!({}))
    }
}

fn parse_args<T: DeserializeOwned>(op: &str, args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| Error::Validation {
        field: op.to_string(),
        message: format!("invalid arguments: {e}"),
    })
}

/// The restricted flag arrives as a JSON bool or integer; any nonzero
/// integer counts as true.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

#[derive(Deserialize)]
struct PutHooksArgs {
    hooks: Vec<Hook>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignHooksArgs {
    hooks: Vec<String>,
    package_name: String,
    uid: Uid,
    #[serde(default)]
    delete: bool,
    #[serde(default)]
    kill: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryAssignedArgs {
    package_name: String,
    uid: Uid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportArgs {
    hook: String,
    package_name: String,
    uid: Uid,
    event: String,
    #[serde(default)]
    data: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct SettingKeyArgs {
    user: identity::UserId,
    category: String,
    name: String,
}

#[derive(Deserialize)]
struct PutSettingArgs {
    user: identity::UserId,
    category: String,
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClearDataArgs {
    user: identity::UserId,
}
