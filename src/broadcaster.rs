use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::pointcut::{HookFlow, HookParams, Pointcut};
use crate::Result;

/// A handler invoked at one or more pointcuts.
pub trait Hook: Send + Sync {
    /// Identifier used for logging and unregistration.
    fn id(&self) -> &str;

    /// Handles one dispatch. An error aborts the dispatch and is returned to
    /// whoever fired the pointcut.
    fn invoke(&self, params: &mut HookParams<'_>) -> Result<HookFlow>;
}

#[derive(Clone)]
struct RegisteredHook {
    hook: Arc<dyn Hook>,
    order: i32,
    sequence: u64,
}

#[derive(Clone, Default)]
struct Registry {
    hooks: HashMap<Pointcut, Arc<[RegisteredHook]>>,
    next_sequence: u64,
}

/// Registers hooks per pointcut and invokes them in order.
///
/// Hooks run in ascending `order`, registration order breaking ties.
/// Registration replaces an immutable snapshot, so dispatches already in
/// flight finish against the hook list they started with and no lock is held
/// while hooks run.
#[derive(Default)]
pub struct InterceptorBroadcaster {
    registry: RwLock<Arc<Registry>>,
}

impl InterceptorBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pointcut: Pointcut, hook: Arc<dyn Hook>, order: i32) {
        let mut guard = self.registry.write();
        let mut registry = Registry::clone(&guard);

        let sequence = registry.next_sequence;
        registry.next_sequence += 1;

        let mut hooks: Vec<RegisteredHook> = registry
            .hooks
            .get(&pointcut)
            .map(|hooks| hooks.to_vec())
            .unwrap_or_default();
        // stable: FIFO for the same order
        let position = hooks
            .iter()
            .position(|registered| registered.order > order)
            .unwrap_or_else(|| hooks.len());
        debug!(hook = hook.id(), %pointcut, order, "registering hook");
        hooks.insert(
            position,
            RegisteredHook {
                hook,
                order,
                sequence,
            },
        );
        registry.hooks.insert(pointcut, hooks.into());

        *guard = Arc::new(registry);
    }

    /// Removes every registration of the hook with `id`. Returns how many
    /// registrations were removed.
    pub fn unregister(&self, id: &str) -> usize {
        let mut guard = self.registry.write();
        let mut registry = Registry::clone(&guard);
        let mut removed = 0;

        for hooks in registry.hooks.values_mut() {
            let before = hooks.len();
            let kept: Vec<RegisteredHook> = hooks
                .iter()
                .filter(|registered| registered.hook.id() != id)
                .cloned()
                .collect();
            removed += before - kept.len();
            *hooks = kept.into();
        }
        registry.hooks.retain(|_, hooks| !hooks.is_empty());

        *guard = Arc::new(registry);
        removed
    }

    pub fn has_hooks(&self, pointcut: Pointcut) -> bool {
        self.registry.read().hooks.contains_key(&pointcut)
    }

    /// Ids of the hooks registered for `pointcut`, in invocation order.
    pub fn hook_ids(&self, pointcut: Pointcut) -> Vec<String> {
        self.snapshot(pointcut)
            .iter()
            .map(|registered| registered.hook.id().to_string())
            .collect()
    }

    /// Invokes the hooks registered for the pointcut of `params`.
    ///
    /// Returns `HookFlow::Stop` when a hook stopped a stoppable pointcut.
    pub fn dispatch(&self, params: &mut HookParams<'_>) -> Result<HookFlow> {
        let pointcut = params.pointcut();
        let hooks = self.snapshot(pointcut);

        for registered in hooks.iter() {
            trace!(
                hook = registered.hook.id(),
                %pointcut,
                order = registered.order,
                sequence = registered.sequence,
                "invoking hook"
            );
            match registered.hook.invoke(params)? {
                HookFlow::Continue => {}
                HookFlow::Stop if pointcut.is_stoppable() => {
                    debug!(hook = registered.hook.id(), %pointcut, "hook stopped dispatch");
                    return Ok(HookFlow::Stop);
                }
                HookFlow::Stop => {
                    warn!(
                        hook = registered.hook.id(),
                        %pointcut,
                        "Stop returned for a pointcut that cannot be stopped, ignoring"
                    );
                }
            }
        }

        Ok(HookFlow::Continue)
    }

    fn snapshot(&self, pointcut: Pointcut) -> Arc<[RegisteredHook]> {
        let registry = Arc::clone(&self.registry.read());
        registry
            .hooks
            .get(&pointcut)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcut::HookParams;
    use crate::{Error, OperationKind, RequestDetails};
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    /// Records its id into a shared log and returns a fixed flow.
    struct RecordingHook {
        id: String,
        log: Arc<Mutex<Vec<String>>>,
        flow: HookFlow,
        fail: bool,
    }

    impl RecordingHook {
        fn new(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                log: log.clone(),
                flow: HookFlow::Continue,
                fail: false,
            })
        }

        fn stopping(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                log: log.clone(),
                flow: HookFlow::Stop,
                fail: false,
            })
        }

        fn failing(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                log: log.clone(),
                flow: HookFlow::Continue,
                fail: true,
            })
        }
    }

    impl Hook for RecordingHook {
        fn id(&self) -> &str {
            &self.id
        }

        fn invoke(&self, _params: &mut HookParams<'_>) -> Result<HookFlow> {
            self.log.lock().push(self.id.clone());
            if self.fail {
                return Err(Error::Forbidden(format!("{} refused", self.id)));
            }
            Ok(self.flow)
        }
    }

    fn dispatch_pre_handled(broadcaster: &InterceptorBroadcaster) -> Result<HookFlow> {
        let mut request = RequestDetails::new(OperationKind::Read);
        broadcaster.dispatch(&mut HookParams::IncomingRequestPreHandled {
            request: &mut request,
        })
    }

    fn dispatch_pre_processed(broadcaster: &InterceptorBroadcaster) -> Result<HookFlow> {
        let mut request = RequestDetails::new(OperationKind::Read);
        broadcaster.dispatch(&mut HookParams::IncomingRequestPreProcessed {
            request: &mut request,
        })
    }

    #[test]
    fn dispatch_without_hooks_continues() {
        let broadcaster = InterceptorBroadcaster::new();
        assert_matches!(dispatch_pre_handled(&broadcaster), Ok(HookFlow::Continue));
        assert!(!broadcaster.has_hooks(Pointcut::ServerIncomingRequestPreHandled));
    }

    #[test]
    fn hooks_run_by_order_then_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broadcaster = InterceptorBroadcaster::new();
        let point = Pointcut::ServerIncomingRequestPreHandled;

        broadcaster.register(point, RecordingHook::new("late", &log), 10);
        broadcaster.register(point, RecordingHook::new("first-zero", &log), 0);
        broadcaster.register(point, RecordingHook::new("early", &log), -5);
        broadcaster.register(point, RecordingHook::new("second-zero", &log), 0);
        broadcaster.register(
            Pointcut::ServerOutgoingResponse,
            RecordingHook::new("elsewhere", &log),
            0,
        );

        assert_matches!(dispatch_pre_handled(&broadcaster), Ok(HookFlow::Continue));
        assert_eq!(
            vec!["early", "first-zero", "second-zero", "late"],
            *log.lock()
        );
        assert_eq!(
            vec!["early", "first-zero", "second-zero", "late"],
            broadcaster.hook_ids(point)
        );
    }

    #[test]
    fn error_ends_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broadcaster = InterceptorBroadcaster::new();
        let point = Pointcut::ServerIncomingRequestPreHandled;

        broadcaster.register(point, RecordingHook::new("a", &log), 0);
        broadcaster.register(point, RecordingHook::failing("deny", &log), 1);
        broadcaster.register(point, RecordingHook::new("never", &log), 2);

        assert_matches!(dispatch_pre_handled(&broadcaster), Err(Error::Forbidden(_)));
        assert_eq!(vec!["a", "deny"], *log.lock());
    }

    #[test]
    fn stop_honored_only_where_allowed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broadcaster = InterceptorBroadcaster::new();

        for point in &[
            Pointcut::ServerIncomingRequestPreProcessed,
            Pointcut::ServerIncomingRequestPreHandled,
        ] {
            broadcaster.register(*point, RecordingHook::stopping("stop", &log), 0);
            broadcaster.register(*point, RecordingHook::new("after", &log), 1);
        }

        assert_matches!(dispatch_pre_processed(&broadcaster), Ok(HookFlow::Stop));
        assert_eq!(vec!["stop"], *log.lock());

        log.lock().clear();
        assert_matches!(dispatch_pre_handled(&broadcaster), Ok(HookFlow::Continue));
        assert_eq!(vec!["stop", "after"], *log.lock());
    }

    #[test]
    fn unregister_removes_everywhere() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broadcaster = InterceptorBroadcaster::new();
        let hook = RecordingHook::new("auth", &log);
        broadcaster.register(Pointcut::ServerIncomingRequestPreHandled, hook.clone(), 0);
        broadcaster.register(Pointcut::ServerOutgoingResponse, hook, 0);

        assert_eq!(2, broadcaster.unregister("auth"));
        assert_eq!(0, broadcaster.unregister("auth"));
        assert!(!broadcaster.has_hooks(Pointcut::ServerOutgoingResponse));
    }

    /// Registers another hook from inside a running dispatch; the running
    /// dispatch keeps its snapshot.
    struct RegisteringHook {
        broadcaster: Arc<InterceptorBroadcaster>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Hook for RegisteringHook {
        fn id(&self) -> &str {
            "registering"
        }

        fn invoke(&self, _params: &mut HookParams<'_>) -> Result<HookFlow> {
            self.log.lock().push("registering".to_string());
            self.broadcaster.register(
                Pointcut::ServerIncomingRequestPreHandled,
                RecordingHook::new("added", &self.log),
                100,
            );
            Ok(HookFlow::Continue)
        }
    }

    #[test]
    fn registration_during_dispatch_uses_new_snapshot_next_time() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broadcaster = Arc::new(InterceptorBroadcaster::new());
        broadcaster.register(
            Pointcut::ServerIncomingRequestPreHandled,
            Arc::new(RegisteringHook {
                broadcaster: broadcaster.clone(),
                log: log.clone(),
            }),
            0,
        );

        dispatch_pre_handled(&broadcaster).unwrap();
        assert_eq!(vec!["registering"], *log.lock());

        log.lock().clear();
        dispatch_pre_handled(&broadcaster).unwrap();
        assert_eq!(vec!["registering", "added"], *log.lock());
    }
}
