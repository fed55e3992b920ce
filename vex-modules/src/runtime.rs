//! The well-known module roots (`Core`, `Base`, `Main`) and the options
//! that gate name-resolution behavior across all of them.

use crate::binding::Binding;
use crate::diagnostics::{StderrSink, WarningSink};
use crate::module::Module;
use crate::symbol::Symbol;
use crate::value::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide `depwarn` setting: whether using a `Renamed` binding warns,
/// errors, or is silent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepWarnMode {
    Off,
    Warn,
    Error,
}

impl From<DepWarnMode> for crate::deprecation::DepWarn {
    fn from(m: DepWarnMode) -> Self {
        match m {
            DepWarnMode::Off => crate::deprecation::DepWarn::Off,
            DepWarnMode::Warn => crate::deprecation::DepWarn::Warn,
            DepWarnMode::Error => crate::deprecation::DepWarn::Error,
        }
    }
}

/// Options threaded explicitly through every call rather than read off an
/// ambient global, per the crate's "no hidden statics" design choice.
#[derive(Clone, Debug)]
pub struct RuntimeOptions {
    pub depwarn: DepWarnMode,
    /// Disables the free-standing `next_build_id` fallback clock; set while
    /// loading a precompiled image so build ids come from the image instead.
    pub incremental: bool,
    pub generating_output: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            depwarn: DepWarnMode::Warn,
            incremental: false,
            generating_output: false,
        }
    }
}

/// Monotonic fallback clock for build ids: seconds-since-epoch in the high
/// 32 bits, a process-wide counter in the low 32, so ids are unique even
/// when two modules are created within the same wall-clock second.
static BUILD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_build_id() -> u64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let counter = BUILD_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    (secs << 32) | (counter & 0xffff_ffff)
}

/// A set of modules whose parents have not finished initializing yet —
/// restoring a precompiled image can produce a batch of modules in
/// dependency order that isn't a strict tree walk, so they queue here
/// until `init_restored_modules` can retire them in passes.
#[derive(Default)]
pub struct PendingInit {
    queue: Mutex<Vec<Arc<Module>>>,
}

impl PendingInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, m: Arc<Module>) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).push(m);
    }

    /// Drain the queue, retrying modules whose declared `usings` aren't all
    /// resolvable yet. Returns the modules that are still stuck after one
    /// full pass (a genuine dependency cycle between restored modules, which
    /// the caller should report rather than loop on forever).
    pub fn drain_ready(&self) -> Vec<Arc<Module>> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let mut ready = Vec::new();
        let mut still_pending = Vec::new();
        for m in queue.drain(..) {
            let parent_ready = match m.parent_module() {
                Some(p) => p.is_root() || p.is_top_module(),
                None => true,
            };
            if parent_ready {
                ready.push(m);
            } else {
                still_pending.push(m);
            }
        }
        *queue = still_pending;
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

/// The three well-known roots every running image has: `Core` (the
/// builtins the parser and evaluator bootstrap against), `Base` (the
/// standard library, a knob-inheritance boundary), and `Main` (where
/// top-level user code lands).
pub struct Runtime {
    pub core: Arc<Module>,
    pub base: Arc<Module>,
    pub main: Arc<Module>,
    pub options: RuntimeOptions,
    pub pending_init: PendingInit,
    sink: Arc<dyn WarningSink>,
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self::with_sink(options, Arc::new(StderrSink))
    }

    pub fn with_sink(options: RuntimeOptions, sink: Arc<dyn WarningSink>) -> Self {
        let core = Module::new_root(Symbol::new("Core"), next_build_id());
        core.set_istopmod(true);

        let base = new_module(
            Symbol::new("Base"),
            core.clone(),
            true,
            Some(&core),
            options.incremental,
            sink.as_ref(),
        );
        base.mark_knob_root();
        base.set_istopmod(true);

        let main = new_module(
            Symbol::new("Main"),
            core.clone(),
            true,
            Some(&core),
            options.incremental,
            sink.as_ref(),
        );
        main.set_istopmod(true);
        // Main additionally sees everything Base exports, on top of the
        // `using Core` every `default_names` module picks up on its own.
        crate::resolver::using(&main, &base, sink.as_ref());

        Self {
            core,
            base,
            main,
            options,
            pending_init: PendingInit::new(),
            sink,
        }
    }

    pub fn sink(&self) -> &dyn WarningSink {
        self.sink.as_ref()
    }

    pub fn depwarn(&self) -> crate::deprecation::DepWarn {
        self.options.depwarn.into()
    }

    /// Queue a restored module's top-level initializer instead of running it
    /// immediately — the behavior an incremental/precompiled-image load
    /// needs so a module whose parent hasn't finished restoring yet doesn't
    /// run out of order.
    pub fn queue_module_init(&self, m: Arc<Module>) {
        self.pending_init.push(m);
    }

    /// `init_restored_modules`: drain the deferred-init queue in passes,
    /// invoking `f` once per module as its dependencies become ready.
    /// Stops once a pass makes no further progress — any modules still
    /// queued at that point form a genuine init-order cycle, which is the
    /// caller's (the evaluator's) problem to report, not this crate's to
    /// resolve.
    pub fn init_restored_modules(&self, mut f: impl FnMut(&Arc<Module>)) {
        loop {
            let ready = self.pending_init.drain_ready();
            if ready.is_empty() {
                break;
            }
            for m in &ready {
                f(m);
            }
        }
    }
}

/// Create a fresh submodule of `parent`.
///
/// When `default_names`, the new module starts `using core` and binds its
/// own name to itself as a constant — the self-reference that makes
/// `using Foo` expose `Foo` itself, not just its exports (boundary
/// scenario: `resolve_owner(Foo, :Foo)` then returns that const binding).
/// The name is always marked exported on the new module regardless of
/// `default_names`, matching `export`'s own lazy-create semantics.
pub fn new_module(
    name: Symbol,
    parent: Arc<Module>,
    default_names: bool,
    core: Option<&Arc<Module>>,
    incremental: bool,
    sink: &dyn WarningSink,
) -> Arc<Module> {
    let build_id = if incremental { 0 } else { next_build_id() };
    let m = Module::new_child(name, parent, build_id);

    if default_names {
        if let Some(core) = core {
            crate::resolver::using(&m, core, sink);
        }
        let binding = Binding::new();
        binding.claim_self();
        binding.store_value(Value::Module(m.clone()));
        binding.set_constp();
        let _ = binding.globalref_or_create(&m, name);
        m.insert_binding(name, binding);
    }
    crate::resolver::export(&m, name);

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::resolver::{boundp, module_exports_p, resolve_owner};

    #[test]
    fn runtime_wires_main_through_core_and_base() {
        let rt = Runtime::new(RuntimeOptions::default());
        let usings = rt.main.usings_snapshot();
        assert!(usings.iter().any(|m| Arc::ptr_eq(m, &rt.core)));
        assert!(usings.iter().any(|m| Arc::ptr_eq(m, &rt.base)));
        // Base was pushed after Core, so it shadows Core on lookup.
        assert!(Arc::ptr_eq(usings.last().unwrap(), &rt.base));
    }

    #[test]
    fn default_names_self_binds_and_exports_inside_the_new_module() {
        let rt = Runtime::new(RuntimeOptions::default());
        let sink = CollectingSink::new();
        let child = new_module(
            Symbol::new("Widgets"),
            rt.base.clone(),
            true,
            Some(&rt.core),
            false,
            &sink,
        );

        assert!(module_exports_p(&child, Symbol::new("Widgets")));
        assert!(child.usings_snapshot().iter().any(|m| Arc::ptr_eq(m, &rt.core)));
        let resolved = resolve_owner(&child, Symbol::new("Widgets"), &sink)
            .expect("self-binding resolves");
        assert!(resolved.is_const());
        match resolved.value() {
            Some(Value::Module(m)) => assert!(Arc::ptr_eq(&m, &child)),
            other => panic!("expected Value::Module, got {other:?}"),
        }
    }

    #[test]
    fn without_default_names_no_self_binding_is_installed() {
        let rt = Runtime::new(RuntimeOptions::default());
        let sink = CollectingSink::new();
        let child = new_module(Symbol::new("Plain"), rt.base.clone(), false, None, false, &sink);

        assert!(child.usings_snapshot().is_empty());
        assert!(module_exports_p(&child, Symbol::new("Plain")));
        assert!(child.get_module_binding(Symbol::new("Plain")).unwrap().is_unresolved());
    }

    #[test]
    fn pending_init_releases_modules_once_parent_is_top() {
        let rt = Runtime::new(RuntimeOptions::default());
        let child = Module::new_child(Symbol::new("Restored"), rt.base.clone(), 0);
        rt.pending_init.push(child.clone());
        let ready = rt.pending_init.drain_ready();
        assert_eq!(ready.len(), 1);
        assert!(rt.pending_init.is_empty());
    }

    #[test]
    fn init_restored_modules_runs_each_queued_module_once() {
        let rt = Runtime::new(RuntimeOptions::default());
        let a = Module::new_child(Symbol::new("RestoredA"), rt.base.clone(), 0);
        let b = Module::new_child(Symbol::new("RestoredB"), rt.base.clone(), 0);
        rt.queue_module_init(a.clone());
        rt.queue_module_init(b.clone());

        let mut seen = Vec::new();
        rt.init_restored_modules(|m| seen.push(m.name()));

        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&a.name()));
        assert!(seen.contains(&b.name()));
        assert!(rt.pending_init.is_empty());
    }

    #[test]
    fn boundp_sees_core_through_base_and_main() {
        let rt = Runtime::new(RuntimeOptions::default());
        let sink = CollectingSink::new();
        let b = crate::resolver::get_binding_wr(&rt.base, Symbol::new("answer"), true)
            .unwrap()
            .unwrap();
        crate::assignment::set_const(&b, Symbol::new("answer"), Value::Int(42)).unwrap();
        crate::resolver::export(&rt.base, Symbol::new("answer"));
        assert!(boundp(&rt.main, Symbol::new("answer"), &sink));
    }
}
