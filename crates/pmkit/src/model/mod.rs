//! Presentation model: lifecycle consumer, hook dispatch, scoped registries
//! and parent/child attachment

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use pmkit_core::prelude::*;
use pmkit_core::sync::lock;
use pmkit_core::{immediate, BehaviorRelay, BufferPolicy, Registry, SchedulerRef, Scope};

use crate::command::Command;
use crate::navigation::{NavigationMessage, NavigationMessageRef};


/// Lifecycle hooks of a presentation model.
///
/// Implementors own a [`PresentationModel`] and are registered with it
/// through [`install`]. Each hook runs exactly once per entry into its
/// state, synchronously, before any external lifecycle observer sees the
/// transition.
pub trait Model: Send + Sync + 'static {
    fn pm(&self) -> &PresentationModel;

    fn on_create(&self) {}

    fn on_bind(&self) {}

    fn on_resume(&self) {}

    fn on_pause(&self) {}

    fn on_unbind(&self) {}

    /// Last hook. Scoped subscriptions are already released.
    fn on_destroy(&self) {}
}

/// Share `model` and register it as the hook owner of its presentation model.
///
/// The presentation model keeps only a weak reference; once every `Arc` is
/// dropped, hooks stop running.
pub fn install<M: Model>(model: M) -> Arc<M> {
    let model = Arc::new(model);
    let weak: Weak<M> = Arc::downgrade(&model);
    let hooks: Weak<dyn Model> = weak;
    if model.pm().inner.hooks.set(hooks).is_err() {
        warn!(model = model.pm().name(), "hooks already installed, keeping the first owner");
    }
    model
}

/// Accepted state plus the transitions still waiting to be dispatched.
///
/// A transition requested while another is being dispatched (from a hook or
/// a lifecycle observer) is queued and runs once the outer one has reached
/// every observer.
#[derive(Default)]
struct Transitions {
    current: Option<Lifecycle>,
    pending: VecDeque<Lifecycle>,
    draining: bool,
}

pub(crate) struct PmInner {
    name: String,
    transitions: Mutex<Transitions>,
    lifecycle: BehaviorRelay<Lifecycle>,
    idle: BehaviorRelay<bool>,
    unbound: BehaviorRelay<bool>,
    pause: Registry,
    unbind: Registry,
    destroy: Registry,
    hooks: OnceLock<Weak<dyn Model>>,
    attached: AtomicBool,
    navigation: OnceLock<Command<NavigationMessageRef>>,
    view: SchedulerRef,
    computation: SchedulerRef,
}

/// Non-owning handle held by slots, so that a model storing its own slots
/// does not keep itself alive.
#[derive(Clone)]
pub(crate) struct PmRef(Weak<PmInner>);

impl PmRef {
    pub(crate) fn upgrade(&self) -> Option<PresentationModel> {
        self.0.upgrade().map(|inner| PresentationModel { inner })
    }
}

/// The lifecycle engine behind every screen-level model.
///
/// Cloning shares the same model.
#[derive(Clone)]
pub struct PresentationModel {
    inner: Arc<PmInner>,
}

impl Default for PresentationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PresentationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationModel")
            .field("name", &self.inner.name)
            .field("lifecycle", &self.current_lifecycle())
            .field("navigational", &self.is_navigational())
            .finish()
    }
}

/// Builder for [`PresentationModel`]
#[derive(Default)]
pub struct PresentationModelBuilder {
    name: Option<String>,
    navigational: bool,
    view: Option<SchedulerRef>,
    computation: Option<SchedulerRef>,
}

impl PresentationModelBuilder {
    /// Name used in log output
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Give the model a navigation message channel
    pub fn navigational(mut self) -> Self {
        self.navigational = true;
        self
    }

    /// Context for view-bound deliveries (defaults to inline)
    pub fn view_scheduler(mut self, scheduler: SchedulerRef) -> Self {
        self.view = Some(scheduler);
        self
    }

    /// Context for asynchronous diffing (defaults to inline)
    pub fn computation_scheduler(mut self, scheduler: SchedulerRef) -> Self {
        self.computation = Some(scheduler);
        self
    }

    pub fn build(self) -> PresentationModel {
        let pm = PresentationModel {
            inner: Arc::new(PmInner {
                name: self.name.unwrap_or_else(|| "pm".to_string()),
                transitions: Mutex::new(Transitions::default()),
                lifecycle: BehaviorRelay::new(),
                idle: BehaviorRelay::with_value(true),
                unbound: BehaviorRelay::with_value(true),
                pause: Registry::new(Scope::Pause),
                unbind: Registry::new(Scope::Unbind),
                destroy: Registry::new(Scope::Destroy),
                hooks: OnceLock::new(),
                attached: AtomicBool::new(false),
                navigation: OnceLock::new(),
                view: self.view.unwrap_or_else(immediate),
                computation: self.computation.unwrap_or_else(immediate),
            }),
        };
        if self.navigational {
            // Navigation messages are never coalesced
            let command = Command::with_policy(&pm, BufferPolicy::Unbounded);
            let _ = pm.inner.navigation.set(command);
        }
        pm
    }
}

impl PresentationModel {
    /// A plain model delivering everything inline
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PresentationModelBuilder {
        PresentationModelBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn downgrade(&self) -> PmRef {
        PmRef(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &PresentationModel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ─────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────

    /// Feed the next lifecycle state.
    ///
    /// Repeating the current state is a no-op. A step outside the transition
    /// table fails with [`Error::IllegalTransition`] and changes nothing.
    /// Called from inside a hook, the step is validated at once but
    /// dispatched after the running transition.
    pub fn accept_lifecycle(&self, to: Lifecycle) -> Result<()> {
        {
            let mut transitions = lock(&self.inner.transitions);
            let from = transitions.current;
            if from == Some(to) {
                return Ok(());
            }
            if !Lifecycle::can_transition(from, to) {
                return Err(Error::illegal_transition(from, to));
            }
            transitions.current = Some(to);
            transitions.pending.push_back(to);
            debug!(model = %self.inner.name, ?from, %to, "lifecycle transition");
            if transitions.draining {
                return Ok(());
            }
            transitions.draining = true;
        }

        loop {
            let next = {
                let mut transitions = lock(&self.inner.transitions);
                match transitions.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        transitions.draining = false;
                        break;
                    }
                }
            };
            self.dispatch(next);
            self.inner.lifecycle.accept(next);
        }
        Ok(())
    }

    fn dispatch(&self, to: Lifecycle) {
        let inner = &self.inner;
        match to {
            Lifecycle::Created => {}
            Lifecycle::Binded => inner.unbound.accept(false),
            Lifecycle::Resumed => inner.idle.accept(false),
            Lifecycle::Paused => {
                inner.idle.accept(true);
                inner.pause.clear();
            }
            Lifecycle::Unbinded => {
                inner.unbound.accept(true);
                inner.unbind.clear();
            }
            Lifecycle::Destroyed => {
                inner.pause.dispose();
                inner.unbind.dispose();
                inner.destroy.dispose();
            }
        }

        let Some(hooks) = inner.hooks.get().and_then(Weak::upgrade) else {
            return;
        };
        match to {
            Lifecycle::Created => hooks.on_create(),
            Lifecycle::Binded => hooks.on_bind(),
            Lifecycle::Resumed => hooks.on_resume(),
            Lifecycle::Paused => hooks.on_pause(),
            Lifecycle::Unbinded => hooks.on_unbind(),
            Lifecycle::Destroyed => hooks.on_destroy(),
        }
    }

    /// Distinct lifecycle states, replaying the current one to each new
    /// subscriber. Completes after `Destroyed`.
    pub fn lifecycle(&self) -> Observable<Lifecycle> {
        self.inner
            .lifecycle
            .observable()
            .take_until(Lifecycle::is_terminal)
    }

    pub fn current_lifecycle(&self) -> Option<Lifecycle> {
        lock(&self.inner.transitions).current
    }

    /// `true` until the model is resumed, and again while paused
    pub fn idle(&self) -> Observable<bool> {
        self.inner.idle.observable()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.idle.value().unwrap_or(true)
    }

    /// `true` while no view is bound
    pub fn unbound(&self) -> Observable<bool> {
        self.inner.unbound.observable()
    }

    /// Walk the shortest legal path to `Destroyed`.
    ///
    /// Used when a child is removed while its parent lives on. A no-op for a
    /// model that was never created or is already destroyed.
    pub fn detach_from_parent(&self) -> Result<()> {
        for step in Lifecycle::teardown_path(self.current_lifecycle()) {
            self.accept_lifecycle(*step)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Scoped registration
    // ─────────────────────────────────────────────────────────

    /// Release `subscription` on the next `Paused`
    pub fn until_pause(&self, subscription: Subscription) {
        self.inner.pause.add(subscription)
    }

    /// Release `subscription` on the next `Unbinded`
    pub fn until_unbind(&self, subscription: Subscription) {
        self.inner.unbind.add(subscription)
    }

    /// Release `subscription` when the model is destroyed
    pub fn until_destroy(&self, subscription: Subscription) {
        self.inner.destroy.add(subscription)
    }

    pub fn registry(&self, scope: Scope) -> &Registry {
        match scope {
            Scope::Pause => &self.inner.pause,
            Scope::Unbind => &self.inner.unbind,
            Scope::Destroy => &self.inner.destroy,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Execution contexts
    // ─────────────────────────────────────────────────────────

    pub fn view_scheduler(&self) -> &SchedulerRef {
        &self.inner.view
    }

    pub fn computation_scheduler(&self) -> &SchedulerRef {
        &self.inner.computation
    }

    // ─────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────

    pub fn is_navigational(&self) -> bool {
        self.inner.navigation.get().is_some()
    }

    /// Outgoing navigation messages, if the model was built navigational
    pub fn navigation_messages(&self) -> Option<&Command<NavigationMessageRef>> {
        self.inner.navigation.get()
    }

    /// Publish a navigation message; returns `false` for a model without a
    /// navigation channel.
    pub fn send_navigation_message(&self, message: impl NavigationMessage) -> bool {
        match self.navigation_messages() {
            Some(command) => {
                command.accept(Arc::new(message));
                true
            }
            None => {
                warn!(model = %self.inner.name, "navigation message sent by a non-navigational model");
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Parent/child
    // ─────────────────────────────────────────────────────────

    /// Make this model follow `parent`'s lifecycle.
    ///
    /// The child catches up with the parent's current state through the
    /// shortest legal prefix and then mirrors every later transition. A
    /// child can be attached once, before it has any lifecycle of its own.
    pub fn attach_to_parent(&self, parent: &PresentationModel) -> Result<()> {
        if self.ptr_eq(parent) {
            return Err(Error::AttachToSelf);
        }
        let state = self.current_lifecycle();
        if state.is_some() {
            return Err(Error::AlreadyAttached { state });
        }
        let parent_state = parent.current_lifecycle();
        if parent_state == Some(Lifecycle::Destroyed) {
            return Err(Error::AttachToDestroyed);
        }
        if self.inner.attached.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyAttached { state });
        }

        use Lifecycle::*;
        let source = parent.lifecycle();
        let source = match parent_state {
            None | Some(Created) => source,
            Some(Binded) => source.start_with(vec![Created]),
            Some(Resumed) => source.start_with(vec![Created, Binded]),
            Some(Paused) => source.skip(1).start_with(vec![Created, Binded]),
            Some(Unbinded) => source.skip(1).start_with(vec![Created]),
            Some(Destroyed) => return Err(Error::AttachToDestroyed),
        };

        if let (Some(child_nav), Some(parent_nav)) =
            (self.navigation_messages(), parent.navigation_messages())
        {
            let forward = child_nav.raw_observable().subscribe(parent_nav.consumer());
            self.until_destroy(forward);
        }

        debug!(
            child = %self.inner.name,
            parent = %parent.inner.name,
            parent_state = ?parent_state,
            "attached to parent"
        );

        let child = self.downgrade();
        let propagation = source.subscribe_fn(move |lifecycle| {
            let Some(child) = child.upgrade() else {
                return;
            };
            if let Err(e) = child.accept_lifecycle(lifecycle) {
                error!(model = %child.name(), "lifecycle propagation from parent failed: {}", e);
            }
        });
        self.until_destroy(propagation);
        Ok(())
    }
}
