//! Host-side delegates that translate view callbacks into lifecycle states
//!
//! [`CommonDelegate`] owns the binding protocol shared by every host kind;
//! [`HostDelegate`] adds the activity-style retention policy deciding
//! whether a destroyed host also destroys its model. Models survive host
//! recreation through a shared [`PmStore`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use pmkit_core::prelude::*;
use pmkit_core::sync::lock;

use crate::model::Model;
use crate::navigation::{NavigationDispatcher, NavigationMessageRef};

/// Saved-state key holding the model's store key
pub const PM_KEY: &str = "pmkit.pm_key";

/// A view hosting a presentation model
#[cfg_attr(test, mockall::automock(type Pm = crate::delegate::tests::TestModel;))]
pub trait PmView: Send + Sync + 'static {
    type Pm: Model;

    /// Build a fresh model; only called when the store has none for this host
    fn provide_presentation_model(&self) -> Arc<Self::Pm>;

    /// Wire view bindings (`bind_to`, actions) to the model
    fn on_bind_presentation_model(&self, pm: &Arc<Self::Pm>);

    fn on_unbind_presentation_model(&self) {}
}

/// Key/value bundle persisted by the host across recreation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    values: HashMap<String, String>,
}

impl SavedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

// ─────────────────────────────────────────────────────────────────
// Model store
// ─────────────────────────────────────────────────────────────────

/// Models kept alive across host recreation, keyed by a generated id
#[derive(Default)]
pub struct PmStore {
    models: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    next_key: AtomicU64,
}

impl PmStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique key for a new host of type `V`
    pub fn generate_key<V: 'static>(&self) -> String {
        let n = self.next_key.fetch_add(1, Ordering::Relaxed);
        format!("{}#{}", std::any::type_name::<V>(), n)
    }

    /// The model stored under `key`, or the one `create` returns (which is
    /// then stored)
    pub fn get_or_create<M: Model>(&self, key: &str, create: impl FnOnce() -> Arc<M>) -> Arc<M> {
        let mut models = lock(&self.models);
        if let Some(existing) = models.get(key) {
            if let Ok(model) = existing.clone().downcast::<M>() {
                trace!(key, "model restored from store");
                return model;
            }
            warn!(key, "stored model has a different type, replacing it");
        }
        let model = create();
        models.insert(key.to_string(), model.clone());
        model
    }

    pub fn remove(&self, key: &str) -> bool {
        lock(&self.models).remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.models).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.models).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PmStore").field("models", &self.len()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Common delegate
// ─────────────────────────────────────────────────────────────────

struct Binding<M> {
    key: Option<String>,
    model: Option<Arc<M>>,
    bound: bool,
    navigation: Option<Subscription>,
}

/// Binding protocol shared by all hosts.
///
/// Every entry point is idempotent: repeating a call, or calling one out of
/// order where the model is already in the requested state, does nothing.
pub struct CommonDelegate<V: PmView> {
    view: Arc<V>,
    store: Arc<PmStore>,
    dispatcher: NavigationDispatcher,
    binding: Mutex<Binding<V::Pm>>,
}

impl<V: PmView> CommonDelegate<V> {
    pub fn new(view: Arc<V>, store: Arc<PmStore>, dispatcher: NavigationDispatcher) -> Self {
        Self {
            view,
            store,
            dispatcher,
            binding: Mutex::new(Binding {
                key: None,
                model: None,
                bound: false,
                navigation: None,
            }),
        }
    }

    pub fn presentation_model(&self) -> Option<Arc<V::Pm>> {
        lock(&self.binding).model.clone()
    }

    fn model(&self) -> Option<Arc<V::Pm>> {
        let model = self.presentation_model();
        if model.is_none() {
            warn!("delegate used before on_create");
        }
        model
    }

    /// Restore the model saved under `saved`'s key, or create one
    pub fn on_create(&self, saved: Option<&SavedState>) -> Result<()> {
        let key = saved
            .and_then(|s| s.get(PM_KEY))
            .map(str::to_string)
            .unwrap_or_else(|| self.store.generate_key::<V>());
        let model = self
            .store
            .get_or_create(&key, || self.view.provide_presentation_model());

        {
            let mut binding = lock(&self.binding);
            binding.key = Some(key.clone());
            binding.model = Some(model.clone());
        }

        debug!(key = %key, "host created");
        if model.pm().current_lifecycle().is_none() {
            model.pm().accept_lifecycle(Lifecycle::Created)?;
        }
        Ok(())
    }

    pub fn on_bind(&self) -> Result<()> {
        let Some(model) = self.model() else {
            return Ok(());
        };
        {
            let mut binding = lock(&self.binding);
            if binding.bound {
                return Ok(());
            }
            binding.bound = true;
        }

        model.pm().accept_lifecycle(Lifecycle::Binded)?;
        self.view.on_bind_presentation_model(&model);

        if let Some(command) = model.pm().navigation_messages() {
            let dispatcher = self.dispatcher.clone();
            let subscription = command
                .observable()
                .subscribe_fn(move |message: NavigationMessageRef| {
                    dispatcher.dispatch(message.as_ref());
                });
            lock(&self.binding).navigation = Some(subscription);
        }
        Ok(())
    }

    pub fn on_resume(&self) -> Result<()> {
        let Some(model) = self.model() else {
            return Ok(());
        };
        match model.pm().current_lifecycle() {
            Some(Lifecycle::Binded) | Some(Lifecycle::Paused) => {
                model.pm().accept_lifecycle(Lifecycle::Resumed)
            }
            _ => Ok(()),
        }
    }

    pub fn on_pause(&self) -> Result<()> {
        let Some(model) = self.model() else {
            return Ok(());
        };
        if model.pm().current_lifecycle() == Some(Lifecycle::Resumed) {
            model.pm().accept_lifecycle(Lifecycle::Paused)?;
        }
        Ok(())
    }

    /// Record the store key so a recreated host finds the same model
    pub fn on_save_state(&self, saved: &mut SavedState) {
        if let Some(key) = &lock(&self.binding).key {
            saved.put(PM_KEY, key.clone());
        }
    }

    pub fn on_unbind(&self) -> Result<()> {
        let Some(model) = self.model() else {
            return Ok(());
        };
        let navigation = {
            let mut binding = lock(&self.binding);
            if !binding.bound {
                return Ok(());
            }
            binding.bound = false;
            binding.navigation.take()
        };

        self.on_pause()?;
        if let Some(navigation) = navigation {
            navigation.dispose();
        }
        self.view.on_unbind_presentation_model();
        model.pm().accept_lifecycle(Lifecycle::Unbinded)
    }

    /// Drop the model from the store and destroy it
    pub fn on_destroy(&self) -> Result<()> {
        let (key, model) = {
            let binding = lock(&self.binding);
            (binding.key.clone(), binding.model.clone())
        };
        if let Some(key) = key {
            self.store.remove(&key);
        }
        let Some(model) = model else {
            return Ok(());
        };
        debug!("destroying presentation model");
        model.pm().detach_from_parent()
    }
}

// ─────────────────────────────────────────────────────────────────
// Host delegate
// ─────────────────────────────────────────────────────────────────

/// When a destroyed host also destroys its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetainMode {
    /// Destroy only when the host is finishing for good
    #[default]
    IsFinishing,
    /// Keep the model only across configuration changes
    ConfigurationChanges,
}

/// Why the host is being destroyed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStatus {
    pub finishing: bool,
    pub changing_configurations: bool,
}

impl HostStatus {
    pub fn finishing() -> Self {
        Self {
            finishing: true,
            changing_configurations: false,
        }
    }

    pub fn configuration_change() -> Self {
        Self {
            finishing: false,
            changing_configurations: true,
        }
    }
}

/// Activity-style delegate
pub struct HostDelegate<V: PmView> {
    common: CommonDelegate<V>,
    retain_mode: RetainMode,
}

impl<V: PmView> HostDelegate<V> {
    pub fn new(
        view: Arc<V>,
        store: Arc<PmStore>,
        dispatcher: NavigationDispatcher,
        retain_mode: RetainMode,
    ) -> Self {
        Self {
            common: CommonDelegate::new(view, store, dispatcher),
            retain_mode,
        }
    }

    pub fn retain_mode(&self) -> RetainMode {
        self.retain_mode
    }

    pub fn presentation_model(&self) -> Option<Arc<V::Pm>> {
        self.common.presentation_model()
    }

    pub fn on_create(&self, saved: Option<&SavedState>) -> Result<()> {
        self.common.on_create(saved)
    }

    /// Binds the view once the host's own setup is done
    pub fn on_post_create(&self) -> Result<()> {
        self.common.on_bind()
    }

    pub fn on_resume(&self) -> Result<()> {
        self.common.on_resume()
    }

    /// Saves the model key; the host may be killed afterwards, so the model
    /// is paused here as well.
    pub fn on_save_state(&self, saved: &mut SavedState) -> Result<()> {
        self.common.on_save_state(saved);
        self.common.on_pause()
    }

    pub fn on_pause(&self) -> Result<()> {
        self.common.on_pause()
    }

    pub fn on_destroy(&self, status: HostStatus) -> Result<()> {
        self.common.on_unbind()?;
        let destroy = match self.retain_mode {
            RetainMode::IsFinishing => status.finishing,
            RetainMode::ConfigurationChanges => !status.changing_configurations,
        };
        if destroy {
            self.common.on_destroy()
        } else {
            debug!(?status, "host destroyed, model retained");
            Ok(())
        }
    }
}
