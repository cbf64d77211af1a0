//! Dialog shown by a model, with an optional result

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;

use pmkit_core::prelude::*;
use pmkit_core::sync::lock;
use pmkit_core::Value;

use crate::action::Action;
use crate::model::{install, Model, PresentationModel};
use crate::state::State;

/// Whether a dialog is on screen, and with what data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Display<T> {
    Displayed(T),
    Absent,
}

impl<T> Display<T> {
    pub fn is_displayed(&self) -> bool {
        matches!(self, Display::Displayed(_))
    }
}

/// A dialog created by the view for a [`DialogControl`]
pub trait DialogHandle: Send + 'static {
    /// Remove the dialog from screen without reporting back
    fn close(&mut self);
}

/// Child model driving one dialog.
///
/// The dialog survives view recreation: it is closed on unbind and shown
/// again on the next bind as long as `displayed` still holds
/// [`Display::Displayed`].
pub struct DialogControl<T, R> {
    pm: PresentationModel,
    displayed: State<Display<T>>,
    result: Action<R>,
}

impl<T: Value, R: Value> Model for DialogControl<T, R> {
    fn pm(&self) -> &PresentationModel {
        &self.pm
    }
}

/// Create a dialog control attached to `parent`
pub fn dialog_control<T: Value, R: Value>(
    parent: &PresentationModel,
) -> Result<Arc<DialogControl<T, R>>> {
    let pm = PresentationModel::builder()
        .name(format!("{}.dialog", parent.name()))
        .view_scheduler(parent.view_scheduler().clone())
        .computation_scheduler(parent.computation_scheduler().clone())
        .build();
    let displayed = State::with_initial(&pm, Display::Absent);
    let control = install(DialogControl {
        pm,
        displayed,
        result: Action::new(),
    });
    control.pm.attach_to_parent(parent)?;
    Ok(control)
}

impl<T: Value, R: Value> DialogControl<T, R> {
    pub fn displayed(&self) -> &State<Display<T>> {
        &self.displayed
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
            .value_or_none()
            .is_some_and(|display| display.is_displayed())
    }

    /// Show the dialog, replacing one already on screen
    pub fn show(&self, data: T) {
        self.dismiss();
        self.displayed.accept(Display::Displayed(data));
    }

    /// Show the dialog and wait for its result.
    ///
    /// Resolves to `None` when the dialog is dismissed without a result.
    /// Dropping the future stops listening but leaves the dialog shown.
    pub fn show_for_result(&self, data: T) -> impl Future<Output = Option<R>> + Send + 'static {
        self.dismiss();

        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let on_result = tx.clone();
        let results = self.result.observable().subscribe_fn(move |result| {
            if let Some(tx) = lock(&on_result).take() {
                let _ = tx.send(Some(result));
            }
        });

        let on_dismiss = tx;
        let dismissals = self
            .displayed
            .observable()
            .skip(1)
            .filter(|display| !display.is_displayed())
            .subscribe_fn(move |_| {
                if let Some(tx) = lock(&on_dismiss).take() {
                    let _ = tx.send(None);
                }
            });

        let guard = DisposeOnDrop(Subscription::all(vec![results, dismissals]));
        self.displayed.accept(Display::Displayed(data));

        async move {
            let _guard = guard;
            rx.await.ok().flatten()
        }
    }

    /// Report `result` and dismiss the dialog
    pub fn send_result(&self, result: R) {
        self.result.accept(result);
        self.dismiss();
    }

    pub fn dismiss(&self) {
        if self.is_displayed() {
            self.displayed.accept(Display::Absent);
        }
    }

    /// Show dialogs built by `create` on the view scheduler until unbind.
    ///
    /// Call from the view's bind callback. The open dialog is closed when
    /// `displayed` turns [`Display::Absent`] and when the view unbinds.
    pub fn bind_to<H, F>(self: &Arc<Self>, create: F)
    where
        H: DialogHandle,
        F: Fn(T, Arc<Self>) -> H + Send + Sync + 'static,
    {
        let open: Arc<Mutex<Option<H>>> = Arc::new(Mutex::new(None));
        let control: Weak<Self> = Arc::downgrade(self);

        let current = open.clone();
        let render = self
            .displayed
            .observable()
            .observe_on(self.pm.view_scheduler().clone())
            .subscribe_fn(move |display| {
                close(&current);
                if let (Display::Displayed(data), Some(control)) = (display, control.upgrade()) {
                    *lock(&current) = Some(create(data, control));
                }
            });

        let closing = Subscription::new(move || close(&open));
        self.pm.until_unbind(Subscription::all(vec![render, closing]));
    }
}

fn close<H: DialogHandle>(open: &Mutex<Option<H>>) {
    let handle = lock(open).take();
    if let Some(mut handle) = handle {
        handle.close();
    }
}

struct DisposeOnDrop(Subscription);

impl Drop for DisposeOnDrop {
    fn drop(&mut self) {
        self.0.dispose();
    }
}
