//! Headless mode runner - host event loop without a UI
//!
//! Owns the host delegate and drives it from stdin commands. View jobs
//! queued by the model are run on this loop, which makes it the view
//! thread.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use knx_app::{
    demo_devices, load_settings, Back, ConnectionState, DevicesPmOptions, InMemoryRepository,
    Page,
};
use pmkit::{
    downcast, HostDelegate, HostStatus, Model, NavigationDispatcher, NavigationMessage, PmStore,
    RetainMode, SavedState,
};
use pmkit_core::prelude::*;
use pmkit_core::{view_queue, SchedulerRef, SerialExecutor};

use super::view::{HeadlessView, Screen, ViewContext};
use super::HeadlessEvent;
use crate::message::Message;
use crate::signals::spawn_signal_handler;

const MESSAGE_CHANNEL_SIZE: usize = 64;

/// Run in headless mode - output JSON events instead of a UI
pub async fn run_headless(project_path: &Path, page: Option<Page>) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("masterknx starting in HEADLESS mode");
    info!("Project: {}", project_path.display());
    info!("═══════════════════════════════════════════════════════");

    let settings = load_settings(project_path)?;
    let page = page.unwrap_or(settings.app.page);
    let devices = if settings.devices.is_empty() {
        demo_devices()
    } else {
        settings.devices.clone()
    };

    let runtime = Handle::current();
    let (view_scheduler, mut view_rx) = view_queue();
    let computation: Option<SchedulerRef> = settings
        .state
        .diff_async
        .then(|| Arc::new(SerialExecutor::spawn(&runtime)) as SchedulerRef);
    let options = DevicesPmOptions {
        buffer: settings.commands.policy(),
        diff_async: settings.state.diff_async,
        view_scheduler: Some(Arc::new(view_scheduler)),
        computation_scheduler: computation,
    };

    let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(MESSAGE_CHANNEL_SIZE);
    spawn_signal_handler(msg_tx.clone());
    let stdin_tx = msg_tx.clone();
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(stdin_tx);
    });

    let context = Arc::new(ViewContext {
        page,
        repository: Arc::new(InMemoryRepository::new(devices)),
        runtime,
        options,
        rendered: Mutex::new(Vec::new()),
    });
    let mut host = Host::new(context, settings.host.retain_mode, navigation(msg_tx));
    host.create(None)?;

    let result = host_event_loop(&mut host, &mut view_rx, &mut msg_rx).await;

    if let Err(e) = host.finish() {
        HeadlessEvent::error(e.to_string(), true).emit();
    }
    view_rx.run_pending();

    info!("masterknx headless mode exiting");
    result
}

async fn host_event_loop(
    host: &mut Host,
    view_rx: &mut pmkit_core::ViewReceiver,
    msg_rx: &mut mpsc::Receiver<Message>,
) -> Result<()> {
    loop {
        tokio::select! {
            Some(job) = view_rx.recv() => job(),
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    info!("Message channel closed");
                    break;
                };
                match host.handle(msg) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit) => break,
                    Err(e) if e.is_fatal() => {
                        HeadlessEvent::error(e.to_string(), true).emit();
                        return Err(e);
                    }
                    Err(e) => HeadlessEvent::error(e.to_string(), false).emit(),
                }
            }
        }
    }
    Ok(())
}

/// Back finishes the host; everything else is left to the dispatcher's
/// fallback logging.
fn navigation(msg_tx: mpsc::Sender<Message>) -> NavigationDispatcher {
    NavigationDispatcher::new().with_handler(move |message: &dyn NavigationMessage| {
        if downcast::<Back>(message).is_none() {
            return false;
        }
        HeadlessEvent::navigation("back").emit();
        if msg_tx.try_send(Message::Finish).is_err() {
            warn!("host loop gone, back navigation dropped");
        }
        true
    })
}

enum Flow {
    Continue,
    Exit,
}

/// The activity-like host: one delegate per incarnation, a store shared by
/// all of them.
struct Host {
    context: Arc<ViewContext>,
    retain_mode: RetainMode,
    dispatcher: NavigationDispatcher,
    store: Arc<PmStore>,
    delegate: Option<HostDelegate<HeadlessView>>,
    observed: Option<Arc<Screen>>,
}

impl Host {
    fn new(context: Arc<ViewContext>, retain_mode: RetainMode, dispatcher: NavigationDispatcher) -> Self {
        Self {
            context,
            retain_mode,
            dispatcher,
            store: Arc::new(PmStore::new()),
            delegate: None,
            observed: None,
        }
    }

    /// Start a host incarnation and bring it to the foreground
    fn create(&mut self, saved: Option<&SavedState>) -> Result<()> {
        let delegate = HostDelegate::new(
            Arc::new(HeadlessView::new(self.context.clone())),
            self.store.clone(),
            self.dispatcher.clone(),
            self.retain_mode,
        );
        delegate.on_create(saved)?;
        let model = delegate.presentation_model();
        HeadlessEvent::host_created(self.context.page, saved.is_some()).emit();
        if let Some(model) = model {
            self.observe(model);
        }

        delegate.on_post_create()?;
        delegate.on_resume()?;
        self.delegate = Some(delegate);
        Ok(())
    }

    /// Report the lifecycle of each model instance once
    fn observe(&mut self, model: Arc<Screen>) {
        if self
            .observed
            .as_ref()
            .is_some_and(|observed| Arc::ptr_eq(observed, &model))
        {
            return;
        }
        let name = model.pm().name().to_string();
        // Completes after Destroyed, which releases the closure
        let _ = model
            .pm()
            .lifecycle()
            .subscribe_fn(move |state| HeadlessEvent::lifecycle(&name, state).emit());
        self.observed = Some(model);
    }

    fn model(&self) -> Option<Arc<Screen>> {
        self.delegate
            .as_ref()
            .and_then(|delegate| delegate.presentation_model())
    }

    fn handle(&mut self, msg: Message) -> Result<Flow> {
        debug!(?msg, "host message");
        match msg {
            Message::Resume => self.with_delegate(|d| d.on_resume())?,
            Message::Pause => self.with_delegate(|d| d.on_pause())?,
            Message::Rotate => self.rotate()?,
            Message::Toggle(id) => {
                let item = self.rendered(id)?;
                if let Some(model) = self.model() {
                    model.item_changed.accept(item.toggled());
                }
            }
            Message::Set { id, value } => {
                let item = self.rendered(id)?;
                if let Some(model) = self.model() {
                    model.item_changed.accept(item.with_value(value));
                }
            }
            Message::Event(event) => self.context.repository.publish_event(event),
            Message::Connect => {
                self.context
                    .repository
                    .set_connection(ConnectionState::Connecting);
                self.context
                    .repository
                    .set_connection(ConnectionState::Connected);
            }
            Message::Disconnect => self
                .context
                .repository
                .set_connection(ConnectionState::Disconnected),
            Message::Back => {
                if let Some(model) = self.model() {
                    model.back.accept(());
                }
            }
            Message::Finish => {
                self.finish()?;
                return Ok(Flow::Exit);
            }
            Message::Quit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    fn with_delegate(
        &self,
        f: impl FnOnce(&HostDelegate<HeadlessView>) -> Result<()>,
    ) -> Result<()> {
        match &self.delegate {
            Some(delegate) => f(delegate),
            None => Ok(()),
        }
    }

    fn rendered(&self, id: i64) -> Result<knx_app::Item> {
        self.context.item(id).ok_or(Error::UnknownDevice { id })
    }

    /// Configuration change: save, tear the host down, start a new one
    fn rotate(&mut self) -> Result<()> {
        let Some(delegate) = self.delegate.take() else {
            return Ok(());
        };
        let mut saved = SavedState::new();
        delegate.on_save_state(&mut saved)?;
        delegate.on_destroy(HostStatus::configuration_change())?;
        info!("host recreated after configuration change");
        self.create(Some(&saved))
    }

    /// The host finishes for good
    fn finish(&mut self) -> Result<()> {
        match self.delegate.take() {
            Some(delegate) => delegate.on_destroy(HostStatus::finishing()),
            None => Ok(()),
        }
    }
}

/// Read stdin commands and forward them to the host loop (blocking)
fn spawn_stdin_reader_blocking(msg_tx: mpsc::Sender<Message>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => match Message::parse(&line) {
                Ok(Some(msg)) => {
                    let quit = msg == Message::Quit;
                    if msg_tx.blocking_send(msg).is_err() || quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Unknown stdin command: {}", line.trim());
                    HeadlessEvent::error(e, false).emit();
                }
            },
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    // End of input ends the session
    let _ = msg_tx.blocking_send(Message::Quit);
    info!("Stdin reader exiting");
}
