//! Navigation messages and their dispatch chain
//!
//! A navigational model publishes messages on its navigation command; child
//! models forward theirs to the parent. The host binds the root channel to a
//! [`NavigationDispatcher`], which offers each message to its handlers in
//! order.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use pmkit_core::prelude::*;

/// Anything a model may ask its host to do: open a screen, go back, ...
pub trait NavigationMessage: Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;
}

impl<T: Debug + Send + Sync + 'static> NavigationMessage for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

pub type NavigationMessageRef = Arc<dyn NavigationMessage>;

/// Downcast a message to a concrete type
pub fn downcast<M: 'static>(message: &dyn NavigationMessage) -> Option<&M> {
    message.as_any().downcast_ref::<M>()
}

/// One link of the dispatch chain
pub trait NavigationMessageHandler: Send + Sync {
    /// Returns `true` when the message was consumed
    fn handle_navigation_message(&self, message: &dyn NavigationMessage) -> bool;
}

impl<F> NavigationMessageHandler for F
where
    F: Fn(&dyn NavigationMessage) -> bool + Send + Sync,
{
    fn handle_navigation_message(&self, message: &dyn NavigationMessage) -> bool {
        self(message)
    }
}

/// Ordered chain of handlers; the first to accept a message consumes it.
#[derive(Clone, Default)]
pub struct NavigationDispatcher {
    handlers: Vec<Arc<dyn NavigationMessageHandler>>,
}

impl NavigationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: impl NavigationMessageHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offer `message` to each handler; returns whether one consumed it
    pub fn dispatch(&self, message: &dyn NavigationMessage) -> bool {
        let handled = self
            .handlers
            .iter()
            .any(|handler| handler.handle_navigation_message(message));
        if handled {
            debug!(message = message.type_name(), "navigation message handled");
        } else {
            warn!("Unhandled navigation message: {:?}", message);
        }
        handled
    }
}

impl Debug for NavigationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PresentationModel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Back;

    #[derive(Debug)]
    struct OpenDevice(i64);

    #[test]
    fn test_first_handler_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let dispatcher = NavigationDispatcher::new()
            .with_handler(|m: &dyn NavigationMessage| downcast::<Back>(m).is_some())
            .with_handler(move |_: &dyn NavigationMessage| {
                c.fetch_add(1, Ordering::SeqCst);
                true
            });

        assert!(dispatcher.dispatch(&Back));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(dispatcher.dispatch(&OpenDevice(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unhandled_message_reports_false() {
        let dispatcher = NavigationDispatcher::new();
        assert!(dispatcher.is_empty());
        assert!(!dispatcher.dispatch(&Back));
    }

    #[test]
    fn test_downcast_payload() {
        let message: NavigationMessageRef = Arc::new(OpenDevice(42));
        assert_eq!(downcast::<OpenDevice>(message.as_ref()).map(|m| m.0), Some(42));
        assert!(downcast::<Back>(message.as_ref()).is_none());
        assert!(message.as_ref().type_name().ends_with("OpenDevice"));
    }

    #[test]
    fn test_child_messages_reach_parent_channel() {
        let parent = PresentationModel::builder().navigational().build();
        let child = PresentationModel::builder().navigational().build();
        child.attach_to_parent(&parent).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = parent
            .navigation_messages()
            .unwrap()
            .observable()
            .subscribe_fn(move |m: NavigationMessageRef| s.lock().unwrap().push(format!("{m:?}")));

        for step in [Lifecycle::Created, Lifecycle::Binded, Lifecycle::Resumed] {
            parent.accept_lifecycle(step).unwrap();
        }
        assert!(child.send_navigation_message(OpenDevice(7)));

        assert_eq!(*seen.lock().unwrap(), vec!["OpenDevice(7)"]);
    }

    #[test]
    fn test_plain_model_has_no_channel() {
        let pm = PresentationModel::new();
        assert!(!pm.is_navigational());
        assert!(!pm.send_navigation_message(Back));
    }
}
