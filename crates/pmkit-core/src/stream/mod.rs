//! Push-based streams: observers, observables, relays and the serializing
//! emitter that keeps delivery ordered across threads.

mod observable;
mod observer;
mod relay;
mod serialize;

pub use observable::{Observable, Value};
pub use observer::{from_fn, Callbacks, Observer, ObserverRef};
pub use relay::{BehaviorRelay, PublishRelay};
pub use serialize::{Serialized, Signal};
