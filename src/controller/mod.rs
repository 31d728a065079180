//! Controller module - group detection and request handling
//!
//! - `observer`: Track-change detection, one detection cycle per tick or push
//! - `matcher`: Finds the group a track belongs to
//! - `expander`: Queues the rest of a group behind its head
//! - `router`: Typed request/response contract for UI hosts
//! - `runner`: The long-running loop driving ticks, requests and notifications

mod observer;
mod matcher;
mod expander;
mod router;
mod runner;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config;
use crate::model::{GroupStore, SpotifyApi};
use crate::notify::Notifier;

pub use observer::CycleOutcome;
use observer::ObserverState;
pub use router::{Request, Response};
pub use runner::RunSettings;

#[derive(Clone)]
pub struct GroupController {
    pub(crate) api: Arc<dyn SpotifyApi>,
    pub(crate) store: Arc<dyn GroupStore>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) notify: config::Notify,
    // Held for the whole detection cycle
    observer: Arc<Mutex<ObserverState>>,
}

impl GroupController {
    pub fn new(
        api: Arc<dyn SpotifyApi>,
        store: Arc<dyn GroupStore>,
        notifier: Arc<dyn Notifier>,
        notify: config::Notify,
    ) -> Self {
        Self {
            api,
            store,
            notifier,
            notify,
            observer: Arc::new(Mutex::new(ObserverState::new())),
        }
    }
}
