//! Shared application state, passed by reference to every handler.
//!
//! One explicit instance built at startup — no module-level singletons. The
//! realtime maps start empty and die with the process; persisted state lives
//! in the store.

use std::sync::Arc;

use crate::store::Store;
use crate::ws::RealtimeService;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub realtime: Arc<RealtimeService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Store, jwt_secret: &str) -> Self {
        Self {
            store,
            realtime: Arc::new(RealtimeService::new()),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
