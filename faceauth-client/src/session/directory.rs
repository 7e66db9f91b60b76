use std::cell::{Cell, RefCell};

use log::{debug, warn};

use crate::api::{EnrolledUserSummary, SystemHealth};
use crate::dispatcher::Dispatcher;
use crate::error::ApiError;
use crate::notify::Notifier;

/// Enrolled users and the health summary, refreshed together.
///
/// Only the most recently issued refresh is applied; an older one that
/// resolves late is dropped.
pub struct Directory {
    dispatcher: Dispatcher,
    notifier: Notifier,
    users: RefCell<Vec<EnrolledUserSummary>>,
    health: RefCell<Option<SystemHealth>>,
    issued: Cell<u64>,
}

impl Directory {
    pub fn new(dispatcher: Dispatcher, notifier: Notifier) -> Self {
        Self {
            dispatcher,
            notifier,
            users: RefCell::new(Vec::new()),
            health: RefCell::new(None),
            issued: Cell::new(0),
        }
    }

    pub fn users(&self) -> Vec<EnrolledUserSummary> {
        self.users.borrow().clone()
    }

    /// `None` until the first successful load.
    pub fn health(&self) -> Option<SystemHealth> {
        self.health.borrow().clone()
    }

    pub async fn refresh(&self) -> Result<(), ApiError> {
        let seq = self.issued.get() + 1;
        self.issued.set(seq);

        let (users, health) = tokio::join!(self.dispatcher.list_users(), self.dispatcher.fetch_health());

        if seq != self.issued.get() {
            warn!("Discarding directory refresh #{} (latest is #{})", seq, self.issued.get());
            return Ok(());
        }

        let mut failure = None;

        match users {
            Ok(users) => {
                debug!("Loaded {} enrolled user(s)", users.len());
                *self.users.borrow_mut() = users;
            }
            Err(e) => {
                self.notifier.error(format!("Failed to load users: {}", e.user_message()));
                failure = Some(e);
            }
        }

        match health {
            Ok(health) => *self.health.borrow_mut() = Some(health),
            Err(e) => {
                self.notifier.error(format!("Failed to load system health: {}", e.user_message()));
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
