use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{info, warn};

use super::Directory;
use crate::api::{Ack, EnrolledUserSummary, SystemHealth};
use crate::dispatcher::{ConfirmedDeletion, Dispatcher};
use crate::error::{ApiError, SubmitError};
use crate::notify::Notifier;

/// Asks the operator a yes/no question.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Per-row deletion state. Rows without an entry are idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteState {
    #[default]
    Idle,
    ConfirmPending,
    Submitting,
}

pub struct ManageController {
    dispatcher: Dispatcher,
    notifier: Notifier,
    directory: Rc<Directory>,
    rows: RefCell<HashMap<String, DeleteState>>,
}

impl ManageController {
    pub fn new(dispatcher: Dispatcher, notifier: Notifier, directory: Rc<Directory>) -> Self {
        Self {
            dispatcher,
            notifier,
            directory,
            rows: RefCell::new(HashMap::new()),
        }
    }

    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.directory.refresh().await
    }

    pub fn users(&self) -> Vec<EnrolledUserSummary> {
        self.directory.users()
    }

    pub fn health(&self) -> Option<SystemHealth> {
        self.directory.health()
    }

    pub fn delete_state(&self, user_id: &str) -> DeleteState {
        self.rows.borrow().get(user_id).copied().unwrap_or_default()
    }

    pub fn confirmation_prompt(user_id: &str) -> String {
        format!("Are you sure you want to delete face data for {}?", user_id)
    }

    /// First step of a deletion: the row waits for the operator's answer.
    /// A row that is already deleting is left alone.
    pub fn request_delete(&self, user_id: &str) -> DeleteState {
        let mut rows = self.rows.borrow_mut();
        let state = rows.entry(user_id.to_string()).or_default();
        if *state == DeleteState::Idle {
            *state = DeleteState::ConfirmPending;
        }
        *state
    }

    /// Declining the confirmation returns the row to idle without a request.
    pub fn cancel_delete(&self, user_id: &str) {
        let mut rows = self.rows.borrow_mut();
        if rows.get(user_id) == Some(&DeleteState::ConfirmPending) {
            rows.remove(user_id);
            info!("Deletion of '{}' cancelled", user_id);
        }
    }

    /// Issues the DELETE for a row whose confirmation is pending.
    pub async fn confirm_delete(&self, user_id: &str) -> Result<Ack, SubmitError> {
        {
            let mut rows = self.rows.borrow_mut();
            match rows.get_mut(user_id) {
                Some(state) if *state == DeleteState::ConfirmPending => *state = DeleteState::Submitting,
                _ => return Err(SubmitError::NotConfirmed(user_id.to_string())),
            }
        }

        let result = self
            .dispatcher
            .delete_user(ConfirmedDeletion::new(user_id.to_string()))
            .await;
        self.rows.borrow_mut().remove(user_id);

        match result {
            Ok(ack) => {
                info!("Deleted face data for '{}'", user_id);
                self.notifier.success(format!("Deleted face data for {}", user_id));
                let _ = self.directory.refresh().await;
                Ok(ack)
            }
            Err(e) => {
                warn!("Deletion of '{}' failed: {}", user_id, e);
                self.notifier.error(e.user_message());
                Err(e.into())
            }
        }
    }

    /// Request, confirm and dispatch in one go.
    pub async fn delete_with(&self, user_id: &str, confirm: &dyn Confirm) -> Result<Ack, SubmitError> {
        match self.request_delete(user_id) {
            DeleteState::ConfirmPending => {}
            DeleteState::Submitting => return Err(SubmitError::AlreadyInFlight),
            DeleteState::Idle => return Err(SubmitError::NotConfirmed(user_id.to_string())),
        }

        if confirm.confirm(&Self::confirmation_prompt(user_id)) {
            self.confirm_delete(user_id).await
        } else {
            self.cancel_delete(user_id);
            Err(SubmitError::Cancelled(user_id.to_string()))
        }
    }
}
