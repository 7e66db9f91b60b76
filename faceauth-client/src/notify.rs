//! Transient status messages shared by every tab.
//!
//! Only one notification is active at a time. Raising a new one replaces the
//! previous one and restarts the expiry clock; there is no queue.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub raised_at: Instant,
    pub expires_at: Instant,
}

impl Notification {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

type Listener = Rc<dyn Fn(&Notification)>;

struct Inner {
    ttl: Duration,
    current: Option<Notification>,
    listener: Option<Listener>,
}

/// Cheap-to-clone handle onto the single notification slot.
#[derive(Clone)]
pub struct Notifier {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Notifier")
            .field("ttl", &inner.ttl)
            .field("current", &inner.current)
            .field("has_listener", &inner.listener.is_some())
            .finish()
    }
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                ttl,
                current: None,
                listener: None,
            })),
        }
    }

    /// Called synchronously for every raised notification.
    pub fn set_listener<F>(&self, listener: F)
    where
        F: Fn(&Notification) + 'static,
    {
        self.inner.borrow_mut().listener = Some(Rc::new(listener));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.raise(message, Severity::Info);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.raise(message, Severity::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.raise(message, Severity::Error);
    }

    pub fn raise(&self, message: impl Into<String>, severity: Severity) {
        self.raise_at(message, severity, Instant::now());
    }

    pub fn raise_at(&self, message: impl Into<String>, severity: Severity, now: Instant) {
        let notification = {
            let mut inner = self.inner.borrow_mut();
            let notification = Notification {
                message: message.into(),
                severity,
                raised_at: now,
                expires_at: now + inner.ttl,
            };
            inner.current = Some(notification.clone());
            notification
        };

        log::debug!("Notification ({}): {}", notification.severity, notification.message);

        let listener = self.inner.borrow().listener.clone();
        if let Some(listener) = listener {
            listener(&notification);
        }
    }

    pub fn current(&self) -> Option<Notification> {
        self.current_at(Instant::now())
    }

    /// The active notification as seen at `now`; expired ones are dropped.
    pub fn current_at(&self, now: Instant) -> Option<Notification> {
        let mut inner = self.inner.borrow_mut();
        if inner.current.as_ref().is_some_and(|n| n.is_expired_at(now)) {
            inner.current = None;
        }
        inner.current.clone()
    }

    pub fn dismiss(&self) {
        self.inner.borrow_mut().current = None;
    }
}
