//! Per-tab controllers and the session that owns them.
//!
//! Controllers are driven from a single-threaded event loop. Their state
//! lives in `Cell`/`RefCell` and is never borrowed across an `.await`, so
//! the enroll and verify forms can have requests in flight at the same time.

mod directory;
mod enroll;
mod manage;
mod verify;

pub use directory::Directory;
pub use enroll::EnrollController;
pub use manage::{Confirm, DeleteState, ManageController};
pub use verify::{AcquisitionMode, PanelStyle, ResultPanel, VerifyController};

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;

use crate::api::{FaceAuthApi, HttpApi};
use crate::camera::{CameraProvider, DefaultCameraProvider};
use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::media::MediaAcquirer;
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStatus {
    Idle,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Enroll,
    Verify,
    Manage,
}

pub struct Session {
    notifier: Notifier,
    directory: Rc<Directory>,
    enroll: EnrollController,
    verify: VerifyController,
    manage: ManageController,
    active: Cell<Tab>,
}

impl Session {
    pub fn new(config: &ClientConfig, api: Arc<dyn FaceAuthApi>, camera: Box<dyn CameraProvider>) -> Self {
        let notifier = Notifier::new(config.notifications.ttl());
        let dispatcher = Dispatcher::new(api);
        let acquirer = MediaAcquirer::new(&config.media);
        let directory = Rc::new(Directory::new(dispatcher.clone(), notifier.clone()));

        let enroll = EnrollController::new(
            dispatcher.clone(),
            acquirer.clone(),
            notifier.clone(),
            Rc::clone(&directory),
        );
        let verify = VerifyController::new(
            dispatcher.clone(),
            acquirer,
            notifier.clone(),
            camera,
            config.camera.clone(),
        );
        let manage = ManageController::new(dispatcher, notifier.clone(), Rc::clone(&directory));

        Self {
            notifier,
            directory,
            enroll,
            verify,
            manage,
            active: Cell::new(Tab::Enroll),
        }
    }

    /// A session talking HTTP to the configured service.
    pub fn connect(config: &ClientConfig) -> Self {
        let api = Arc::new(HttpApi::new(&config.service));
        Self::new(config, api, Box::new(DefaultCameraProvider))
    }

    /// Initial load of the users list and health summary.
    pub async fn load(&self) {
        let _ = self.directory.refresh().await;
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn enroll(&self) -> &EnrollController {
        &self.enroll
    }

    pub fn verify(&self) -> &VerifyController {
        &self.verify
    }

    pub fn manage(&self) -> &ManageController {
        &self.manage
    }

    pub fn active_tab(&self) -> Tab {
        self.active.get()
    }

    /// Leaving a tab discards its pending image; leaving verify also
    /// releases the camera.
    pub fn switch_tab(&self, tab: Tab) {
        let previous = self.active.replace(tab);
        if previous == tab {
            return;
        }
        debug!("Switching tab {:?} -> {:?}", previous, tab);
        match previous {
            Tab::Enroll => self.enroll.clear_image(),
            Tab::Verify => self.verify.leave(),
            Tab::Manage => {}
        }
    }
}
