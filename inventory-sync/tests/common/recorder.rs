use std::sync::{Arc, Mutex};

use inventory_sync::broadcast::{
    BroadcastContext, ListenerRegistration, ProgressBroadcaster, ResultBroadcaster,
    ResultNotification,
};
use inventory_sync::types::{JobProgressMessage, JobStep, SyncResult};
use tokio::sync::Notify;

use crate::common::notify::TimedNotify;

/// Listener pair recording everything delivered by a progress and a result broadcaster.
#[derive(Clone, Default)]
pub struct Recorder {
    progress: Arc<Mutex<Vec<(JobProgressMessage, BroadcastContext)>>>,
    notifications: Arc<Mutex<Vec<(ResultNotification, BroadcastContext)>>>,
    text_received: Arc<Notify>,
}

impl Recorder {
    /// Registers a recorder on both broadcasters.
    pub fn attach(
        progress_broadcaster: &ProgressBroadcaster,
        result_broadcaster: &ResultBroadcaster,
    ) -> (Self, Vec<ListenerRegistration>) {
        let recorder = Self::default();

        let progress = recorder.progress.clone();
        let progress_registration = progress_broadcaster.register(move |message, context| {
            progress.lock().unwrap().push((message.clone(), *context));
        });

        let notifications = recorder.notifications.clone();
        let text_received = recorder.text_received.clone();
        let result_registration = result_broadcaster.register(move |notification, context| {
            notifications
                .lock()
                .unwrap()
                .push((notification.clone(), *context));
            if matches!(notification, ResultNotification::Text(_)) {
                text_received.notify_one();
            }
        });

        (recorder, vec![progress_registration, result_registration])
    }

    /// Returns a waiter that resolves once a text notification has been delivered.
    pub fn text_received(&self) -> TimedNotify {
        TimedNotify::new(self.text_received.clone())
    }

    pub fn progress(&self) -> Vec<JobProgressMessage> {
        self.progress
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    pub fn progress_for(&self, step: JobStep) -> Vec<JobProgressMessage> {
        self.progress()
            .into_iter()
            .filter(|message| message.step() == step)
            .collect()
    }

    pub fn contexts(&self) -> Vec<BroadcastContext> {
        let progress = self.progress.lock().unwrap();
        let notifications = self.notifications.lock().unwrap();
        progress
            .iter()
            .map(|(_, context)| *context)
            .chain(notifications.iter().map(|(_, context)| *context))
            .collect()
    }

    pub fn notifications(&self) -> Vec<ResultNotification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|(notification, _)| notification.clone())
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                ResultNotification::Text(text) => Some(text),
                ResultNotification::Results(_) => None,
            })
            .collect()
    }

    pub fn broadcast_results(&self) -> Vec<Arc<Vec<SyncResult>>> {
        self.notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                ResultNotification::Results(results) => Some(results),
                ResultNotification::Text(_) => None,
            })
            .collect()
    }
}
