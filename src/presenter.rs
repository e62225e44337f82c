//! Projection of the pipeline status into a user-facing banner.

use crate::pipeline::{PipelineStatus, StatusSnapshot};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tone {
    Progress,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub tone: Tone,
    pub title: String,
    pub message: String,
    /// Avatar preview, present once a photo is stored
    pub image_url: Option<String>,
}

impl Banner {
    fn progress(title: &str, message: &str) -> Self {
        Self {
            tone: Tone::Progress,
            title: title.to_string(),
            message: message.to_string(),
            image_url: None,
        }
    }
}

/// Banner for a status; `Idle` shows nothing
pub fn render(status: &PipelineStatus) -> Option<Banner> {
    match status {
        PipelineStatus::Idle => None,
        PipelineStatus::Validating => Some(Banner::progress("Checking photo", "Validating your photo")),
        PipelineStatus::Uploading => Some(Banner::progress("Uploading", "Uploading your photo")),
        PipelineStatus::Processing => {
            Some(Banner::progress("Processing", "Saving the photo to your profile"))
        }
        PipelineStatus::Succeeded(reference) => Some(Banner {
            tone: Tone::Success,
            title: "Photo saved".to_string(),
            message: "Your try-on avatar is ready".to_string(),
            image_url: Some(reference.url.clone()),
        }),
        PipelineStatus::Failed(reason) => Some(Banner {
            tone: Tone::Error,
            title: reason.kind.title().to_string(),
            message: reason.message.clone(),
            image_url: None,
        }),
    }
}

/// Running presenter task and the banner channel it feeds
pub struct PresenterHandle {
    banner_rx: watch::Receiver<Option<Banner>>,
    task: Option<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl PresenterHandle {
    pub fn banner(&self) -> Option<Banner> {
        self.banner_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Banner>> {
        self.banner_rx.clone()
    }

    /// Stop following the pipeline; the last banner stays readable
    pub async fn shutdown(mut self) {
        self.cancellation_token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PresenterHandle {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

pub struct StatusPresenter;

impl StatusPresenter {
    /// Follow `status_rx`, rendering every change and clearing terminal
    /// banners after `clear_delay`
    pub fn spawn(
        mut status_rx: watch::Receiver<StatusSnapshot>,
        clear_delay: Duration,
    ) -> PresenterHandle {
        let initial = render(&status_rx.borrow_and_update().status);
        let (banner_tx, banner_rx) = watch::channel(initial);
        let banner_tx = Arc::new(banner_tx);
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        let task = tokio::spawn(async move {
            let mut clear_timer: Option<JoinHandle<()>> = None;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Status presenter stopping");
                        break;
                    }
                    changed = status_rx.changed() => {
                        if changed.is_err() {
                            debug!("Pipeline status channel closed");
                            break;
                        }
                    }
                }

                let snapshot = status_rx.borrow_and_update().clone();
                if let Some(timer) = clear_timer.take() {
                    timer.abort();
                }

                let banner = render(&snapshot.status);
                debug!(
                    "Submission {} banner: {:?}",
                    snapshot.submission,
                    banner.as_ref().map(|b| &b.title)
                );
                banner_tx.send_replace(banner);

                if snapshot.status.is_terminal() {
                    let banner_tx = Arc::clone(&banner_tx);
                    clear_timer = Some(tokio::spawn(async move {
                        sleep(clear_delay).await;
                        banner_tx.send_replace(None);
                    }));
                }
            }

            if let Some(timer) = clear_timer.take() {
                timer.abort();
            }
            info!("Status presenter stopped");
        });

        PresenterHandle {
            banner_rx,
            task: Some(task),
            cancellation_token,
        }
    }
}
