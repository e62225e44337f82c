use super::TryOnStudio;
use tracing::info;

impl TryOnStudio {
    /// Release the camera and stop the presenter
    pub async fn shutdown(mut self) {
        info!("Shutting down try-on studio");

        self.close_camera();
        if let Some(presenter) = self.presenter.take() {
            presenter.shutdown().await;
        }

        info!("Try-on studio shut down");
    }
}

impl Drop for TryOnStudio {
    fn drop(&mut self) {
        self.close_camera();
    }
}
