//! The try-on studio: one signed-in session choosing between uploading a
//! file, taking a photo, or typing measurements.

mod camera;
mod orchestrator;
mod shutdown;
mod types;


pub use orchestrator::TryOnStudio;
pub use types::AcquisitionPath;
