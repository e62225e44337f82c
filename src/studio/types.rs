/// The three mutually exclusive ways of feeding the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPath {
    Upload,
    Camera,
    Manual,
}

impl AcquisitionPath {
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionPath::Upload => "upload",
            AcquisitionPath::Camera => "camera",
            AcquisitionPath::Manual => "manual",
        }
    }
}
