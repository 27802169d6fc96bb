//! Device and bundle metadata carried in the bootstrap payload.

/// Host application metadata. Every field defaults to an empty string so a
/// payload built from partial information stays well-formed.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub os_version: String,
    pub model: String,
    pub bundle_id: String,
}

impl DeviceInfo {
    /// Best-effort detection for embedders that do not supply their own
    /// metadata. The bundle identifier has no portable source and must be
    /// passed in.
    pub fn detect(bundle_id: impl Into<String>) -> Self {
        let info = os_info::get();
        Self {
            os_version: info.version().to_string(),
            model: std::env::consts::ARCH.to_string(),
            bundle_id: bundle_id.into(),
        }
    }
}
