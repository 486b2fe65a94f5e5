// ── Firmware version ──

use std::fmt;
use std::str::FromStr;

use inspect_api::node::models::ProductVersion;

/// Placeholder shown when the product version is unknown.
pub const UNKNOWN_VERSION: &str = "----";

/// Four-part firmware version, `major.minor.service.build`.
///
/// Missing trailing components parse as zero, so `1.1` orders before
/// `1.1.0.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub service: u32,
    pub build: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, service: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            service,
            build,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.service, self.build
        )
    }
}

impl From<&ProductVersion> for FirmwareVersion {
    fn from(v: &ProductVersion) -> Self {
        Self::new(v.major, v.minor, v.service, v.build)
    }
}

/// Error from parsing a [`FirmwareVersion`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid firmware version: {0:?}")]
pub struct ParseVersionError(String);

impl FromStr for FirmwareVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_owned());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(err());
        }

        let mut nums = [0_u32; 4];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| err())?;
        }
        let [major, minor, service, build] = nums;
        Ok(Self::new(major, minor, service, build))
    }
}
