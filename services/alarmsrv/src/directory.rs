//! Device directory - device id to owning site lookup

use std::collections::HashMap;

/// Lookup from device identifier to its owning site
///
/// `None` means the device is unknown and its readings are skipped.
pub trait DeviceDirectory: Send + Sync {
    fn site_of(&self, device_id: &str) -> Option<String>;
}

/// Directory built once from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceDirectory {
    sites: HashMap<String, String>,
}

impl StaticDeviceDirectory {
    pub fn new(sites: HashMap<String, String>) -> Self {
        Self { sites }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl FromIterator<(String, String)> for StaticDeviceDirectory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl DeviceDirectory for StaticDeviceDirectory {
    fn site_of(&self, device_id: &str) -> Option<String> {
        self.sites.get(device_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let directory: StaticDeviceDirectory =
            [("dev-1".to_string(), "site-a".to_string())].into_iter().collect();
        assert_eq!(directory.site_of("dev-1").as_deref(), Some("site-a"));
        assert_eq!(directory.site_of("dev-2"), None);
        assert_eq!(directory.len(), 1);
    }
}
