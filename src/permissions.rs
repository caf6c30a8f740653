//! Capability grants
//!
//! Stands in for platform permission prompts: the navigator asks a
//! [`PermissionGate`] before starting location updates or the microphone.

use std::fmt;

use async_trait::async_trait;

use crate::config::PermissionsConfig;

/// A capability the navigator needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    FineLocation,
    CoarseLocation,
    Microphone,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FineLocation => "fine location",
            Self::CoarseLocation => "coarse location",
            Self::Microphone => "microphone",
        };
        f.write_str(name)
    }
}

/// Permissions required before location updates start
pub const LOCATION_PERMISSIONS: [Permission; 2] =
    [Permission::FineLocation, Permission::CoarseLocation];

/// Grants or denies capabilities
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Whether `permission` is currently granted
    fn is_granted(&self, permission: Permission) -> bool;

    /// Ask for every permission in `permissions`; true only if all are granted
    async fn request(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.is_granted(*p))
    }
}

/// Grants taken from the `[permissions]` config section
#[derive(Debug, Clone, Copy)]
pub struct ConfigPermissions {
    config: PermissionsConfig,
}

impl ConfigPermissions {
    #[must_use]
    pub const fn new(config: PermissionsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PermissionGate for ConfigPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::FineLocation | Permission::CoarseLocation => self.config.location,
            Permission::Microphone => self.config.microphone,
        }
    }
}
