use async_trait::async_trait;

use crate::protocol::DeviceId;

/// Resolves a device id to a display name. An external collaborator; the
/// core never invents names itself.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn resolve_name(&self, device_id: &DeviceId) -> String;
}

/// Falls back to echoing the device id when no richer directory (e.g. a
/// user-profile service) is configured.
pub struct EchoPlayerDirectory;

#[async_trait]
impl PlayerDirectory for EchoPlayerDirectory {
    async fn resolve_name(&self, device_id: &DeviceId) -> String {
        device_id.clone()
    }
}
