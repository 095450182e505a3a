use async_trait::async_trait;

use crate::error::EnvironmentError;

/// Narrow seam over the Docker Engine API, so the environment manager and
/// its tests can substitute a fake runtime without a real daemon.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn image_exists(&self, tag: &str) -> Result<bool, EnvironmentError>;
    async fn build_image(&self, tag: &str, dockerfile: &str) -> Result<(), EnvironmentError>;
    async fn create_container(&self, tag: &str, name: &str) -> Result<String, EnvironmentError>;
    async fn stop_and_remove(&self, container_id: &str) -> Result<(), EnvironmentError>;
}
