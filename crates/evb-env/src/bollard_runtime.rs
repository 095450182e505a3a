//! `ContainerRuntime` backed by the real Docker Engine API.

use async_trait::async_trait;
use bollard::container::{Config, CreateContainerOptions, RemoveContainerOptions, StopContainerOptions};
use bollard::image::BuildImageOptions;
use bollard::Docker;
use futures_util::StreamExt;

use crate::error::EnvironmentError;
use crate::runtime_trait::ContainerRuntime;

pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    pub fn connect() -> Result<Self, EnvironmentError> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|err| EnvironmentError::RuntimeInit {
                message: err.to_string(),
            })?;
        Ok(Self { docker })
    }

    fn dockerfile_tar(dockerfile: &str) -> std::io::Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());
        let bytes = dockerfile.as_bytes();
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "Dockerfile", bytes)?;
        builder.into_inner()
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn image_exists(&self, tag: &str) -> Result<bool, EnvironmentError> {
        Ok(self.docker.inspect_image(tag).await.is_ok())
    }

    async fn build_image(&self, tag: &str, dockerfile: &str) -> Result<(), EnvironmentError> {
        let tar = Self::dockerfile_tar(dockerfile).map_err(|err| EnvironmentError::ImageBuildError {
            repo: tag.to_string(),
            reason: err.to_string(),
        })?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(tar.into()));

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(info) => {
                    if let Some(stream_line) = info.stream {
                        tracing::debug!(target: "evb_env::build", "{}", stream_line.trim_end());
                    }
                    if let Some(error) = info.error {
                        return Err(EnvironmentError::ImageBuildError {
                            repo: tag.to_string(),
                            reason: error,
                        });
                    }
                }
                Err(err) => {
                    return Err(EnvironmentError::ImageBuildError {
                        repo: tag.to_string(),
                        reason: err.to_string(),
                    })
                }
            }
        }

        Ok(())
    }

    async fn create_container(&self, tag: &str, name: &str) -> Result<String, EnvironmentError> {
        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };
        let config = Config {
            image: Some(tag.to_string()),
            tty: Some(true),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|err| EnvironmentError::ContainerCreationError {
                repo: tag.to_string(),
                reason: err.to_string(),
            })?;

        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .map_err(|err| EnvironmentError::ContainerCreationError {
                repo: tag.to_string(),
                reason: err.to_string(),
            })?;

        Ok(created.id)
    }

    async fn stop_and_remove(&self, container_id: &str) -> Result<(), EnvironmentError> {
        let _ = self
            .docker
            .stop_container(container_id, Some(StopContainerOptions { t: 10 }))
            .await;

        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|err| EnvironmentError::ContainerOperationError {
                container_id: container_id.to_string(),
                reason: err.to_string(),
            })
    }
}
