//! Turns a `Spec` into a ready container. The only place in this harness
//! that runs an async runtime — everything above this seam stays on plain
//! OS threads and synchronous `CommandExecutor` calls.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use evb_core::{HarnessConfig, Spec};

use crate::error::EnvironmentError;
use crate::runtime_trait::ContainerRuntime;
use crate::types::{image_cache_key, render_dockerfile, ContainerHandle, RuntimeVersionManifest};

pub struct EnvironmentManager<R: ContainerRuntime> {
    tokio_runtime: tokio::runtime::Runtime,
    container_runtime: R,
    config: HarnessConfig,
}

impl<R: ContainerRuntime> EnvironmentManager<R> {
    pub fn new(container_runtime: R, config: HarnessConfig) -> Result<Self, EnvironmentError> {
        let tokio_runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| EnvironmentError::RuntimeInit {
                message: err.to_string(),
            })?;
        Ok(Self {
            tokio_runtime,
            container_runtime,
            config,
        })
    }

    /// Build (if needed) and start a container for `spec`, consulting the
    /// per-`(repo, task-number)` image cache first.
    pub fn acquire_container(
        &self,
        spec: &Spec,
        manifest: &RuntimeVersionManifest,
    ) -> Result<ContainerHandle, EnvironmentError> {
        self.acquire_container_with(spec, manifest, false)
    }

    /// `--test-only` entry point: the image must already exist. No Dockerfile
    /// is rendered and no build is attempted, so a missing image fails fast
    /// instead of silently paying for a build the caller asked to skip.
    pub fn acquire_prebuilt_container(
        &self,
        spec: &Spec,
        manifest: &RuntimeVersionManifest,
    ) -> Result<ContainerHandle, EnvironmentError> {
        self.acquire_container_with(spec, manifest, true)
    }

    fn acquire_container_with(
        &self,
        spec: &Spec,
        manifest: &RuntimeVersionManifest,
        require_prebuilt: bool,
    ) -> Result<ContainerHandle, EnvironmentError> {
        let tag = image_cache_key(&spec.repo, spec.number);
        let base_image = self.config.container.default_image.clone();
        let proxy = self
            .config
            .proxy
            .as_ref()
            .and_then(|proxy| proxy.https_proxy.clone().or_else(|| proxy.http_proxy.clone()));
        let (host_uid, host_gid) = host_ids();

        self.tokio_runtime.block_on(async {
            let exists = self.container_runtime.image_exists(&tag).await?;
            if !exists {
                if require_prebuilt {
                    return Err(EnvironmentError::ImageBuildError {
                        repo: tag.clone(),
                        reason: "no pre-built image found and --test-only skips image builds".to_string(),
                    });
                }
                let version = manifest.version_for(spec.repo.repo_name(), &base_image);
                let dockerfile =
                    render_dockerfile(&base_image, &version, proxy.as_deref(), host_uid, host_gid);
                self.container_runtime.build_image(&tag, &dockerfile).await?;
            }

            let container_id = self
                .container_runtime
                .create_container(&tag, &format!("evb-{}", spec.instance_id))
                .await?;

            Ok(ContainerHandle {
                container_id,
                image_tag: tag,
            })
        })
    }

    /// `forceRemove=true` stops and removes the container; otherwise it is
    /// left running as a warm cache entry.
    pub fn cleanup(&self, handle: &ContainerHandle, force_remove: bool) -> Result<(), EnvironmentError> {
        if !force_remove {
            return Ok(());
        }
        self.tokio_runtime
            .block_on(self.container_runtime.stop_and_remove(&handle.container_id))
    }

    /// Signal-triggered cleanup path: prompt per container, default to
    /// *keep* if stdin hits EOF (non-interactive session, e.g. under a
    /// signal handler with no attached terminal).
    pub fn interactive_cleanup(&self, handles: &[ContainerHandle]) {
        for handle in handles {
            if !prompt_keep_container(&handle.container_id) {
                if let Err(err) = self.cleanup(handle, true) {
                    tracing::warn!(container_id = %handle.container_id, error = %err, "cleanup failed");
                }
            }
        }
    }
}

fn prompt_keep_container(container_id: &str) -> bool {
    use std::io::Write;
    print!("Keep container {container_id} running? [Y/n] ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) => true,
        Ok(_) => !line.trim().eq_ignore_ascii_case("n"),
        Err(_) => true,
    }
}

/// Host UID/GID, read off the owner of the current working directory since
/// the standard library exposes no direct `getuid()`/`getgid()`.
pub fn host_ids() -> (u32, u32) {
    match std::fs::metadata(Path::new(".")) {
        Ok(meta) => (meta.uid(), meta.gid()),
        Err(_) => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRuntime {
        existing_images: Mutex<Vec<String>>,
        build_calls: AtomicUsize,
        removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn image_exists(&self, tag: &str) -> Result<bool, EnvironmentError> {
            Ok(self.existing_images.lock().unwrap().iter().any(|t| t == tag))
        }

        async fn build_image(&self, tag: &str, _dockerfile: &str) -> Result<(), EnvironmentError> {
            self.build_calls.fetch_add(1, Ordering::SeqCst);
            self.existing_images.lock().unwrap().push(tag.to_string());
            Ok(())
        }

        async fn create_container(&self, tag: &str, _name: &str) -> Result<String, EnvironmentError> {
            Ok(format!("container-for-{tag}"))
        }

        async fn stop_and_remove(&self, container_id: &str) -> Result<(), EnvironmentError> {
            self.removed.lock().unwrap().push(container_id.to_string());
            Ok(())
        }
    }

    fn mk_spec() -> Spec {
        use evb_core::{DiffPayload, InstanceId, RepoId, TestIdList};
        Spec {
            instance_id: InstanceId("demo-1".to_string()),
            repo: RepoId("astropy/astropy".to_string()),
            base_commit: "deadbeef".to_string(),
            problem_statement: "fix it".to_string(),
            patch: DiffPayload::Unified(String::new()),
            test_patch: DiffPayload::Unified(String::new()),
            fail_to_pass: TestIdList::default(),
            pass_to_pass: TestIdList::default(),
            created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            number: 7,
        }
    }

    #[test]
    fn acquire_container_builds_image_only_once_per_tag() {
        let manager = EnvironmentManager::new(FakeRuntime::default(), HarnessConfig::default())
            .expect("manager");
        let spec = mk_spec();
        let manifest = RuntimeVersionManifest::default();

        let first = manager.acquire_container(&spec, &manifest).expect("first");
        let second = manager.acquire_container(&spec, &manifest).expect("second");

        assert_eq!(first.image_tag, second.image_tag);
        assert_eq!(manager.container_runtime.build_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn acquire_prebuilt_container_fails_fast_when_image_is_missing() {
        let manager = EnvironmentManager::new(FakeRuntime::default(), HarnessConfig::default())
            .expect("manager");
        let spec = mk_spec();
        let manifest = RuntimeVersionManifest::default();

        let err = manager
            .acquire_prebuilt_container(&spec, &manifest)
            .expect_err("missing image must fail");
        assert!(matches!(err, EnvironmentError::ImageBuildError { .. }));
        assert_eq!(manager.container_runtime.build_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn acquire_prebuilt_container_succeeds_once_the_image_exists() {
        let manager = EnvironmentManager::new(FakeRuntime::default(), HarnessConfig::default())
            .expect("manager");
        let spec = mk_spec();
        let manifest = RuntimeVersionManifest::default();

        manager.acquire_container(&spec, &manifest).expect("build once");
        let handle = manager
            .acquire_prebuilt_container(&spec, &manifest)
            .expect("reuse existing image");
        assert_eq!(handle.image_tag, "evb-astropy-7");
        assert_eq!(manager.container_runtime.build_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_leaves_container_running_unless_forced() {
        let manager = EnvironmentManager::new(FakeRuntime::default(), HarnessConfig::default())
            .expect("manager");
        let handle = ContainerHandle {
            container_id: "c1".to_string(),
            image_tag: "evb-astropy-7".to_string(),
        };

        manager.cleanup(&handle, false).expect("cleanup");
        assert!(manager.container_runtime.removed.lock().unwrap().is_empty());

        manager.cleanup(&handle, true).expect("cleanup");
        assert_eq!(
            manager.container_runtime.removed.lock().unwrap().as_slice(),
            &["c1".to_string()]
        );
    }
}
