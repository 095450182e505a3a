use std::collections::HashMap;
use std::path::Path;

use evb_core::RepoId;
use serde::{Deserialize, Serialize};

use crate::error::EnvironmentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub container_id: String,
    pub image_tag: String,
}

/// `owner_name -> recommended runtime version`, e.g. the Python version a
/// repo's CI pins, read from `swap/recommended_python_version.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeVersionManifest(pub HashMap<String, String>);

impl RuntimeVersionManifest {
    pub fn load(path: &Path) -> Result<Self, EnvironmentError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EnvironmentError::Io {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| EnvironmentError::Manifest {
            path: path.to_string_lossy().into_owned(),
            source,
        })
    }

    pub fn version_for(&self, repo_name: &str, default: &str) -> String {
        self.0
            .get(repo_name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Cache key for a built image: one image per (repo, dataset task number).
pub fn image_cache_key(repo: &RepoId, number: u64) -> String {
    format!("evb-{}-{}", repo.repo_name(), number)
}

/// Render a Dockerfile parameterized by the repo's runtime version, proxy,
/// and host UID/GID (so files written inside the container remain readable
/// by the host once bind-mounted logs come back out).
pub fn render_dockerfile(
    base_image: &str,
    runtime_version: &str,
    proxy: Option<&str>,
    host_uid: u32,
    host_gid: u32,
) -> String {
    let mut dockerfile = format!("FROM {base_image}\nARG RUNTIME_VERSION={runtime_version}\n");
    if let Some(proxy) = proxy {
        dockerfile.push_str(&format!("ENV HTTP_PROXY={proxy}\nENV HTTPS_PROXY={proxy}\n"));
    }
    dockerfile.push_str(&format!(
        "ARG HOST_UID={host_uid}\nARG HOST_GID={host_gid}\n\
         RUN groupadd -g ${{HOST_GID}} evb || true && \\\n    \
         useradd -m -u ${{HOST_UID}} -g ${{HOST_GID}} evb || true\n"
    ));
    dockerfile
}
