//! Locating or building the child executable
//!
//! Looks for a prebuilt binary in the project root and falls back to
//! compiling one from source with the configured compiler.
//!
//! # Example
//!
//! ```no_run
//! use clibridge::bootstrap::{BinaryResolver, Bootstrap};
//! use clibridge::BootstrapConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bootstrap = Bootstrap::new(BootstrapConfig::new("/srv/shm"));
//! let binary = bootstrap.resolve().await?;
//! println!("using {}", binary.display());
//! # Ok(())
//! # }
//! ```

use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Produces the path of the executable a session should launch
#[async_trait]
pub trait BinaryResolver: Send + Sync {
    /// Locate (or build) the executable
    async fn resolve(&self) -> Result<PathBuf, BootstrapError>;
}

/// Resolver for an executable whose path is already known
#[derive(Debug, Clone)]
pub struct FixedBinary(pub PathBuf);

#[async_trait]
impl BinaryResolver for FixedBinary {
    async fn resolve(&self) -> Result<PathBuf, BootstrapError> {
        Ok(self.0.clone())
    }
}

/// Locate-or-build resolver driven by a [`BootstrapConfig`]
#[derive(Debug, Clone)]
pub struct Bootstrap {
    config: BootstrapConfig,
}

impl Bootstrap {
    /// Create a resolver
    pub fn new(config: BootstrapConfig) -> Self {
        Self { config }
    }

    /// Bootstrap configuration
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// First candidate that exists as a regular file in the root
    ///
    /// Returns an absolute path, or `None` if the root does not exist.
    pub fn locate(&self) -> Option<PathBuf> {
        let root = self.project_root().ok()?;
        self.locate_in(&root)
    }

    /// Compile the executable from source
    ///
    /// Runs `<compiler> <flags..> <root/source..> -o <root/output>` in the
    /// root directory, with every path absolute.
    pub async fn build(&self) -> Result<PathBuf, BootstrapError> {
        let root = self.project_root()?;
        self.build_in(&root).await
    }

    /// The root as an absolute path
    ///
    /// Every path handed out is joined onto this, never onto a relative root:
    /// the child and the compiler both run with the root as working directory.
    fn project_root(&self) -> Result<PathBuf, BootstrapError> {
        let root = &self.config.root;
        match std::fs::canonicalize(root) {
            Ok(path) if path.is_dir() => Ok(path),
            _ => Err(BootstrapError::MissingRoot(root.clone())),
        }
    }

    fn locate_in(&self, root: &Path) -> Option<PathBuf> {
        self.config
            .candidates
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    async fn build_in(&self, root: &Path) -> Result<PathBuf, BootstrapError> {
        let output = root.join(&self.config.output_name);

        let mut cmd = Command::new(&self.config.compiler);
        cmd.args(&self.config.flags)
            .args(self.config.sources.iter().map(|source| root.join(source)))
            .arg("-o")
            .arg(&output)
            .current_dir(root)
            .stdin(Stdio::null());

        info!(compiler = %self.config.compiler, output = %output.display(), "building CLI binary");

        let result = cmd
            .output()
            .await
            .map_err(|source| BootstrapError::CompilerSpawn {
                compiler: self.config.compiler.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(BootstrapError::CompilerFailed {
                status: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl BinaryResolver for Bootstrap {
    async fn resolve(&self) -> Result<PathBuf, BootstrapError> {
        let root = self.project_root()?;

        if let Some(path) = self.locate_in(&root) {
            debug!(path = %path.display(), "found prebuilt CLI binary");
            return Ok(path);
        }

        self.build_in(&root).await
    }
}
