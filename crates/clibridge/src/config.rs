//! Session, bootstrap and bridge configuration

use clibridge_transport::ProcessConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Prompt marker printed by the child when it is ready for the next command
pub const DEFAULT_PROMPT: &str = "> ";

/// Default time a command waits for the prompt marker
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default time the bridge waits after launching for the banner to settle
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(200);

/// Default time a child gets to exit after `SIGTERM`
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Configuration for a [`ProcessSession`](crate::ProcessSession)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Executable to launch
    pub program: PathBuf,

    /// Arguments passed to the executable
    pub args: Vec<String>,

    /// Working directory of the child (the project root)
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables
    pub env: HashMap<String, String>,

    /// Start the child with an empty environment
    pub clear_env: bool,

    /// Marker that ends every complete response
    pub prompt: String,

    /// Timeout used by [`send_command_default`](crate::ProcessSession::send_command_default)
    pub command_timeout: Duration,

    /// Time the child gets to exit on shutdown before it is killed
    pub shutdown_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("shm_cli"),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            clear_env: false,
            prompt: DEFAULT_PROMPT.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for `program` with default settings
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Clear the inherited environment
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    /// Set the prompt marker
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the default command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Process configuration handed to the transport
    pub(crate) fn process_config(&self) -> ProcessConfig {
        let mut config = ProcessConfig::new(&self.program)
            .with_args(self.args.iter().cloned())
            .with_clear_env(self.clear_env);
        for (key, value) in &self.env {
            config = config.with_env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            config = config.with_working_dir(dir);
        }
        config
    }
}

/// How to locate or build the child executable
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Project root: search directory, build directory and child working directory
    pub root: PathBuf,

    /// Prebuilt executable names, tried in order
    pub candidates: Vec<String>,

    /// Compiler used when no candidate exists
    pub compiler: String,

    /// Flags passed to the compiler before the sources
    pub flags: Vec<String>,

    /// Source files, relative to the root
    pub sources: Vec<String>,

    /// Name of the built executable, relative to the root
    pub output_name: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            candidates: vec![
                "shm_cli".to_string(),
                "shm_cli.exe".to_string(),
                "a.out".to_string(),
            ],
            compiler: "g++".to_string(),
            flags: vec!["-std=c++17".to_string(), "-pthread".to_string()],
            sources: vec![
                "main.cpp".to_string(),
                "SharedMemory.cpp".to_string(),
                "FirstFitAllocator.cpp".to_string(),
            ],
            output_name: "shm_cli".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Create a configuration rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// This will look for:
    /// - `CLIBRIDGE_ROOT` for the project root
    /// - `CXX` for the compiler
    pub fn from_env() -> Self {
        use std::env;

        let mut config = Self::default();

        if let Ok(root) = env::var("CLIBRIDGE_ROOT") {
            config.root = PathBuf::from(root);
        }

        if let Ok(compiler) = env::var("CXX")
            && !compiler.trim().is_empty()
        {
            config.compiler = compiler;
        }

        config
    }

    /// Replace the candidate list
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Set the compiler
    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    /// Replace the compiler flags
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the source list
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the output executable name
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }
}

/// Configuration for a [`Bridge`](crate::Bridge)
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Where the child executable comes from
    pub bootstrap: BootstrapConfig,

    /// Prompt marker of the child
    pub prompt: String,

    /// Timeout for each command
    pub command_timeout: Duration,

    /// Pause after launching so the start-up banner can arrive
    pub startup_grace: Duration,

    /// Time the child gets to exit on shutdown
    pub shutdown_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapConfig::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            startup_grace: DEFAULT_STARTUP_GRACE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with the given bootstrap settings
    pub fn new(bootstrap: BootstrapConfig) -> Self {
        Self {
            bootstrap,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// This will look for:
    /// - `CLIBRIDGE_ROOT` and `CXX` (see [`BootstrapConfig::from_env`])
    /// - `CLIBRIDGE_TIMEOUT_MS` for the command timeout
    /// - `CLIBRIDGE_STARTUP_GRACE_MS` for the start-up pause
    pub fn from_env() -> Self {
        use std::env;

        let mut config = Self::new(BootstrapConfig::from_env());

        if let Ok(timeout_str) = env::var("CLIBRIDGE_TIMEOUT_MS") {
            match timeout_str.parse::<u64>() {
                Ok(ms) => config.command_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!("Ignoring invalid CLIBRIDGE_TIMEOUT_MS: {}", timeout_str),
            }
        }

        if let Ok(grace_str) = env::var("CLIBRIDGE_STARTUP_GRACE_MS") {
            match grace_str.parse::<u64>() {
                Ok(ms) => config.startup_grace = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CLIBRIDGE_STARTUP_GRACE_MS: {}", grace_str)
                }
            }
        }

        config
    }

    /// Set the prompt marker
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the start-up pause
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Session configuration for a resolved executable
    pub(crate) fn session_config(&self, program: impl Into<PathBuf>) -> SessionConfig {
        SessionConfig::new(program)
            .with_working_dir(&self.bootstrap.root)
            .with_prompt(&self.prompt)
            .with_command_timeout(self.command_timeout)
            .with_shutdown_grace(self.shutdown_grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.command_timeout, Duration::from_millis(2500));
        assert!(!config.clear_env);
    }

    #[test]
    fn test_session_config_to_process_config() {
        let config = SessionConfig::new("./shm_cli")
            .with_arg("--quiet")
            .with_working_dir("/srv/shm")
            .with_env("LANG", "C")
            .with_clear_env(true);

        let process = config.process_config();
        assert_eq!(process.program, PathBuf::from("./shm_cli"));
        assert_eq!(process.args, vec!["--quiet".to_string()]);
        assert_eq!(process.working_dir, Some(PathBuf::from("/srv/shm")));
        assert_eq!(process.env.get("LANG"), Some(&"C".to_string()));
        assert!(process.clear_env);
    }

    #[test]
    fn test_bootstrap_defaults_match_allocator_project() {
        let config = BootstrapConfig::default();
        assert_eq!(config.candidates, vec!["shm_cli", "shm_cli.exe", "a.out"]);
        assert_eq!(config.compiler, "g++");
        assert_eq!(config.flags, vec!["-std=c++17", "-pthread"]);
        assert_eq!(config.output_name, "shm_cli");
        assert_eq!(config.sources.len(), 3);
    }

    #[test]
    fn test_bootstrap_from_env() {
        temp_env::with_vars(
            [("CLIBRIDGE_ROOT", Some("/srv/shm")), ("CXX", Some("clang++"))],
            || {
                let config = BootstrapConfig::from_env();
                assert_eq!(config.root, PathBuf::from("/srv/shm"));
                assert_eq!(config.compiler, "clang++");
            },
        );
    }

    #[test]
    fn test_bootstrap_from_env_ignores_blank_compiler() {
        temp_env::with_vars([("CLIBRIDGE_ROOT", None), ("CXX", Some("  "))], || {
            let config = BootstrapConfig::from_env();
            assert_eq!(config.compiler, "g++");
            assert_eq!(config.root, PathBuf::from("."));
        });
    }

    #[test]
    fn test_bridge_from_env() {
        temp_env::with_vars(
            [
                ("CLIBRIDGE_TIMEOUT_MS", Some("750")),
                ("CLIBRIDGE_STARTUP_GRACE_MS", Some("not-a-number")),
            ],
            || {
                let config = BridgeConfig::from_env();
                assert_eq!(config.command_timeout, Duration::from_millis(750));
                assert_eq!(config.startup_grace, DEFAULT_STARTUP_GRACE);
            },
        );
    }

    #[test]
    fn test_bridge_session_config_uses_root() {
        let config = BridgeConfig::new(BootstrapConfig::new("/srv/shm"))
            .with_prompt("$ ")
            .with_command_timeout(Duration::from_secs(5));

        let session = config.session_config("/srv/shm/shm_cli");
        assert_eq!(session.working_dir, Some(PathBuf::from("/srv/shm")));
        assert_eq!(session.prompt, "$ ");
        assert_eq!(session.command_timeout, Duration::from_secs(5));
    }
}
