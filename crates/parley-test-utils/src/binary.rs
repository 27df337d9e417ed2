//! A fake inference executable for process-backend tests.
//!
//! [`FakeBinary`] writes a `/bin/sh` script into a temp directory, marks it
//! executable, and creates a model directory next to it. The script sees the
//! same arguments a real llama.cpp binary would.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use parley_config::{ProcessConfig, ProviderConfig};
use tempfile::TempDir;

/// A shell script standing in for `llama-cli`, plus its model directory.
///
/// Both are removed when this value is dropped.
pub struct FakeBinary {
    _dir: TempDir,
    executable: PathBuf,
    model_dir: PathBuf,
}

impl FakeBinary {
    /// Create an executable whose body is `script` (run by `/bin/sh`).
    ///
    /// ```ignore
    /// let bin = FakeBinary::new(r#"echo "Hello world""#).with_model("phi.gguf");
    /// ```
    pub fn new(script: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let executable = dir.path().join("llama-cli");
        fs::write(&executable, format!("#!/bin/sh\n{script}\n"))
            .expect("failed to write fake binary");
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755))
            .expect("failed to mark fake binary executable");

        let model_dir = dir.path().join("models");
        fs::create_dir(&model_dir).expect("failed to create model dir");

        Self {
            _dir: dir,
            executable,
            model_dir,
        }
    }

    /// A script that prints each of its arguments on its own line.
    pub fn echo_args() -> Self {
        Self::new(r#"for arg in "$@"; do printf '%s\n' "$arg"; done"#)
    }

    /// Add an empty model file such as `phi.gguf`.
    pub fn with_model(self, file_name: &str) -> Self {
        fs::write(self.model_dir.join(file_name), b"").expect("failed to create model file");
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn process_config(&self) -> ProcessConfig {
        ProcessConfig::new(&self.executable, &self.model_dir)
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::default().with_process(self.process_config())
    }
}
