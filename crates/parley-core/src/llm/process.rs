//! Local inference through a llama.cpp-style binary (backend `gguf`).
//!
//! Each call spawns the configured executable with the model file, sampling
//! settings and a flattened prompt, then reads its stdout. Streaming splits
//! stdout into whitespace-delimited words and paces them out so a terminal
//! or UI sees steady progress.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use parley_config::{ProcessConfig, ProviderConfig};

use crate::BoxFuture;

use super::decode::Utf8Decoder;
use super::preprocess::apply_options;
use super::provider::{Provider, ProviderError, TextStream};
use super::types::{CallOptions, Message, Role};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_PACING: Duration = Duration::from_millis(20);
const MODEL_EXTENSIONS: [&str; 2] = ["gguf", "bin"];
const READ_BUF_SIZE: usize = 4096;

/// Provider backed by a local inference executable.
pub struct ProcessProvider {
    config: Option<ProcessConfig>,
    models: OnceCell<Vec<String>>,
    pacing: Duration,
}

impl ProcessProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            config: config.process.clone(),
            models: OnceCell::new(),
            pacing: DEFAULT_PACING,
        }
    }

    /// Delay before each streamed word. Zero disables pacing.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    fn ready(&self) -> Result<&ProcessConfig, ProviderError> {
        let process = self.config.as_ref().ok_or_else(|| {
            ProviderError::Configuration("gguf requires process settings".to_string())
        })?;
        if !process.executable.is_file() {
            return Err(ProviderError::Configuration(format!(
                "inference executable {} does not exist",
                process.executable.display()
            )));
        }
        if !process.model_dir.is_dir() {
            return Err(ProviderError::Configuration(format!(
                "model directory {} does not exist",
                process.model_dir.display()
            )));
        }
        Ok(process)
    }

    async fn models(&self, process: &ProcessConfig) -> Result<&[String], ProviderError> {
        let dir = process.model_dir.clone();
        self.models
            .get_or_try_init(|| discover_models(dir))
            .await
            .map(Vec::as_slice)
    }

    /// Path of the model file for the requested id, or the first
    /// discovered model when none was requested.
    async fn resolve_model(
        &self,
        process: &ProcessConfig,
        requested: &str,
    ) -> Result<PathBuf, ProviderError> {
        let requested = requested.trim();
        let id = if requested.is_empty() {
            self.models(process)
                .await?
                .first()
                .cloned()
                .ok_or_else(|| {
                    ProviderError::ModelNotFound(format!(
                        "no models in {}",
                        process.model_dir.display()
                    ))
                })?
        } else if is_model_stem(requested) {
            requested.to_string()
        } else {
            return Err(ProviderError::Configuration(format!(
                "model id {requested:?} must be a file name in the model directory"
            )));
        };

        for ext in MODEL_EXTENSIONS {
            let candidate = process.model_dir.join(format!("{id}.{ext}"));
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(candidate);
            }
        }
        Err(ProviderError::ModelNotFound(id))
    }

    async fn prepare(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<Command, ProviderError> {
        let process = self.ready()?;
        let model_path = self.resolve_model(process, &options.model).await?;
        let prompt = format_prompt(&apply_options(messages, options));

        debug!(
            backend = "gguf",
            model = %model_path.display(),
            prompt_len = prompt.len(),
            "spawning inference process"
        );

        let mut cmd = Command::new(&process.executable);
        cmd.args(build_args(process, &model_path, &prompt, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    fn spawn_error(&self, err: std::io::Error) -> ProviderError {
        let exe = self
            .config
            .as_ref()
            .map(|p| p.executable.display().to_string())
            .unwrap_or_default();
        ProviderError::Process {
            code: None,
            stderr: format!("failed to start {exe}: {err}"),
        }
    }
}

/// A bare file stem: no separators, no `.`/`..`, nothing that could leave
/// the model directory.
fn is_model_stem(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !id.contains(['/', '\\'])
}

/// Flatten a conversation into the `### Role:` prompt format, ending with an
/// open assistant section for the model to complete.
pub fn format_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let header = match message.role {
            Role::System => "### System:",
            Role::User => "### User:",
            Role::Assistant => "### Assistant:",
        };
        prompt.push_str(header);
        prompt.push('\n');
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt.push_str("### Assistant:\n");
    prompt
}

pub(crate) fn build_args(
    process: &ProcessConfig,
    model_path: &Path,
    prompt: &str,
    options: &CallOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-m".into(),
        model_path.into(),
        "--temp".into(),
        options
            .temperature
            .unwrap_or(DEFAULT_TEMPERATURE)
            .to_string()
            .into(),
        "-c".into(),
        process.context_size.to_string().into(),
        "-n".into(),
        options
            .max_tokens
            .unwrap_or(DEFAULT_MAX_TOKENS)
            .to_string()
            .into(),
        "-t".into(),
        process.threads.to_string().into(),
        "--color".into(),
        "false".into(),
        "--prompt".into(),
        prompt.into(),
    ];
    if !options.stop.is_empty() {
        args.push("--stop".into());
        args.push(options.stop.join(",").into());
    }
    args
}

async fn discover_models(dir: PathBuf) -> Result<Vec<String>, ProviderError> {
    let mut entries = tokio::fs::read_dir(&dir).await?;
    let mut models = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let has_model_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| MODEL_EXTENSIONS.contains(&e));
        if !has_model_ext {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            models.push(stem.to_string());
        }
    }
    models.sort();
    models.dedup();
    debug!(dir = %dir.display(), count = models.len(), "discovered local models");
    Ok(models)
}

/// A running inference process.
///
/// Stdout is the byte source and its EOF is the completion signal. Stderr is
/// drained in the background so a chatty child never blocks on a full pipe;
/// it comes back with the exit status from [`finish`](Self::finish).
pub struct ProcessSource {
    child: Child,
    stdout: ChildStdout,
    stderr: JoinHandle<String>,
}

impl ProcessSource {
    pub fn spawn(cmd: &mut Command) -> std::io::Result<Self> {
        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr was not captured"))?;
        let stderr = tokio::spawn(async move {
            let mut bytes = Vec::new();
            let _ = stderr.read_to_end(&mut bytes).await;
            String::from_utf8_lossy(&bytes).into_owned()
        });
        Ok(Self {
            child,
            stdout,
            stderr,
        })
    }

    /// Read the next chunk of stdout. `Ok(0)` means EOF.
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stdout.read(buf).await
    }

    /// Wait for exit and collect stderr.
    pub async fn finish(mut self) -> (std::io::Result<ExitStatus>, String) {
        let status = self.child.wait().await;
        let stderr = self.stderr.await.unwrap_or_default();
        (status, stderr)
    }
}

/// Splits text into whitespace-delimited words across chunk boundaries.
///
/// A word is only released once the whitespace after it has been seen.
#[derive(Debug, Default)]
pub struct WordSplitter {
    partial: String,
}

impl WordSplitter {
    pub fn push(&mut self, text: &str) -> Vec<String> {
        let mut words = Vec::new();
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.partial.is_empty() {
                    words.push(std::mem::take(&mut self.partial));
                }
            } else {
                self.partial.push(ch);
            }
        }
        words
    }

    /// The trailing word, if the text did not end in whitespace.
    pub fn finish(&mut self) -> Option<String> {
        Some(std::mem::take(&mut self.partial)).filter(|w| !w.is_empty())
    }
}

fn word_stream(mut source: ProcessSource, pacing: Duration) -> TextStream {
    Box::pin(async_stream::stream! {
        let mut utf8 = Utf8Decoder::new();
        let mut words = WordSplitter::default();
        let mut buf = vec![0u8; READ_BUF_SIZE];

        loop {
            let n = match source.read(&mut buf).await {
                Ok(n) => n,
                Err(err) => {
                    yield Err(ProviderError::Io(err));
                    break;
                }
            };
            let text = if n == 0 { utf8.finish() } else { utf8.decode(&buf[..n]) };
            let mut batch = words.push(&text);
            if n == 0 {
                batch.extend(words.finish());
            }
            for word in batch {
                if !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
                yield Ok(format!("{word} "));
            }
            if n == 0 {
                break;
            }
        }

        let (status, stderr) = source.finish().await;
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            warn!(backend = "gguf", stderr = %stderr, "inference process wrote to stderr");
        }
        match status {
            Ok(status) if !status.success() => {
                warn!(backend = "gguf", code = ?status.code(), "inference process exited with failure");
            }
            Err(err) => warn!(backend = "gguf", error = %err, "failed to wait for inference process"),
            Ok(_) => {}
        }
    })
}

impl Provider for ProcessProvider {
    fn name(&self) -> &str {
        "gguf"
    }

    fn is_configured(&self) -> bool {
        self.ready().is_ok()
    }

    fn list_models(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            let result = match self.ready() {
                Ok(process) => self.models(process).await.map(<[String]>::to_vec),
                Err(err) => Err(err),
            };
            result.unwrap_or_else(|err| {
                warn!(backend = "gguf", error = %err, "model discovery failed");
                Vec::new()
            })
        })
    }

    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let mut cmd = self.prepare(messages, options).await?;
            let output = cmd.output().await.map_err(|e| self.spawn_error(e))?;
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            } else {
                Err(ProviderError::Process {
                    code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        })
    }

    fn stream<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CallOptions,
    ) -> BoxFuture<'a, Result<TextStream, ProviderError>> {
        Box::pin(async move {
            let mut cmd = self.prepare(messages, options).await?;
            let source = ProcessSource::spawn(&mut cmd).map_err(|e| self.spawn_error(e))?;
            Ok(word_stream(source, self.pacing))
        })
    }
}
