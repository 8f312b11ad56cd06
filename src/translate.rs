use crate::catalog::language_map;
use crate::error::TranslateError;
use crate::packages::{LanguagePair, PackageStore};
use anyhow::{Context, Result};
use std::future::Future;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Something that can translate text for an installed language pair
pub trait TranslationEngine {
    fn translate(&self, pair: &LanguagePair, text: &str)
        -> impl Future<Output = Result<String>> + Send;
}

/// Translation engine backed by an external command.
///
/// The command is run as `<command> --from-lang <code> --to-lang <code>` with
/// the text on stdin, and whatever it prints on stdout is the translation.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    /// Build from a command line such as `argos-translate` or `python -m argostranslate.cli`
    pub fn new(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .context("Translation command must not be empty")?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl TranslationEngine for CommandEngine {
    async fn translate(&self, pair: &LanguagePair, text: &str) -> Result<String> {
        debug!(
            "Running {} for {} -> {}",
            self.program, pair.from_code, pair.to_code
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--from-lang")
            .arg(&pair.from_code)
            .arg("--to-lang")
            .arg(&pair.to_code)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start translation command '{}'", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .context("Translation command stdin unavailable")?;
        // Feed stdin while draining stdout so a streaming command never blocks on a full pipe
        let feed = async move {
            let written = stdin.write_all(text.as_bytes()).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.context("Translation command did not finish")?;
        // A command that exits early is reported through its exit status below
        if let Err(e) = written {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e).context("Failed to send text to translation command");
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Translation command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let mut translated =
            String::from_utf8(output.stdout).context("Translation output is not valid UTF-8")?;
        // The command terminates its output with a single newline
        if translated.ends_with('\n') {
            translated.pop();
            if translated.ends_with('\r') {
                translated.pop();
            }
        }
        Ok(translated)
    }
}

/// Resolves language names to an installed pair and translates with it
#[derive(Debug, Clone)]
pub struct TranslationResolver<S, E> {
    store: S,
    engine: E,
}

impl<S, E> TranslationResolver<S, E>
where
    S: PackageStore,
    E: TranslationEngine,
{
    pub fn new(store: S, engine: E) -> Self {
        Self { store, engine }
    }

    /// Installed pair for the exact direction `from_name` → `to_name`
    pub fn resolve(&self, from_name: &str, to_name: &str) -> Result<LanguagePair, TranslateError> {
        let installed = self.store.installed().map_err(TranslateError::Store)?;
        let languages = language_map(&installed);

        let from_code = languages
            .get(from_name)
            .ok_or_else(|| TranslateError::NotFound(from_name.to_string()))?;
        let to_code = languages
            .get(to_name)
            .ok_or_else(|| TranslateError::NotFound(to_name.to_string()))?;

        installed
            .into_iter()
            .find(|pair| pair.codes() == (from_code.as_str(), to_code.as_str()))
            .ok_or_else(|| TranslateError::NoPackageInstalled {
                from: from_name.to_string(),
                to: to_name.to_string(),
            })
    }

    /// Translate `text` between two installed languages given by display name.
    ///
    /// Empty text or an empty language name yields an empty translation.
    pub async fn translate(
        &self,
        text: &str,
        from_name: &str,
        to_name: &str,
    ) -> Result<String, TranslateError> {
        if text.is_empty() || from_name.is_empty() || to_name.is_empty() {
            return Ok(String::new());
        }

        let pair = self.resolve(from_name, to_name).map_err(|e| {
            warn!("Cannot translate {} -> {}: {}", from_name, to_name, e);
            e
        })?;

        info!(
            "Translating {} characters {} -> {}",
            text.chars().count(),
            pair.from_code,
            pair.to_code
        );
        self.engine
            .translate(&pair, text)
            .await
            .map_err(TranslateError::Engine)
    }
}
