//! Custom parsers
//!
//! A custom suite names its parser by reference. The reference resolves
//! through a [`ModuleLoader`] to a [`ParserModule`], whose exports are probed
//! for something usable as a [`Parser`]:
//!
//! 1. a default constructor, instantiated with no arguments
//! 2. a default instance
//! 3. a named export called `parser`
//!
//! The stock [`ParserRegistry`] serves parsers registered in code by name and
//! falls back to treating the reference as a path to an executable, which is
//! wrapped as a [`CommandParser`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{Parser, ParserError};
use crate::models::ParseResult;

/// Name of the conventional named export
pub const NAMED_PARSER_EXPORT: &str = "parser";

/// Builds a parser instance; errors are reported as load failures
pub type ParserFactory = Arc<dyn Fn() -> Result<Arc<dyn Parser>, String> + Send + Sync>;

/// One exported value of a parser module
#[derive(Clone)]
pub enum ParserExport {
    Constructor(ParserFactory),
    Instance(Arc<dyn Parser>),
    /// Something that is not a parser; the description names it in logs
    Opaque(String),
}

impl fmt::Debug for ParserExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserExport::Constructor(_) => f.write_str("Constructor(..)"),
            ParserExport::Instance(_) => f.write_str("Instance(..)"),
            ParserExport::Opaque(what) => write!(f, "Opaque({what})"),
        }
    }
}

/// Exports of a loaded parser module
#[derive(Clone, Debug, Default)]
pub struct ParserModule {
    pub default: Option<ParserExport>,
    pub named: HashMap<String, ParserExport>,
}

impl ParserModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, export: ParserExport) -> Self {
        self.default = Some(export);
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, export: ParserExport) -> Self {
        self.named.insert(name.into(), export);
        self
    }

    /// Module whose default export is a constructor
    pub fn constructor<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Parser>, String> + Send + Sync + 'static,
    {
        Self::new().with_default(ParserExport::Constructor(Arc::new(factory)))
    }

    /// Module whose default export is a ready instance
    pub fn instance(parser: Arc<dyn Parser>) -> Self {
        Self::new().with_default(ParserExport::Instance(parser))
    }

    /// Probe the exports in order and return the first usable parser
    pub fn resolve(&self, reference: &str) -> Result<Arc<dyn Parser>, ParserError> {
        match &self.default {
            Some(ParserExport::Constructor(factory)) => match factory() {
                Ok(parser) => return Ok(parser),
                Err(e) => debug!("Default constructor of {} failed: {}", reference, e),
            },
            Some(ParserExport::Instance(parser)) => return Ok(Arc::clone(parser)),
            Some(ParserExport::Opaque(what)) => {
                debug!("Default export of {} is not a parser: {}", reference, what)
            }
            None => {}
        }

        if let Some(ParserExport::Instance(parser)) = self.named.get(NAMED_PARSER_EXPORT) {
            return Ok(Arc::clone(parser));
        }

        Err(ParserError::InvalidParserShape {
            reference: reference.to_string(),
        })
    }
}

/// Resolves a parser reference to a module
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, reference: &str, cwd: &Path) -> Result<ParserModule, ParserError>;
}

/// Named modules registered in code, with executables on disk as fallback
#[derive(Clone, Debug, Default)]
pub struct ParserRegistry {
    modules: HashMap<String, ParserModule>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, module: ParserModule) -> Self {
        self.modules.insert(name.into(), module);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}

#[async_trait]
impl ModuleLoader for ParserRegistry {
    async fn load(&self, reference: &str, cwd: &Path) -> Result<ParserModule, ParserError> {
        if let Some(module) = self.modules.get(reference) {
            return Ok(module.clone());
        }

        let path = cwd.join(reference);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ParserError::ParserLoad {
                reference: reference.to_string(),
                message: format!("no registered parser and {}: {}", path.display(), e),
            })?;

        if metadata.is_file() && is_executable(&metadata, &path) {
            info!("Using parser command {}", path.display());
            let parser: Arc<dyn Parser> = Arc::new(CommandParser::new(path));
            Ok(ParserModule::new().with_named(NAMED_PARSER_EXPORT, ParserExport::Instance(parser)))
        } else {
            Ok(ParserModule::new().with_default(ParserExport::Opaque(format!(
                "{} is not an executable file",
                path.display()
            ))))
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata, _path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata, path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("exe" | "bat" | "cmd")
    )
}

/// External program that prints a JSON `ParseResult` on stdout.
///
/// Invoked as `<program> <result_file> [log_file]`.
#[derive(Clone, Debug)]
pub struct CommandParser {
    program: PathBuf,
}

impl CommandParser {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Parser for CommandParser {
    async fn parse(
        &self,
        result_file: &Path,
        log_file: Option<&Path>,
    ) -> Result<ParseResult, ParserError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(result_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(log_file) = log_file {
            cmd.arg(log_file);
        }

        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(ParserError::Command {
                program: self.program.display().to_string(),
                message: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Loads the referenced parser on first use and reuses it afterwards
pub struct CustomParserLoader {
    reference: String,
    cwd: PathBuf,
    loader: Arc<dyn ModuleLoader>,
    loaded: OnceCell<Arc<dyn Parser>>,
}

impl CustomParserLoader {
    pub fn new(reference: impl Into<String>, cwd: &Path, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            reference: reference.into(),
            cwd: cwd.to_path_buf(),
            loader,
            loaded: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    async fn parser(&self) -> Result<&Arc<dyn Parser>, ParserError> {
        self.loaded
            .get_or_try_init(|| async {
                debug!("Loading custom parser {}", self.reference);
                let module = self.loader.load(&self.reference, &self.cwd).await?;
                module.resolve(&self.reference)
            })
            .await
    }
}

#[async_trait]
impl Parser for CustomParserLoader {
    async fn parse(
        &self,
        result_file: &Path,
        log_file: Option<&Path>,
    ) -> Result<ParseResult, ParserError> {
        self.parser().await?.parse(result_file, log_file).await
    }
}
