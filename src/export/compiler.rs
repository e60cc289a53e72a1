use std::path::Path;
use std::process::Command;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::error::Error;

/// Engine used when `--compiler` is not given.
pub const DEFAULT_ENGINE: &str = "pdflatex";

const TAIL_LINES: usize = 40;
const TAIL_BYTES: usize = 4000;

/// Something that turns LaTeX markup into a PDF.
pub trait Compiler {
    fn name(&self) -> &str;

    /// Compile `markup`; `output_name` is the desired artifact stem.
    ///
    /// # Errors
    /// Returns [`Error::CompilationFailed`] with a bounded diagnostic tail.
    fn compile(&self, markup: &str, output_name: &str) -> Result<Vec<u8>, Error>;
}

/// Keep the last lines of a diagnostic, bounded in lines and bytes.
pub fn log_tail(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.len() <= TAIL_BYTES {
        return tail;
    }
    let mut cut = tail.len() - TAIL_BYTES;
    while !tail.is_char_boundary(cut) {
        cut += 1;
    }
    tail[cut..].to_string()
}

fn sanitize_stem(output_name: &str) -> String {
    let stem = Path::new(output_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

fn failed(backend: &str, message: impl Into<String>, log: &str) -> Error {
    Error::CompilationFailed {
        backend: backend.to_string(),
        message: message.into(),
        log_tail: log_tail(log),
    }
}

/// Runs a TeX engine installed on this machine.
#[derive(Debug, Clone)]
pub struct LocalCompiler {
    program: String,
    args: Vec<String>,
}

impl LocalCompiler {
    /// Use `program` with the batch-mode flags its engine family expects.
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let args = if program.ends_with("tectonic") {
            vec!["--keep-logs".to_string()]
        } else {
            vec![
                "-interaction=nonstopmode".to_string(),
                "-halt-on-error".to_string(),
            ]
        };
        Self { program, args }
    }

    /// Use `program` with explicit leading arguments; the `.tex` file is appended.
    pub fn with_args(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for LocalCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE)
    }
}

impl Compiler for LocalCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    fn compile(&self, markup: &str, output_name: &str) -> Result<Vec<u8>, Error> {
        let _scope = crate::perf::scope("export.local");
        let stem = sanitize_stem(output_name);
        let workdir = tempfile::tempdir()
            .map_err(|err| failed(&self.program, format!("no scratch directory: {err}"), ""))?;
        let tex_name = format!("{stem}.tex");
        std::fs::write(workdir.path().join(&tex_name), markup)
            .map_err(|err| failed(&self.program, format!("cannot write source: {err}"), ""))?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&tex_name)
            .current_dir(workdir.path())
            .output()
            .map_err(|err| failed(&self.program, format!("cannot run engine: {err}"), ""))?;

        let pdf_path = workdir.path().join(format!("{stem}.pdf"));
        if output.status.success()
            && let Ok(pdf) = std::fs::read(&pdf_path)
        {
            info!(engine = %self.program, bytes = pdf.len(), "compiled document");
            return Ok(pdf);
        }

        let log = std::fs::read_to_string(workdir.path().join(format!("{stem}.log")))
            .unwrap_or_else(|_| {
                format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                )
            });
        let message = if output.status.success() {
            "engine produced no PDF".to_string()
        } else {
            format!("engine exited with {}", output.status)
        };
        Err(failed(&self.program, message, &log))
    }
}

/// Posts the markup to a remote compile service that answers with a PDF.
#[derive(Debug, Clone)]
pub struct RemoteCompiler {
    client: Client,
    url: String,
}

impl RemoteCompiler {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| failed(&url, format!("cannot build client: {err}"), ""))?;
        Ok(Self { client, url })
    }
}

impl Compiler for RemoteCompiler {
    fn name(&self) -> &str {
        &self.url
    }

    fn compile(&self, markup: &str, output_name: &str) -> Result<Vec<u8>, Error> {
        let _scope = crate::perf::scope("export.remote");
        let response = self
            .client
            .post(&self.url)
            .query(&[("name", sanitize_stem(output_name))])
            .header(reqwest::header::CONTENT_TYPE, "text/x-tex")
            .body(markup.to_string())
            .send()
            .map_err(|err| failed(&self.url, format!("request failed: {err}"), ""))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .map_err(|err| failed(&self.url, format!("unreadable response: {err}"), ""))?;
        if !status.is_success() {
            return Err(failed(
                &self.url,
                format!("service returned HTTP {}", status.as_u16()),
                &String::from_utf8_lossy(&bytes),
            ));
        }
        if !bytes.starts_with(b"%PDF") {
            return Err(failed(
                &self.url,
                "response is not a PDF",
                &String::from_utf8_lossy(&bytes),
            ));
        }
        info!(url = %self.url, bytes = bytes.len(), "compiled document remotely");
        Ok(bytes.to_vec())
    }
}

/// Tries compilers in order and returns the first success.
#[derive(Default)]
pub struct CompilerChain {
    backends: Vec<Box<dyn Compiler>>,
}

impl CompilerChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, compiler: impl Compiler + 'static) -> Self {
        self.backends.push(Box::new(compiler));
        self
    }
}

impl Compiler for CompilerChain {
    fn name(&self) -> &str {
        "chain"
    }

    /// # Errors
    /// Returns the last backend's failure when every backend fails.
    fn compile(&self, markup: &str, output_name: &str) -> Result<Vec<u8>, Error> {
        let mut last_err = None;
        for backend in &self.backends {
            match backend.compile(markup, output_name) {
                Ok(pdf) => return Ok(pdf),
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "compiler failed, trying next");
                    crate::perf::log_event("export.failed", err.to_string());
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| failed("none", "no compiler configured", "")))
    }
}
