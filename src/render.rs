//! HTML to archive-document conversion.
//!
//! The converter itself is external; [`CommandRenderer`] pipes HTML through
//! a configured program (e.g. `wkhtmltopdf - -`) and reads the document
//! from its stdout.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{ReceiptError, Result};

/// Output of a renderer.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Final file name, stem plus the renderer's extension.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Turns finished HTML into document bytes.
pub trait Renderer {
    /// Render `html`; `stem` is the canonical name without extension.
    fn render(&self, html: &str, stem: &str) -> Result<RenderedDocument>;
}

/// Spawns an external HTML→PDF converter.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandRenderer {
    /// Build from an argv list. `None` when the list is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, html: &str, stem: &str) -> Result<RenderedDocument> {
        debug!(program = %self.program, args = ?self.args, "Spawning renderer");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReceiptError::Render(format!("cannot start '{}': {e}", self.program)))?;

        // Converters may write stdout before draining stdin.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReceiptError::Render("renderer stdin unavailable".into()))?;
        let input = html.as_bytes().to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .map_err(|e| ReceiptError::Render(format!("'{}' failed: {e}", self.program)))?;
        writer
            .join()
            .map_err(|_| ReceiptError::Render("renderer input thread panicked".into()))?
            .map_err(|e| ReceiptError::Render(format!("writing HTML to '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReceiptError::Render(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(ReceiptError::Render(format!(
                "'{}' produced no output",
                self.program
            )));
        }

        info!(stem, bytes = output.stdout.len(), "Rendered document");
        Ok(RenderedDocument {
            file_name: format!("{stem}.pdf"),
            bytes: output.stdout,
        })
    }
}

/// Emits the HTML itself. Used when no converter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, html: &str, stem: &str) -> Result<RenderedDocument> {
        Ok(RenderedDocument {
            file_name: format!("{stem}.html"),
            bytes: html.as_bytes().to_vec(),
        })
    }
}

/// The renderer configured by `[render] command`.
pub fn from_config(command: &[String]) -> Box<dyn Renderer> {
    match CommandRenderer::from_argv(command) {
        Some(r) => Box::new(r),
        None => Box::new(HtmlRenderer),
    }
}
