// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ahead-of-time checking of the bindings in template files.
//!
//! [`compile`] walks a directory for template files, pulls every `{{ … }}`
//! binding out of them, and parses it. When [`CompileOptions`] carries a
//! [`BindingCompiler`] and a data source type, each binding is resolved as
//! well. Failures are collected with their file, line, and column. If there
//! are none, a JSON [`Manifest`] of every binding is written to the output
//! path.
//!
//! ```rust
//! use understory_binding::precompile::{self, Manifest};
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("main.uvml"), "<Label Text=\"{{Title}}\" />").unwrap();
//! let output = dir.path().join("bindings.json");
//!
//! let result = precompile::compile(dir.path(), &output).unwrap();
//! assert!(result.succeeded);
//!
//! let manifest: Manifest =
//!     serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
//! assert_eq!(manifest.files[0].bindings[0].path, ["Title"]);
//! ```

use core::any::TypeId;
use core::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;
use walkdir::WalkDir;

use crate::compiler::BindingCompiler;
use crate::expression::BindingExpression;

/// Version written into every [`Manifest`].
pub const MANIFEST_VERSION: u32 = 1;

/// I/O failures that stop a compilation. Bad bindings are not errors; they
/// are reported in [`CompilationResult::errors`].
#[derive(Debug, Error)]
pub enum PrecompileError {
    /// The root is not a directory.
    #[error("template root '{}' is not a directory", .0.display())]
    MissingRoot(PathBuf),
    /// Walking the root failed.
    #[error("failed to walk templates: {0}")]
    Walk(#[from] walkdir::Error),
    /// Reading a template or writing the manifest failed.
    #[error("failed to access '{}': {source}", path.display())]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying failure.
        source: io::Error,
    },
    /// The manifest could not be serialized.
    #[error("failed to serialize the binding manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// What to compile and how.
#[derive(Clone)]
pub struct CompileOptions {
    extensions: SmallVec<[String; 2]>,
    resolver: Option<(Arc<BindingCompiler>, TypeId)>,
}

impl CompileOptions {
    /// Options for `.uvml` files, parsing bindings without resolving them.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the template file extensions. Extensions are given without
    /// the leading dot and compared case-sensitively.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Also resolves every binding against data sources of type `source`.
    #[must_use]
    pub fn with_resolver(mut self, compiler: Arc<BindingCompiler>, source: TypeId) -> Self {
        self.resolver = Some((compiler, source));
        self
    }

    /// Returns the template file extensions.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            extensions: SmallVec::from_iter([String::from("uvml")]),
            resolver: None,
        }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("extensions", &self.extensions)
            .field("resolves", &self.resolver.is_some())
            .finish()
    }
}

/// A binding that failed to parse or resolve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationError {
    /// The template file.
    pub file: PathBuf,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, in characters.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file.display(),
            self.line,
            self.column,
            self.message
        )
    }
}

/// The outcome of a compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompilationResult {
    /// `true` if every binding parsed (and resolved, if asked).
    pub succeeded: bool,
    /// Every failing binding, in file then source order.
    pub errors: Vec<CompilationError>,
    /// The manifest that was written, if any.
    pub produced: Option<PathBuf>,
}

/// The bindings found in a template tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version, currently [`MANIFEST_VERSION`].
    pub version: u32,
    /// Every template file, sorted by path.
    pub files: Vec<TemplateBindings>,
}

/// The bindings of one template file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBindings {
    /// Path relative to the root, with `/` separators.
    pub path: String,
    /// Bindings in source order.
    pub bindings: Vec<BindingRecord>,
}

/// One parsed binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    /// The binding as written, braces included.
    pub expression: String,
    /// Path segments.
    pub path: Vec<String>,
    /// Format segment, without its braces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// 1-based line of the opening braces.
    pub line: usize,
    /// 1-based column of the opening braces.
    pub column: usize,
}

/// Compiles `.uvml` templates under `root`, writing the manifest to `output`.
///
/// # Errors
///
/// Fails only on I/O. Bad bindings are reported in the result.
pub fn compile(root: &Path, output: &Path) -> Result<CompilationResult, PrecompileError> {
    compile_with(root, output, &CompileOptions::default())
}

/// Compiles templates under `root` as `options` describe.
///
/// # Errors
///
/// Fails only on I/O. Bad bindings are reported in the result.
pub fn compile_with(
    root: &Path,
    output: &Path,
    options: &CompileOptions,
) -> Result<CompilationResult, PrecompileError> {
    if !root.is_dir() {
        return Err(PrecompileError::MissingRoot(root.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && options.matches(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    paths.dedup();

    let mut files = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    for path in paths {
        let bytes = fs::read(&path).map_err(|source| PrecompileError::Io {
            path: path.clone(),
            source,
        })?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                let valid = &err.as_bytes()[..err.utf8_error().valid_up_to()];
                let prefix = core::str::from_utf8(valid).unwrap_or_default();
                let (line, column) = line_column(prefix, prefix.len());
                errors.push(CompilationError {
                    file: path,
                    line,
                    column,
                    message: String::from("template is not valid UTF-8"),
                });
                continue;
            }
        };
        let bindings = compile_template(&path, &text, options, &mut errors);
        tracing::trace!(file = %path.display(), bindings = bindings.len(), "scanned template");
        files.push(TemplateBindings {
            path: relative_display_path(root, &path),
            bindings,
        });
    }

    if !errors.is_empty() {
        for error in &errors {
            tracing::warn!(%error, "binding failed to compile");
        }
        return Ok(CompilationResult {
            succeeded: false,
            errors,
            produced: None,
        });
    }

    let manifest = Manifest {
        version: MANIFEST_VERSION,
        files,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(output, json).map_err(|source| PrecompileError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        output = %output.display(),
        files = manifest.files.len(),
        "wrote binding manifest"
    );
    Ok(CompilationResult {
        succeeded: true,
        errors,
        produced: Some(output.to_path_buf()),
    })
}

fn compile_template(
    file: &Path,
    text: &str,
    options: &CompileOptions,
    errors: &mut Vec<CompilationError>,
) -> Vec<BindingRecord> {
    let mut bindings = Vec::new();
    let mut fail = |at: usize, message: String| {
        let (line, column) = line_column(text, at);
        errors.push(CompilationError {
            file: file.to_path_buf(),
            line,
            column,
            message,
        });
    };

    for span in extract_bindings(text) {
        let Some(end) = span.end else {
            fail(span.start, String::from("'{{' is not closed"));
            break;
        };
        let source = &text[span.start..end];
        let expression = match BindingExpression::parse(source) {
            Ok(expression) => expression,
            Err(err) => {
                fail(span.start + err.offset(), err.to_string());
                continue;
            }
        };
        if let Some((compiler, source_type)) = &options.resolver
            && let Err(err) = compiler.validate(*source_type, source)
        {
            fail(span.start, err.to_string());
            continue;
        }
        let (line, column) = line_column(text, span.start);
        bindings.push(BindingRecord {
            expression: source.to_owned(),
            path: expression.segments().map(str::to_owned).collect(),
            format: expression.format().map(str::to_owned),
            line,
            column,
        });
    }
    bindings
}

/// A `{{ … }}` region. `end` is exclusive and `None` if the braces never
/// balance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Span {
    start: usize,
    end: Option<usize>,
}

/// Finds every top-level `{{ … }}` in `text`, matching braces by depth so
/// format segments such as `{{Count{{0} items}}}` stay whole.
fn extract_bindings(text: &str) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(found) = text[pos..].find("{{") {
        let start = pos + found;
        let mut depth = 0_usize;
        let mut end = None;
        for (i, &b) in bytes.iter().enumerate().skip(start) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i + 1);
                        break;
                    }
                }
                _ => {}
            }
        }
        spans.push(Span { start, end });
        match end {
            Some(end) => pos = end,
            None => break,
        }
    }
    spans
}

/// Returns the 1-based line and character column of byte offset `at`.
fn line_column(text: &str, at: usize) -> (usize, usize) {
    let before = &text[..at];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (line, before[line_start..].chars().count() + 1)
}

fn relative_display_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut s = rel.to_string_lossy().to_string();
    if std::path::MAIN_SEPARATOR != '/' {
        s = s.replace(std::path::MAIN_SEPARATOR, "/");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_balance_nested_braces() {
        let text = "a {{X}} b {{Count{{0} items}}} c {{Open";
        let spans = extract_bindings(text);
        assert_eq!(spans.len(), 3);
        assert_eq!(&text[spans[0].start..spans[0].end.unwrap()], "{{X}}");
        assert_eq!(
            &text[spans[1].start..spans[1].end.unwrap()],
            "{{Count{{0} items}}}"
        );
        assert_eq!(spans[2].end, None);
    }

    #[test]
    fn lines_and_columns_are_one_based() {
        let text = "first\nsé{{A}}";
        assert_eq!(line_column(text, 0), (1, 1));
        let at = text.find("{{").unwrap();
        assert_eq!(line_column(text, at), (2, 3));
    }

    #[test]
    fn parse_errors_point_into_the_binding() {
        let text = "<A x=\"{{Item.?}}\"/>";
        let mut errors = Vec::new();
        let bindings = compile_template(
            Path::new("t.uvml"),
            text,
            &CompileOptions::default(),
            &mut errors,
        );
        assert!(bindings.is_empty(), "the binding is malformed");
        assert_eq!(errors.len(), 1);
        assert_eq!((errors[0].line, errors[0].column), (1, 14));
        assert!(
            errors[0].message.contains("unexpected '?'"),
            "message was {}",
            errors[0].message
        );
    }

    #[test]
    fn extensions_are_configurable() {
        let options = CompileOptions::new().with_extensions(["xml", "tpl"]);
        assert!(options.matches(Path::new("a/b.tpl")));
        assert!(!options.matches(Path::new("a/b.uvml")));
        assert!(CompileOptions::default().matches(Path::new("main.uvml")));
    }
}
