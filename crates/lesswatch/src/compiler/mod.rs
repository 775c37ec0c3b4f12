mod lessc;

pub use lessc::LesscCompiler;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Options passed to the compiler for every file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub compress_output: bool,
}

/// A compiler rejected its input.
///
/// Location fields are filled in when the compiler reports them.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{}{message}", self.location())]
pub struct CompileError {
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), file: None, line: None, column: None }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = column;
        self
    }

    /// `file:line:column: ` prefix, as far as it is known
    fn location(&self) -> String {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => format!("{}:{line}:{column}: ", file.display()),
            (Some(file), Some(line), None) => format!("{}:{line}: ", file.display()),
            (Some(file), None, _) => format!("{}: ", file.display()),
            _ => String::new(),
        }
    }
}

/// A compiler turns LESS source text into CSS.
///
/// Implementations are called from several worker threads at once.
pub trait Compiler: Send + Sync {
    /// Compiler identifier used in logs (e.g., "lessc")
    fn name(&self) -> &str;

    /// Compile `source`, which was read from `file_path`
    fn compile(&self, source: &str, file_path: &Path, options: &CompileOptions) -> Result<String, CompileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display_with_location() {
        let err = CompileError::new("Unrecognised input").at("/p/a.less", 3, Some(7));
        assert_eq!(err.to_string(), "/p/a.less:3:7: Unrecognised input");
    }

    #[test]
    fn test_compile_error_display_with_file_only() {
        let err = CompileError { file: Some(PathBuf::from("/p/a.less")), ..CompileError::new("boom") };
        assert_eq!(err.to_string(), "/p/a.less: boom");
    }

    #[test]
    fn test_compile_error_display_without_location() {
        assert_eq!(CompileError::new("boom").to_string(), "boom");
    }
}
