use super::{CompileError, CompileOptions, Compiler};
use regex::Regex;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

/// Compiles LESS by piping it through the `lessc` command line compiler
pub struct LesscCompiler {
    program: PathBuf,
}

impl LesscCompiler {
    pub fn new() -> Self {
        Self::with_program("lessc")
    }

    /// Use a specific `lessc` executable, e.g. `node_modules/.bin/lessc`
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, file_path: &Path, options: &CompileOptions) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--no-color");

        // Relative @imports are resolved from the source's own directory
        if let Some(dir) = file_path.parent() {
            let mut include = std::ffi::OsString::from("--include-path=");
            include.push(dir);
            command.arg(include);
        }

        if options.compress_output {
            command.arg("--compress");
        }

        command.arg("-").stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        command
    }
}

impl Default for LesscCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the compiled regex for lessc error locations (compiled once, cached)
fn location_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        // Examples:
        //   ParseError: Unrecognised input in - on line 3, column 5:
        //   NameError: variable @x is undefined in /site/less/_vars.less on line 2, column 8:
        Regex::new(r"(?: in (\S+))? on line (\d+), column (\d+):?").unwrap()
    })
}

/// Turn lessc's stderr into a [`CompileError`]. Errors in stdin input are
/// reported against `file_path`; errors inside imported files keep their own path.
fn parse_error_output(stderr: &str, file_path: &Path) -> CompileError {
    let first_line = stderr.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    if first_line.is_empty() {
        return CompileError { file: Some(file_path.to_path_buf()), ..CompileError::new("lessc failed without output") };
    }

    let Some(caps) = location_regex().captures(first_line) else {
        return CompileError { file: Some(file_path.to_path_buf()), ..CompileError::new(first_line) };
    };

    let file = match caps.get(1).map(|m| m.as_str()) {
        Some(name) if name != "-" => PathBuf::from(name),
        _ => file_path.to_path_buf(),
    };
    let line = caps[2].parse().unwrap_or(0);
    let column = caps[3].parse().ok();

    let matched = caps.get(0).map_or(first_line.len(), |m| m.start());
    let message = first_line[..matched].trim_end();

    CompileError::new(message).at(file, line, column)
}

impl Compiler for LesscCompiler {
    fn name(&self) -> &str {
        "lessc"
    }

    fn compile(&self, source: &str, file_path: &Path, options: &CompileOptions) -> Result<String, CompileError> {
        let mut child = self.command(file_path, options).spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                CompileError::new(format!("LESS compiler '{}' not found", self.program.display()))
            }
            _ => CompileError::new(format!("Failed to start '{}': {e}", self.program.display())),
        })?;

        let stdin = child.stdin.take();
        // Feed stdin from a second thread so a large output cannot fill the
        // stdout pipe while we are still writing
        let output = std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                scope.spawn(move || {
                    if let Err(e) = stdin.write_all(source.as_bytes()) {
                        tracing::debug!(file = %file_path.display(), "writing to lessc stdin failed: {e}");
                    }
                });
            }
            child.wait_with_output()
        })
        .map_err(|e| CompileError::new(format!("lessc did not finish: {e}")))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        Err(parse_error_output(&String::from_utf8_lossy(&output.stderr), file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stdin_error_uses_source_path() {
        let stderr = "ParseError: Unrecognised input in - on line 3, column 5:\n2 .a {\n3   color: ;\n";
        let err = parse_error_output(stderr, Path::new("/site/less/main.less"));

        assert_eq!(err.message, "ParseError: Unrecognised input");
        assert_eq!(err.file, Some(PathBuf::from("/site/less/main.less")));
        assert_eq!(err.line, Some(3));
        assert_eq!(err.column, Some(5));
    }

    #[test]
    fn test_parse_error_in_imported_file() {
        let stderr = "NameError: variable @brand is undefined in /site/less/_vars.less on line 2, column 8:";
        let err = parse_error_output(stderr, Path::new("/site/less/main.less"));

        assert_eq!(err.file, Some(PathBuf::from("/site/less/_vars.less")));
        assert_eq!(err.line, Some(2));
        assert_eq!(err.message, "NameError: variable @brand is undefined");
    }

    #[test]
    fn test_parse_error_without_location() {
        let err = parse_error_output("\nSomething odd happened\n", Path::new("/a.less"));
        assert_eq!(err.message, "Something odd happened");
        assert_eq!(err.line, None);
    }

    #[test]
    fn test_parse_empty_error_output() {
        let err = parse_error_output("", Path::new("/a.less"));
        assert_eq!(err.message, "lessc failed without output");
        assert_eq!(err.file, Some(PathBuf::from("/a.less")));
        assert_eq!(err.line, None);
    }

    #[test]
    fn test_missing_program_is_reported() {
        let compiler = LesscCompiler::with_program("/definitely/not/a/lessc");
        let err = compiler.compile(".a{}", Path::new("/a.less"), &CompileOptions::default()).unwrap_err();
        assert!(err.message.contains("not found"), "unexpected message: {}", err.message);
    }

    #[cfg(unix)]
    #[test]
    fn test_program_exiting_before_reading_stdin() {
        // `true` never reads its input, so a large source hits a closed pipe
        let compiler = LesscCompiler::with_program("true");
        let source = ".a { color: red; }\n".repeat(100_000);
        let css = compiler.compile(&source, Path::new("/a.less"), &CompileOptions::default()).unwrap();
        assert_eq!(css, "");
    }

    #[test]
    fn test_command_arguments() {
        let compiler = LesscCompiler::new();
        let command = compiler.command(Path::new("/site/less/main.less"), &CompileOptions { compress_output: true });
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["--no-color", "--include-path=/site/less", "--compress", "-"]);
    }
}
