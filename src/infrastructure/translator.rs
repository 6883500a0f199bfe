//! External LaTeX-to-MathML engine
//!
//! Every request runs in a fresh engine process:
//! spawn, skip the banner, send one line, read until a `<formula` frame, terminate.
//! Reads go through a channel fed by a reader thread. Each wait is bounded by
//! the configured timeout, and so is the whole answer to one request.

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use itertools::Itertools;
use tracing::{debug, instrument, trace, warn};

use crate::config::TranslatorSettings;
use crate::infrastructure::error::TranslatorError;
use crate::infrastructure::traits::MathTranslator;

const FORMULA_PREFIX: &str = "<formula";
const FORMULA_END: &str = "</formula>";
const ERROR_PREFIX: &str = "Error";

/// Classification of one line of engine output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Start of the answer
    Formula,
    /// Engine complaint; the following line carries the detail
    Error,
    /// Prompts, echoes and other chatter
    Noise,
}

impl Frame {
    pub fn classify(line: &str) -> Self {
        if line.starts_with(FORMULA_PREFIX) {
            Frame::Formula
        } else if line.starts_with(ERROR_PREFIX) {
            Frame::Error
        } else {
            Frame::Noise
        }
    }
}

/// True once `text` holds a complete formula element.
fn formula_complete(text: &str) -> bool {
    if text.contains(FORMULA_END) {
        return true;
    }
    // <formula .../>
    text.find('>')
        .map(|end| text[..end].ends_with('/'))
        .unwrap_or(false)
}

/// Collect lines from the opening `<formula` line up to the closing tag.
fn read_formula(session: &mut TranslatorSession, first: String) -> Result<String, TranslatorError> {
    let mut formula = first;
    while !formula_complete(&formula) {
        let next = session.read_line()?;
        formula.push('\n');
        formula.push_str(&next);
    }
    Ok(formula.trim().to_string())
}

/// The engine reads one line per request.
pub fn request_line(latex: &str) -> String {
    latex.trim().lines().map(str::trim_end).join(" ")
}

/// Locate an executable: paths are checked as given, bare names on PATH.
pub fn resolve_executable(program: &Path) -> Option<PathBuf> {
    if program.is_absolute() || program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Running engine process, killed and reaped when dropped.
pub struct TranslatorSession {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<io::Result<String>>,
    timeout: Duration,
    deadline: Instant,
}

impl TranslatorSession {
    pub fn spawn(executable: &Path, args: &[String], timeout: Duration) -> Result<Self, TranslatorError> {
        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| TranslatorError::Spawn {
                executable: executable.to_path_buf(),
                source,
            })?;
        debug!("spawned translator pid={}", child.id());

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (tx, rx) = mpsc::channel();
        // from here on the guard owns the child
        let session = Self {
            child,
            stdin,
            lines: rx,
            timeout,
            deadline: Instant::now() + timeout,
        };

        let stdout = stdout.ok_or(TranslatorError::StreamClosed)?;
        thread::Builder::new()
            .name("translator-stdout".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(session)
    }

    /// Next output line, waiting at most until the current deadline.
    pub fn read_line(&mut self) -> Result<String, TranslatorError> {
        let wait = self.deadline.saturating_duration_since(Instant::now());
        if wait.is_zero() {
            return Err(TranslatorError::Timeout(self.timeout));
        }
        match self.lines.recv_timeout(wait) {
            Ok(line) => Ok(line?),
            Err(RecvTimeoutError::Timeout) => Err(TranslatorError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(TranslatorError::StreamClosed),
        }
    }

    /// Send a request; its answer must arrive within one timeout.
    pub fn send_line(&mut self, line: &str) -> Result<(), TranslatorError> {
        let stdin = self.stdin.as_mut().ok_or(TranslatorError::StreamClosed)?;
        writeln!(stdin, "{}", line)?;
        stdin.flush()?;
        self.deadline = Instant::now() + self.timeout;
        Ok(())
    }
}

impl Drop for TranslatorSession {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill() {
            trace!("translator already gone: {}", e);
        }
        match self.child.wait() {
            Ok(status) => trace!("translator exited: {}", status),
            Err(e) => warn!("cannot reap translator process: {}", e),
        }
    }
}

/// Translator backed by one engine process per request.
#[derive(Debug, Clone)]
pub struct ProcessTranslator {
    executable: PathBuf,
    args: Vec<String>,
    preamble_lines: usize,
    timeout: Duration,
    max_errors: usize,
}

impl ProcessTranslator {
    /// Fails immediately when the engine executable cannot be found.
    pub fn new(settings: &TranslatorSettings) -> Result<Self, TranslatorError> {
        let executable = resolve_executable(&settings.executable)
            .ok_or_else(|| TranslatorError::ExecutableNotFound(settings.executable.clone()))?;
        debug!("using translator {}", executable.display());
        Ok(Self {
            executable,
            args: settings.args.clone(),
            preamble_lines: settings.preamble_lines,
            timeout: settings.timeout(),
            max_errors: settings.max_errors,
        })
    }
}

impl MathTranslator for ProcessTranslator {
    #[instrument(level = "debug", skip(self))]
    fn translate(&self, latex: &str) -> Result<String, TranslatorError> {
        let request = request_line(latex);
        let mut session = TranslatorSession::spawn(&self.executable, &self.args, self.timeout)?;

        for _ in 0..self.preamble_lines {
            let banner = session.read_line()?;
            trace!("banner: {}", banner);
        }
        session.send_line(&request)?;

        let mut errors = 0;
        loop {
            let line = session.read_line()?;
            match Frame::classify(&line) {
                Frame::Formula => return read_formula(&mut session, line),
                Frame::Error => {
                    errors += 1;
                    let detail = session.read_line()?;
                    warn!("translator error for {:?}: {} {}", request, line, detail);
                    if errors > self.max_errors {
                        return Err(TranslatorError::TooManyErrors {
                            count: errors,
                            last: format!("{} {}", line, detail),
                        });
                    }
                }
                Frame::Noise => trace!("skipping: {}", line),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<formula type='inline'>", Frame::Formula)]
    #[case("Error: undefined command", Frame::Error)]
    #[case("> ", Frame::Noise)]
    #[case(" <formula", Frame::Noise)]
    fn given_line_when_classifying_then_frame_matches(#[case] line: &str, #[case] frame: Frame) {
        assert_eq!(Frame::classify(line), frame);
    }

    #[rstest]
    #[case("<formula><math/></formula>", true)]
    #[case("<formula type='inline'/>", true)]
    #[case("<formula type='inline'><math>", false)]
    fn given_partial_output_when_checking_then_detects_end(#[case] text: &str, #[case] done: bool) {
        assert_eq!(formula_complete(text), done);
    }

    #[test]
    fn given_multiline_source_when_building_request_then_single_trimmed_line() {
        assert_eq!(request_line("  \\frac{1}{2}\n"), "\\frac{1}{2}");
        assert_eq!(request_line("a &= b \\\\\n  c &= d"), "a &= b \\\\   c &= d");
    }

    #[test]
    fn given_missing_executable_when_constructing_then_fails_fast() {
        let settings = TranslatorSettings {
            executable: PathBuf::from("/nonexistent/dir/tralics"),
            ..TranslatorSettings::default()
        };
        let result = ProcessTranslator::new(&settings);
        assert!(matches!(result, Err(TranslatorError::ExecutableNotFound(_))));
    }

    #[test]
    fn given_unknown_bare_name_when_resolving_then_none() {
        assert!(resolve_executable(Path::new("surely-not-a-real-program-4711")).is_none());
    }
}
