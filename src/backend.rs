use crate::error::EvaluationError;
use crate::t_args;
use crate::types::Context;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};
use wait_timeout::ChildExt;

/// 30 seconds per evaluation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What an evaluator produced for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub value: String,
    /// `None` when the evaluator could not classify its result.
    pub type_label: Option<String>,
}

impl Evaluation {
    pub fn new(value: impl Into<String>, type_label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            type_label: Some(type_label.into()),
        }
    }
}

/// The interpreter under test.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, input: &str, context: &Context) -> Result<Evaluation, EvaluationError>;

    /// Checked once before a run starts.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl<E: Evaluator + ?Sized> Evaluator for &E {
    fn evaluate(&self, input: &str, context: &Context) -> Result<Evaluation, EvaluationError> {
        (**self).evaluate(input, context)
    }

    fn validate(&self) -> Result<()> {
        (**self).validate()
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&self, input: &str, context: &Context) -> Result<Evaluation, EvaluationError> {
        (**self).evaluate(input, context)
    }

    fn validate(&self) -> Result<()> {
        (**self).validate()
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    input: &'a str,
    context: &'a Context,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply {
    Failure {
        error: String,
    },
    Success {
        output: Value,
        #[serde(default, rename = "type")]
        type_label: Option<String>,
    },
}

/// Runs an interpreter executable once per case.
///
/// The child gets `{"input": ..., "context": {...}}` on stdin and answers on
/// stdout with `{"output": ..., "type": ...}` or `{"error": ...}`.
#[derive(Debug, Clone)]
pub struct ExternalEvaluator {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub quiet: bool, // discard the child's stderr on success when true
}

impl ExternalEvaluator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            quiet: false,
        }
    }

    fn run(&self, input: &str, context: &Context) -> Result<Evaluation, EvaluationError> {
        let mut request = serde_json::to_vec(&Request { input, context })
            .map_err(|e| EvaluationError::new(format!("cannot encode request: {e}")))?;
        request.push(b'\n');

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EvaluationError::new(format!("failed to start '{}': {e}", self.program)))?;

        // Pipes are serviced on helper threads while the child is waited on.
        // stdin closes when the writer thread ends.
        let writer = child
            .stdin
            .take()
            .map(|mut stdin| thread::spawn(move || stdin.write_all(&request)));
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EvaluationError::new(format!(
                        "evaluator timed out after {} s",
                        timeout.as_secs_f64()
                    )));
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EvaluationError::new(format!("waiting for evaluator: {e}")));
                }
            },
            None => child
                .wait()
                .map_err(|e| EvaluationError::new(format!("waiting for evaluator: {e}")))?,
        };

        // A child may answer without consuming the whole request
        if let Some(Ok(Err(e))) = writer.map(JoinHandle::join) {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(EvaluationError::new(format!("cannot write request: {e}")));
            }
            debug!("evaluator closed stdin early: {e}");
        }

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        let stderr = String::from_utf8_lossy(&stderr);
        if !status.success() {
            return Err(EvaluationError::new(format!(
                "evaluator exited with {}\nstderr: {}",
                status,
                stderr.trim_end()
            )));
        }
        if !self.quiet && !stderr.trim().is_empty() {
            debug!("evaluator stderr: {}", stderr.trim_end());
        }

        let stdout = String::from_utf8_lossy(&stdout);
        parse_reply(stdout.trim())
    }

    /// Where `program` resolves to on `PATH`.
    pub fn resolve(&self) -> Result<PathBuf> {
        which::which(&self.program).map_err(|e| {
            anyhow!(
                "evaluator '{}' does not exist or cannot be run. Check that it is installed and in PATH: {}",
                self.program,
                e
            )
        })
    }
}

/// Reads a pipe to the end on a helper thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!("reading evaluator output: {e}");
        }
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn parse_reply(stdout: &str) -> Result<Evaluation, EvaluationError> {
    let reply: Reply = serde_json::from_str(stdout).map_err(|e| {
        EvaluationError::new(format!("unreadable evaluator reply {stdout:?}: {e}"))
    })?;
    match reply {
        Reply::Failure { error } => Err(EvaluationError::new(error)),
        Reply::Success { output, type_label } => {
            let value = match output {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Ok(Evaluation { value, type_label })
        }
    }
}

impl Evaluator for ExternalEvaluator {
    fn evaluate(&self, input: &str, context: &Context) -> Result<Evaluation, EvaluationError> {
        self.run(input, context)
    }

    fn validate(&self) -> Result<()> {
        let path = self.resolve()?;
        info!("{}", t_args!("info-evaluator", "path" => path.display()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_with_type() {
        let ev = parse_reply(r#"{"output": "7", "type": "Number"}"#).unwrap();
        assert_eq!(ev, Evaluation::new("7", "Number"));
    }

    #[test]
    fn reply_with_json_number_output() {
        let ev = parse_reply(r#"{"output": 7.5, "type": "Number"}"#).unwrap();
        assert_eq!(ev.value, "7.5");
    }

    #[test]
    fn reply_without_type() {
        let ev = parse_reply(r#"{"output": "x"}"#).unwrap();
        assert_eq!(ev.type_label, None);
    }

    #[test]
    fn reply_with_error() {
        let err = parse_reply(r#"{"error": "unknown variable x"}"#).unwrap_err();
        assert_eq!(err.message, "unknown variable x");
    }

    #[test]
    fn garbage_reply() {
        assert!(parse_reply("Segmentation fault").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn runs_a_real_process() {
        let mut ev = ExternalEvaluator::new("sh");
        ev.args = vec![
            "-c".into(),
            r#"cat >/dev/null; echo '{"output": "7", "type": "Number"}'"#.into(),
        ];
        let res = ev.evaluate("4+{x}", &Context::new()).unwrap();
        assert_eq!(res, Evaluation::new("7", "Number"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_evaluation_error() {
        let mut ev = ExternalEvaluator::new("sh");
        ev.args = vec!["-c".into(), "cat >/dev/null; echo boom >&2; exit 3".into()];
        let err = ev.evaluate("1", &Context::new()).unwrap_err();
        assert!(err.message.contains("boom"));
    }

    #[cfg(unix)]
    #[test]
    fn validation_resolves_the_program() {
        let ev = ExternalEvaluator::new("sh");
        assert!(ev.resolve().unwrap().is_absolute());
        assert!(ev.validate().is_ok());
    }

    #[test]
    fn missing_program_fails_validation() {
        let ev = ExternalEvaluator::new("definitely-not-a-tokenscript-interpreter");
        assert!(ev.validate().is_err());
    }
}
