use crate::backend::Evaluator;
use crate::compare::{Verdict, judge};
use crate::error::{EvaluationError, HarnessError, MalformedFixture};
use crate::fixture::{LoadedCase, discover};
use crate::report::ReportBuilder;
use crate::types::{Report, Status, TestCase, TestResult};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use tracing::{debug, info};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Execution {
    #[default]
    Sequential,
    /// Cases run on the rayon pool; results keep discovery order.
    Parallel,
}

pub struct ComplianceRunner<E> {
    evaluator: E,
    execution: Execution,
}

impl<E: Evaluator> ComplianceRunner<E> {
    pub fn new(evaluator: E) -> Self {
        Self {
            evaluator,
            execution: Execution::Sequential,
        }
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn run(&self, root: &Path) -> Result<Report, HarnessError> {
        let fixtures = discover(root)?;
        info!(
            "running {} fixture files from {}",
            fixtures.files().len(),
            root.display()
        );

        let mut builder = ReportBuilder::new();
        match self.execution {
            Execution::Sequential => {
                for loaded in &fixtures {
                    builder.push(self.execute(loaded));
                }
            }
            Execution::Parallel => {
                let loaded: Vec<LoadedCase> = fixtures.iter().collect();
                let results: Vec<TestResult> = loaded
                    .into_par_iter()
                    .map(|case| self.execute(case))
                    .collect();
                builder.extend(results);
            }
        }

        let report = builder.finalize();
        info!(
            "finished: {} passed, {} failed",
            report.passed, report.failed
        );
        Ok(report)
    }

    fn execute(&self, loaded: LoadedCase) -> TestResult {
        match loaded {
            LoadedCase::Case(case) => run_case(&self.evaluator, &case),
            LoadedCase::Malformed(bad) => malformed_result(bad),
        }
    }
}

/// Runs every fixture under `root` through `evaluator`, one case after the
/// other.
pub fn evaluate_standard_compliance<E: Evaluator + ?Sized>(
    evaluator: &E,
    root: &Path,
) -> Result<Report, HarnessError> {
    ComplianceRunner::new(evaluator).run(root)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Evaluates and judges one case. Never fails.
pub fn run_case<E: Evaluator + ?Sized>(evaluator: &E, case: &TestCase) -> TestResult {
    debug!("evaluating {}: {}", case.source_path.display(), case.name);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        evaluator.evaluate(&case.input, &case.context)
    }))
    .unwrap_or_else(|payload| {
        Err(EvaluationError::new(format!(
            "evaluator panicked: {}",
            panic_message(payload.as_ref())
        )))
    });

    let mut result = TestResult {
        status: Status::Failed,
        path: case.source_path.display().to_string(),
        name: case.name.clone(),
        actual_output: None,
        actual_output_type: None,
        expected_output: Some(case.expected_output.clone()),
        expected_output_type: Some(case.expected_output_type.clone()),
        error: None,
    };

    match outcome {
        Ok(actual) => {
            let verdict = judge(
                &case.expected_output,
                &case.expected_output_type,
                &actual.value,
                actual.type_label.as_deref(),
            );
            if verdict.is_pass() {
                result.status = Status::Passed;
            } else if verdict == Verdict::MissingType {
                result.error = Some("type mismatch: evaluator returned no type".to_string());
            }
            result.actual_output = Some(actual.value);
            result.actual_output_type = actual.type_label;
        }
        Err(e) => {
            result.error = Some(e.message);
        }
    }
    result
}

fn malformed_result(bad: MalformedFixture) -> TestResult {
    TestResult {
        status: Status::Failed,
        path: bad.path.display().to_string(),
        name: bad.name,
        actual_output: None,
        actual_output_type: None,
        expected_output: None,
        expected_output_type: None,
        error: Some(bad.message),
    }
}
