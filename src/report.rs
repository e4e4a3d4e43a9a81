use crate::t_args;
use crate::types::{Report, Status, TestResult};
use colored::Colorize;

/// Collects results of one run in discovery order.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    results: Vec<TestResult>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn finalize(self) -> Report {
        let passed = self
            .results
            .iter()
            .filter(|r| r.status == Status::Passed)
            .count();
        Report {
            passed,
            failed: self.results.len() - passed,
            results: self.results,
        }
    }
}

impl Extend<TestResult> for ReportBuilder {
    fn extend<I: IntoIterator<Item = TestResult>>(&mut self, iter: I) {
        self.results.extend(iter);
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OutputKind {
    #[default]
    Normal,
    Compact,
    Terse,
    Final,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct RenderOptions {
    pub kind: OutputKind,
    pub hide_passes: bool,
    pub hide_fails: bool,
}

impl RenderOptions {
    fn shows(&self, r: &TestResult) -> bool {
        if r.passed() {
            !self.hide_passes
        } else {
            !self.hide_fails
        }
    }
}

/// The report in its contract JSON form.
pub fn render_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn header(report: &Report) -> String {
    t_args!("report-summary",
        "total" => report.total(),
        "passed" => report.passed.to_string().green(),
        "failed" => if report.failed > 0 {
            report.failed.to_string().red().bold().to_string()
        } else {
            report.failed.to_string().green().to_string()
        }
    )
}

fn or_null(v: &Option<String>) -> String {
    match v {
        Some(s) => format!("{s:?}"),
        None => "null".to_string(),
    }
}

pub fn render_human(report: &Report, opts: &RenderOptions) -> String {
    let mut out = String::new();
    match opts.kind {
        OutputKind::Final => {
            out.push_str(&format!("{}/{}\n", report.passed, report.total()));
        }
        OutputKind::Terse => {
            for r in report.results.iter().filter(|r| opts.shows(r)) {
                if r.passed() {
                    out.push_str(&".".green().to_string());
                } else {
                    out.push_str(&"F".red().bold().to_string());
                }
            }
            out.push('\n');
        }
        OutputKind::Compact => {
            out.push_str(&header(report));
            out.push('\n');
            for r in report.results.iter().filter(|r| opts.shows(r)) {
                let mark = if r.passed() {
                    "[PASS]".green().bold()
                } else {
                    "[FAIL]".red().bold()
                };
                out.push_str(&format!("{} {}: {}\n", mark, r.path, r.name));
            }
        }
        OutputKind::Normal => {
            out.push_str(&header(report));
            out.push('\n');
            for r in report.results.iter().filter(|r| opts.shows(r)) {
                if r.passed() {
                    out.push_str(&format!("{} {}\n", "[OK]".green().bold(), r.name.green()));
                    continue;
                }
                out.push_str(&format!("{} {}\n", "[FAIL]".red().bold(), r.name.red().bold()));
                out.push_str(&format!("  {} {}\n", "path    :".bold(), r.path));
                if let Some(err) = &r.error {
                    out.push_str(&format!("  {} {}\n", "error   :".bold(), err.red()));
                }
                if r.expected_output.is_some() || r.actual_output.is_some() {
                    out.push_str(&format!(
                        "  {} {} ({})\n",
                        "expected:".bold(),
                        or_null(&r.expected_output),
                        or_null(&r.expected_output_type)
                    ));
                    out.push_str(&format!(
                        "  {} {} ({})\n",
                        "actual  :".bold(),
                        or_null(&r.actual_output),
                        or_null(&r.actual_output_type)
                    ));
                }
            }
        }
    }
    out
}

pub fn print_human(report: &Report, opts: &RenderOptions) {
    print!("{}", render_human(report, opts));
}
