//! Writing fixtures by hand through `$EDITOR`.
//!
//! The editor is opened on a commented template. Multi-line fields sit
//! between `# START_…`/`# END_…` markers; the others are `key: value`
//! lines. `context:` comes last and may span several lines of JSON.

use crate::error::{AuthoringError, HarnessError};
use crate::fixture::discover;
use crate::types::{Context, RawCase};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const INPUT_START: &str = "# START_INPUT";
const INPUT_END: &str = "# END_INPUT";
const EXPECTED_START: &str = "# START_EXPECTED_OUTPUT";
const EXPECTED_END: &str = "# END_EXPECTED_OUTPUT";

struct Fields<'a> {
    name: &'a str,
    input: &'a str,
    expected_output: &'a str,
    expected_output_type: &'a str,
    context: String,
}

fn render_template(f: &Fields<'_>) -> String {
    format!(
        "\
# Lines starting with # are ignored. Save and close the editor when done.

name: {name}

# TokenScript expression, may span several lines
{INPUT_START}
{input}
{INPUT_END}

# Expected result, exactly as the evaluator prints it
{EXPECTED_START}
{expected}
{EXPECTED_END}

expectedOutputType: {ty} # Number, String, Boolean, ...

# Variables as a JSON object, e.g. {{\"x\": 3, \"y\": \"hello\"}}
# Keep this section last.
context: {context}
",
        name = f.name,
        input = f.input,
        expected = f.expected_output,
        ty = f.expected_output_type,
        context = f.context,
    )
}

pub fn blank_template() -> String {
    render_template(&Fields {
        name: "Test name here",
        input: "Your TokenScript expression here",
        expected_output: "Expected result here",
        expected_output_type: "Number",
        context: "{}".to_string(),
    })
}

/// Template pre-filled from an existing fixture document. Missing fields are
/// left as placeholders so the author can fill them in.
pub fn template_from_value(value: &Value) -> String {
    let field = |key: &str, fallback: &'static str| -> String {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };
    let ty = value
        .get("expectedOutputType")
        .or_else(|| value.get("exceptedOutputType"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let context = value
        .get("context")
        .filter(|c| !c.is_null())
        .and_then(|c| serde_json::to_string_pretty(c).ok())
        .unwrap_or_else(|| "{}".to_string());
    let name = field("name", "Test name here");
    let input = field("input", "Your TokenScript expression here");
    let expected = field("expectedOutput", "Expected result here");
    render_template(&Fields {
        name: &name,
        input: &input,
        expected_output: &expected,
        expected_output_type: &ty,
        context,
    })
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Input,
    Expected,
    Context,
}

/// Reads the edited template back into a case.
pub fn parse_editor_content(text: &str) -> Result<RawCase, AuthoringError> {
    let mut name = None;
    let mut input = None;
    let mut expected = None;
    let mut ty = None;
    let mut context_lines: Vec<&str> = Vec::new();

    let mut section: Option<Section> = None;
    let mut collected: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        match (section, trimmed) {
            (None, INPUT_START) => {
                section = Some(Section::Input);
                collected.clear();
                continue;
            }
            (None, EXPECTED_START) => {
                section = Some(Section::Expected);
                collected.clear();
                continue;
            }
            (Some(Section::Input), INPUT_END) => {
                input = Some(collected.join("\n").trim().to_string());
                section = None;
                continue;
            }
            (Some(Section::Expected), EXPECTED_END) => {
                expected = Some(collected.join("\n").trim().to_string());
                section = None;
                continue;
            }
            _ => {}
        }
        if trimmed.starts_with('#') {
            continue;
        }
        match section {
            Some(Section::Input | Section::Expected) => collected.push(line),
            Some(Section::Context) => context_lines.push(line),
            None => {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                let value = value.trim();
                match key.trim() {
                    "name" => name = Some(value.to_string()),
                    "expectedOutputType" | "exceptedOutputType" => {
                        let label = value.split('#').next().unwrap_or("").trim();
                        ty = Some(label.to_string());
                    }
                    "context" => {
                        context_lines.push(value);
                        section = Some(Section::Context);
                    }
                    other => debug!("ignoring template key '{}'", other),
                }
            }
        }
    }

    let context_text = context_lines.join("\n");
    let context: Context = if context_text.trim().is_empty() {
        Context::new()
    } else {
        serde_json::from_str(&context_text).map_err(AuthoringError::InvalidContext)?
    };

    let required = |v: Option<String>, key: &'static str| match v {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AuthoringError::MissingField(key)),
    };
    Ok(RawCase {
        name: required(name, "name")?,
        input: required(input, "input")?,
        expected_output: required(expected, "expectedOutput")?,
        expected_output_type: required(ty, "expectedOutputType")?,
        context: Some(context),
    })
}

/// `$EDITOR`, else vim when installed, else nano. May carry arguments.
pub fn editor_command() -> Vec<String> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| {
            if which::which("vim").is_ok() {
                "vim".to_string()
            } else {
                "nano".to_string()
            }
        });
    editor.split_whitespace().map(str::to_string).collect()
}

/// Opens `initial` in the editor and returns what was saved.
pub fn edit_in_editor(initial: &str) -> Result<String, AuthoringError> {
    let mut file = tempfile::Builder::new().suffix(".tmp").tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    let cmd = editor_command();
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| AuthoringError::Editor {
            editor: String::new(),
            reason: "no editor configured".to_string(),
        })?;
    let status = Command::new(program)
        .args(args)
        .arg(file.path())
        .status()
        .map_err(|e| AuthoringError::Editor {
            editor: program.clone(),
            reason: e.to_string(),
        })?;
    if !status.success() {
        return Err(AuthoringError::Editor {
            editor: program.clone(),
            reason: format!("exited with {status}"),
        });
    }
    Ok(fs::read_to_string(file.path())?)
}

/// `"Test Addition"` becomes `test_addition.json`.
pub fn default_file_name(name: &str) -> String {
    let stem = name.trim().to_lowercase().replace(' ', "_");
    let stem = if stem.is_empty() { "new_test".to_string() } else { stem };
    with_json_extension(&stem)
}

pub fn with_json_extension(file_name: &str) -> String {
    if file_name.ends_with(".json") {
        file_name.to_string()
    } else {
        format!("{file_name}.json")
    }
}

/// Where `create` puts a new fixture: `<root>/<category>/<file>.json`.
pub fn new_fixture_path(root: &Path, category: &str, file_name: Option<&str>, case: &RawCase) -> PathBuf {
    let file = match file_name {
        Some(f) => with_json_extension(f),
        None => default_file_name(&case.name),
    };
    root.join(category).join(file)
}

/// Writes one case with four-space indentation, creating parent directories.
pub fn write_fixture(path: &Path, case: &RawCase) -> Result<(), AuthoringError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    case.serialize(&mut ser)?;
    buf.push(b'\n');
    fs::write(path, buf)?;
    Ok(())
}

/// Fixture document as stored, for pre-filling the editor.
pub fn read_fixture(path: &Path) -> Result<Value, AuthoringError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Fixture files offered by `edit` when no path is given.
pub fn list_fixtures(root: &Path) -> Result<Vec<PathBuf>, HarnessError> {
    discover(root).map(|set| set.files().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn filled_template_round_trips() {
        let doc = json!({
            "name": "test addition",
            "input": "4+{x}\n  + 1",
            "expectedOutput": "8",
            "expectedOutputType": "Number",
            "context": {"x": 3, "label": "hi"}
        });
        let case = parse_editor_content(&template_from_value(&doc)).unwrap();
        assert_eq!(case.name, "test addition");
        assert_eq!(case.input, "4+{x}\n  + 1");
        assert_eq!(case.expected_output, "8");
        assert_eq!(case.expected_output_type, "Number");
        let ctx = case.context.unwrap();
        assert_eq!(ctx["x"], json!(3));
        assert_eq!(ctx["label"], json!("hi"));
    }

    #[test]
    fn typo_key_prefills_type() {
        let doc = json!({"name": "n", "input": "1", "expectedOutput": "1", "exceptedOutputType": "Number"});
        let case = parse_editor_content(&template_from_value(&doc)).unwrap();
        assert_eq!(case.expected_output_type, "Number");
    }

    #[test]
    fn blank_type_is_rejected() {
        let doc = json!({"name": "n", "input": "1", "expectedOutput": "1"});
        let err = parse_editor_content(&template_from_value(&doc)).unwrap_err();
        assert!(matches!(err, AuthoringError::MissingField("expectedOutputType")));
    }

    #[test]
    fn bad_context_is_reported() {
        let text = blank_template().replace("context: {}", "context: {x: 3}");
        let err = parse_editor_content(&text).unwrap_err();
        assert!(matches!(err, AuthoringError::InvalidContext(_)));
    }

    #[test]
    fn file_names() {
        assert_eq!(default_file_name("Test Addition"), "test_addition.json");
        assert_eq!(default_file_name("  "), "new_test.json");
        assert_eq!(with_json_extension("a.json"), "a.json");
        let case = parse_editor_content(&blank_template()).unwrap();
        assert_eq!(
            new_fixture_path(Path::new("tests"), "math", Some("sum"), &case),
            PathBuf::from("tests/math/sum.json")
        );
    }

    #[test]
    fn written_fixture_loads_back() {
        let dir = tempdir().unwrap();
        let case = RawCase {
            name: "n".into(),
            input: "1+1".into(),
            expected_output: "2".into(),
            expected_output_type: "Number".into(),
            context: Some(Context::new()),
        };
        let path = dir.path().join("math/n.json");
        write_fixture(&path, &case).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"name\": \"n\""));
        let loaded = crate::fixture::load_file(&path);
        assert!(matches!(loaded.as_slice(), [crate::fixture::LoadedCase::Case(c)] if c.input == "1+1"));
        assert_eq!(list_fixtures(dir.path()).unwrap(), vec![path]);
    }

    #[test]
    fn listing_a_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let err = list_fixtures(&dir.path().join("no-such-dir")).unwrap_err();
        assert!(matches!(err, HarnessError::Filesystem { .. }));
    }
}
