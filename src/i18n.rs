//! Message catalogues for everything a person reads on the terminal.
//!
//! Report contents are not localized; they form the machine-readable output.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::OnceLock;

static LOCALIZER: OnceLock<Localizer> = OnceLock::new();

const ENGLISH: &str = include_str!("../locales/en.ftl");
const NYNORSK: &str = include_str!("../locales/nn.ftl");

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Language {
    English,
    Nynorsk,
}

impl Language {
    fn catalogue(self) -> &'static str {
        match self {
            Language::English => ENGLISH,
            Language::Nynorsk => NYNORSK,
        }
    }
}

/// Load the catalogue now instead of on first lookup.
pub fn init() {
    localizer();
}

fn localizer() -> &'static Localizer {
    LOCALIZER.get_or_init(|| Localizer::new(detect_language()))
}

pub fn t(key: &str) -> String {
    localizer().get(key)
}

pub fn t_with_args(key: &str, args: &[(&str, &dyn Display)]) -> String {
    localizer().get_with_args(key, args)
}

/// `"nn_NO.UTF-8"` is Nynorsk, `"en-GB"` English, anything else unknown.
pub fn language_from_locale(locale: &str) -> Option<Language> {
    let code = locale
        .split(['.', '@'])
        .next()
        .unwrap_or(locale)
        .split(['_', '-'])
        .next()
        .unwrap_or("")
        .to_lowercase();
    match code.as_str() {
        "nn" | "nno" => Some(Language::Nynorsk),
        "en" | "c" | "posix" => Some(Language::English),
        _ => None,
    }
}

fn detect_language() -> Language {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| language_from_locale(&value))
        .unwrap_or(Language::English)
}

/// Parses `key = value` lines; blank lines and `#` comments are skipped.
fn parse_catalogue(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(" = "))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

#[derive(Debug)]
pub struct Localizer {
    messages: HashMap<String, String>,
    fallback: HashMap<String, String>,
}

impl Localizer {
    pub fn new(language: Language) -> Self {
        Self {
            messages: parse_catalogue(language.catalogue()),
            fallback: parse_catalogue(ENGLISH),
        }
    }

    pub fn get(&self, key: &str) -> String {
        self.messages
            .get(key)
            .or_else(|| self.fallback.get(key))
            .cloned()
            .unwrap_or_else(|| {
                tracing::warn!("Missing translation key: {key}");
                format!("MISSING: {key}")
            })
    }

    pub fn get_with_args(&self, key: &str, args: &[(&str, &dyn Display)]) -> String {
        args.iter()
            .fold(self.get(key), |message, (name, value)| {
                message.replace(&format!("{{${name}}}"), &value.to_string())
            })
    }
}

#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::t($key)
    };
}

#[macro_export]
macro_rules! t_args {
    ($key:expr, $($name:expr => $value:expr),*) => {{
        let args: &[(&str, &dyn std::fmt::Display)] = &[
            $(
                ($name, &$value),
            )*
        ];
        $crate::i18n::t_with_args($key, args)
    }};
}
