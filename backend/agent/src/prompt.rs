//! System/human prompt templates with `{name}` placeholders.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use concierge_core::ConciergeError;
use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").unwrap());

pub type PromptVars = BTreeMap<String, String>;

/// Build prompt variables from `(name, value)` pairs.
pub fn vars<I, K, V>(pairs: I) -> PromptVars
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system: String,
    pub human: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            human: human.into(),
        }
    }

    /// Render both halves. A placeholder without a value is a configuration error.
    pub fn render(&self, vars: &PromptVars) -> Result<(String, String), ConciergeError> {
        Ok((render_one(&self.system, vars)?, render_one(&self.human, vars)?))
    }

    /// Placeholder names used by the template, sorted.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = PLACEHOLDER_RE
            .captures_iter(&self.system)
            .chain(PLACEHOLDER_RE.captures_iter(&self.human))
            .map(|c| c[1].to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn render_one(template: &str, vars: &PromptVars) -> Result<String, ConciergeError> {
    let template = dedent(template);
    let mut missing = Vec::new();
    let rendered = PLACEHOLDER_RE.replace_all(&template, |caps: &Captures| match vars.get(&caps[1]) {
        Some(value) => value.clone(),
        None => {
            missing.push(caps[1].to_string());
            caps[0].to_string()
        }
    });

    if !missing.is_empty() {
        return Err(ConciergeError::Config(format!(
            "missing prompt variables: {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

/// Strip the common leading indentation and surrounding blank lines.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|l| if l.len() >= indent { &l[indent..] } else { l.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
