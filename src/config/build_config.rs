use super::error::ConfigError;
use super::parser::{PHYS_MODELS, SPLIT_CATS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The user-editable description of one build: which prototype models take
/// part (`physModels`), which dataset categories split the data
/// (`splitCats`), and one line of splitting rules per model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(rename = "physModels", default)]
    pub phys_models: String,
    #[serde(rename = "splitCats", default)]
    pub split_cats: String,
    /// Splitting rules keyed by prototype model name.
    #[serde(flatten)]
    pub rules: IndexMap<String, String>,
}

impl BuildConfig {
    pub fn new() -> Self { Self::default() }

    /// A blank configuration with one (empty) rule entry per model name.
    pub fn for_models<'a>(models: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            rules: models.into_iter().map(|m| (m.to_string(), String::new())).collect(),
            ..Default::default()
        }
    }

    pub fn set(&mut self, field: &str, value: &str) -> &mut Self {
        match field {
            PHYS_MODELS => self.phys_models = value.to_string(),
            SPLIT_CATS => self.split_cats = value.to_string(),
            model => {
                self.rules.insert(model.to_string(), value.to_string());
            }
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            PHYS_MODELS => Some(&self.phys_models),
            SPLIT_CATS => Some(&self.split_cats),
            model => self.rules.get(model).map(String::as_str),
        }
    }

    /// The rule line of `model`, if it has a non-blank one.
    pub fn rules_for(&self, model: &str) -> Option<&str> {
        self.rules.get(model).map(String::as_str).filter(|r| !r.trim().is_empty())
    }

    /// Reads `key = value` lines. A trailing backslash continues the value on
    /// the next line, `#` starts a comment.
    pub fn from_text(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        let mut pending: Option<(usize, String)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            let (body, continued) = match content.strip_suffix('\\') {
                Some(body) => (body.trim_end_matches('\\').trim(), true),
                None => (content, false),
            };

            let (start, mut logical) = pending.take().unwrap_or((line_no, String::new()));
            if !body.is_empty() {
                if !logical.is_empty() {
                    logical.push(' ');
                }
                logical.push_str(body);
            }
            if continued {
                pending = Some((start, logical));
                continue;
            }
            if logical.is_empty() {
                continue;
            }

            let Some((key, value)) = logical.split_once('=') else {
                return Err(ConfigError::Syntax { line: start, reason: format!("expected '<name> = <value>', found '{logical}'") });
            };
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(ConfigError::Syntax { line: start, reason: format!("invalid entry name '{key}'") });
            }
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            config.set(key, &value);
        }

        if let Some((start, _)) = pending {
            return Err(ConfigError::Syntax { line: start, reason: "continuation at end of input".into() });
        }
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a `.json` file as JSON and anything else as text.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_text(&text),
        }
    }
}
