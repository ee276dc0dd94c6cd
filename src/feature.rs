//! Feature module: named, toggleable features and the settings that switch them.
//!
//! A setting is written as `+NAME` or `-NAME`, optionally followed by parameters in
//! parentheses, e.g. `+FRETEQUIV(limit[10] exclude[a] exclude[b])`. Repeating a
//! parameter name gives it several values.

use crate::interceptor::{CompoundInterceptor, InterceptorType, MutationInterceptorFactory};
use crate::MutequivError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of a feature as listed and reported by the host engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    name: String,
    on_by_default: bool,
    description: String,
}

impl Feature {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), on_by_default: false, description: String::new() }
    }

    pub fn with_on_by_default(mut self, on: bool) -> Self {
        self.on_by_default = on;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_on_by_default(&self) -> bool {
        self.on_by_default
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Feature names are not case sensitive.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleStatus {
    Activate,
    Deactivate,
}

/// A parsed `+NAME(...)` / `-NAME(...)` setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSetting {
    pub feature: String,
    pub status: ToggleStatus,
    #[serde(default)]
    pub params: BTreeMap<String, Vec<String>>,
}

impl FeatureSetting {
    pub fn new(feature: impl Into<String>, status: ToggleStatus) -> Self {
        Self { feature: feature.into(), status, params: BTreeMap::new() }
    }

    pub fn is_active(&self) -> bool {
        self.status == ToggleStatus::Activate
    }

    /// First value of a parameter.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_list(&self, name: &str) -> &[String] {
        self.params.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// What an interceptor factory is told when it is asked for an interceptor.
#[derive(Debug, Clone, Default)]
pub struct InterceptorParameters {
    setting: Option<FeatureSetting>,
}

impl InterceptorParameters {
    pub fn new(setting: Option<FeatureSetting>) -> Self {
        Self { setting }
    }

    pub fn setting(&self) -> Option<&FeatureSetting> {
        self.setting.as_ref()
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.setting.as_ref().and_then(|s| s.get_string(name))
    }
}

// Hand-written recursive descent parser for feature settings
pub struct FeatureParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> FeatureParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn parse(input: &str) -> Result<FeatureSetting, MutequivError> {
        let mut parser = FeatureParser::new(input);
        let setting = parser.parse_setting()?;
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            return Err(MutequivError::FeatureParse(format!("Unexpected input at position {}", parser.pos)));
        }
        Ok(setting)
    }

    /// Parses several settings separated by commas.
    pub fn parse_all(input: &str) -> Result<Vec<FeatureSetting>, MutequivError> {
        let mut parser = FeatureParser::new(input);
        let mut settings = Vec::new();
        parser.skip_whitespace();
        if parser.peek().is_none() {
            return Ok(settings);
        }
        loop {
            settings.push(parser.parse_setting()?);
            parser.skip_whitespace();
            if !parser.consume(",") {
                break;
            }
        }
        if parser.pos < parser.input.len() {
            return Err(MutequivError::FeatureParse(format!("Unexpected input at position {}", parser.pos)));
        }
        Ok(settings)
    }

    fn parse_setting(&mut self) -> Result<FeatureSetting, MutequivError> {
        self.skip_whitespace();
        let status = match self.consume_char() {
            Some('+') => ToggleStatus::Activate,
            Some('-') => ToggleStatus::Deactivate,
            _ => {
                return Err(MutequivError::FeatureParse(format!(
                    "Expected '+' or '-' before feature name at position {}",
                    self.pos
                )))
            }
        };
        let name = self.parse_identifier()?;
        let mut setting = FeatureSetting::new(name, status);
        self.skip_whitespace();
        if self.consume("(") {
            loop {
                self.skip_whitespace();
                if self.consume(")") {
                    break;
                }
                let (key, value) = self.parse_param()?;
                setting.params.entry(key).or_default().push(value);
            }
        }
        Ok(setting)
    }

    fn parse_param(&mut self) -> Result<(String, String), MutequivError> {
        let key = self.parse_identifier()?;
        self.skip_whitespace();
        if !self.consume("[") {
            return Err(MutequivError::FeatureParse(format!("Expected '[' at position {}", self.pos)));
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ']' {
                break;
            }
            self.consume_char();
        }
        if self.peek() != Some(']') {
            return Err(MutequivError::FeatureParse(format!("Unterminated parameter value at position {}", start)));
        }
        let value = self.input[start..self.pos].to_string();
        self.consume_char();
        Ok((key, value))
    }

    fn parse_identifier(&mut self) -> Result<String, MutequivError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut end = self.pos;
        for (i, c) in self.input[self.pos..].char_indices() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                end = self.pos + i + c.len_utf8();
            } else {
                break;
            }
        }
        if end > start {
            self.pos = end;
            Ok(self.input[start..end].to_string())
        } else {
            Err(MutequivError::FeatureParse(format!("Expected identifier at position {}", self.pos)))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.consume_char();
            } else {
                break;
            }
        }
    }

    fn consume(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn consume_char(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }
}

/// Resolves which features are enabled: a feature's default, overridden by the last
/// setting naming it.
#[derive(Debug, Clone, Default)]
pub struct FeatureSelector {
    settings: Vec<FeatureSetting>,
}

impl FeatureSelector {
    pub fn new(settings: Vec<FeatureSetting>) -> Self {
        Self { settings }
    }

    pub fn setting_for(&self, feature: &Feature) -> Option<&FeatureSetting> {
        self.settings.iter().rev().find(|s| feature.is_named(&s.feature))
    }

    pub fn is_enabled(&self, feature: &Feature) -> bool {
        self.setting_for(feature)
            .map_or(feature.is_on_by_default(), FeatureSetting::is_active)
    }

    /// Fails on the first setting that names none of `features`.
    pub fn check_known(&self, features: &[Feature]) -> Result<(), MutequivError> {
        match self.settings.iter().find(|s| !features.iter().any(|f| f.is_named(&s.feature))) {
            Some(unknown) => Err(MutequivError::UnknownFeature(unknown.feature.clone())),
            None => Ok(()),
        }
    }

    /// Creates one interceptor per enabled factory, in factory order, wrapped in a filter compound.
    pub fn create_interceptors(
        &self,
        factories: &[&dyn MutationInterceptorFactory],
    ) -> Result<CompoundInterceptor, MutequivError> {
        let features: Vec<Feature> = factories.iter().map(|f| f.provides()).collect();
        self.check_known(&features)?;
        let mut children = Vec::new();
        for (factory, feature) in factories.iter().zip(&features) {
            if !self.is_enabled(feature) {
                log::debug!("feature {} disabled", feature.name());
                continue;
            }
            let params = InterceptorParameters::new(self.setting_for(feature).cloned());
            children.push(factory.create_interceptor(&params));
        }
        Ok(CompoundInterceptor::new(children).with_type(InterceptorType::Filter))
    }
}
