use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DEFAULT_TEMPLATE_NAME: &str = "Template Padrão";
pub const DEFAULT_PLATFORM_TOKEN: &str = "salesmartins";
pub const DEFAULT_PARTNER_TOKEN: &str = "sentinnellanalytics";
pub const DEFAULT_PREFIX: &str = "SM";

/// Fixed tokens and code prefix used to mint and validate a sub-id tuple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubIdTemplate {
    pub name: String,
    pub platform_token: String,
    pub partner_token: String,
    pub prefix: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Default for SubIdTemplate {
    fn default() -> Self {
        Self {
            name: DEFAULT_TEMPLATE_NAME.to_string(),
            platform_token: DEFAULT_PLATFORM_TOKEN.to_string(),
            partner_token: DEFAULT_PARTNER_TOKEN.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            is_default: true,
        }
    }
}

impl SubIdTemplate {
    pub fn custom(
        name: impl Into<String>,
        platform_token: impl Into<String>,
        partner_token: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            platform_token: platform_token.into(),
            partner_token: partner_token.into(),
            prefix: prefix.into(),
            is_default: false,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("template name is required".to_string());
        }
        if self.platform_token.trim().is_empty() {
            errors.push("platform token is required".to_string());
        }
        if self.partner_token.trim().is_empty() {
            errors.push("partner token is required".to_string());
        }
        if self.prefix.is_empty()
            || self.prefix.len() > 8
            || !self.prefix.chars().all(|ch| ch.is_ascii_uppercase())
        {
            errors.push(format!(
                "prefix `{}` must be 1 to 8 uppercase ASCII letters",
                self.prefix
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation { errors })
        }
    }
}

/// Ordered list of templates with one selected. Index 0 is always the
/// built-in default, which can be selected but never changed or removed.
#[derive(Clone, Debug)]
pub struct TemplateRegistry {
    templates: Vec<SubIdTemplate>,
    selected: usize,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self { templates: vec![SubIdTemplate::default()], selected: 0 }
    }
}

impl TemplateRegistry {
    /// Restores saved templates. Any entries flagged as default are dropped
    /// in favour of the built-in one.
    pub fn from_saved(saved: Vec<SubIdTemplate>) -> Self {
        let mut registry = Self::default();
        registry.templates.extend(saved.into_iter().filter(|template| !template.is_default));
        registry
    }

    pub fn add(&mut self, template: SubIdTemplate) -> Result<usize, DomainError> {
        let template = SubIdTemplate { is_default: false, ..template };
        template.validate()?;
        self.templates.push(template);
        Ok(self.templates.len() - 1)
    }

    pub fn update(&mut self, index: usize, template: SubIdTemplate) -> Result<(), DomainError> {
        self.ensure_mutable(index, "modify")?;
        let template = SubIdTemplate { is_default: false, ..template };
        template.validate()?;
        self.templates[index] = template;
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<SubIdTemplate, DomainError> {
        self.ensure_mutable(index, "delete")?;
        let removed = self.templates.remove(index);
        if self.selected == index {
            self.selected = 0;
        } else if self.selected > index {
            self.selected -= 1;
        }
        Ok(removed)
    }

    pub fn select(&mut self, index: usize) -> Result<&SubIdTemplate, DomainError> {
        if index >= self.templates.len() {
            return Err(DomainError::Lookup(format!("template {index} not found")));
        }
        self.selected = index;
        Ok(&self.templates[index])
    }

    pub fn current(&self) -> &SubIdTemplate {
        &self.templates[self.selected]
    }

    pub fn all(&self) -> &[SubIdTemplate] {
        &self.templates
    }

    fn ensure_mutable(&self, index: usize, action: &str) -> Result<(), DomainError> {
        match self.templates.get(index) {
            None => Err(DomainError::Lookup(format!("template {index} not found"))),
            Some(template) if template.is_default => {
                Err(DomainError::Input(format!("cannot {action} the default template")))
            }
            Some(_) => Ok(()),
        }
    }
}
