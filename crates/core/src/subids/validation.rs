use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::template::SubIdTemplate;
use super::SUB_ID_COUNT;
use crate::errors::DomainError;

static CATEGORY_SLUG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").ok());

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Structural checks for a sub-id tuple under one template.
#[derive(Clone, Debug)]
pub struct SubIdValidator {
    platform_token: String,
    partner_token: String,
    prefix: String,
    global_code: Regex,
    category_code: Regex,
}

impl SubIdValidator {
    pub fn new(template: &SubIdTemplate) -> Result<Self, DomainError> {
        let prefix = regex::escape(&template.prefix);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|err| {
                DomainError::InvariantViolation(format!("sub-id pattern `{pattern}`: {err}"))
            })
        };

        Ok(Self {
            platform_token: template.platform_token.clone(),
            partner_token: template.partner_token.clone(),
            prefix: template.prefix.clone(),
            global_code: compile(format!(r"^{prefix}\d{{5}}$"))?,
            category_code: compile(format!(r"^{prefix}_[A-Z]{{3}}\d{{5}}$"))?,
        })
    }

    /// Checks every field and collects all failures rather than stopping at
    /// the first one.
    pub fn validate<S: AsRef<str>>(&self, sub_ids: &[S]) -> ValidationReport {
        if sub_ids.len() != SUB_ID_COUNT {
            return ValidationReport {
                is_valid: false,
                errors: vec![format!(
                    "expected {SUB_ID_COUNT} sub-ids, got {}",
                    sub_ids.len()
                )],
            };
        }

        let field = |index: usize| sub_ids[index].as_ref();
        let mut errors = Vec::new();

        if field(0) != self.platform_token {
            errors.push(format!("s1 must be \"{}\"", self.platform_token));
        }
        if field(1) != self.partner_token {
            errors.push(format!("s2 must be \"{}\"", self.partner_token));
        }
        if !CATEGORY_SLUG.as_ref().is_some_and(|slug| slug.is_match(field(2))) {
            errors.push(
                "s3 (category) must contain only lowercase letters, digits and underscores"
                    .to_string(),
            );
        }
        if !self.global_code.is_match(field(3)) {
            errors.push(format!(
                "s4 must follow the pattern {}##### (e.g. {}00001)",
                self.prefix, self.prefix
            ));
        }
        if !self.category_code.is_match(field(4)) {
            errors.push(format!(
                "s5 must follow the pattern {}_XXX##### (e.g. {}_ELE00001)",
                self.prefix, self.prefix
            ));
        }

        ValidationReport { is_valid: errors.is_empty(), errors }
    }
}
