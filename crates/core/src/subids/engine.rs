use super::counters::CounterState;
use super::format::{category_code, global_code, prepare_category_slug};
use super::template::SubIdTemplate;
use super::validation::{SubIdValidator, ValidationReport};
use super::SubIdTuple;
use crate::domain::category::CategoryInfo;
use crate::domain::product::Product;
use crate::errors::DomainError;

/// Mints sub-id tuples for one template.
#[derive(Clone, Debug)]
pub struct SubIdEngine {
    template: SubIdTemplate,
    validator: SubIdValidator,
}

impl SubIdEngine {
    pub fn new(template: SubIdTemplate) -> Result<Self, DomainError> {
        template.validate()?;
        let validator = SubIdValidator::new(&template)?;
        Ok(Self { template, validator })
    }

    pub fn template(&self) -> &SubIdTemplate {
        &self.template
    }

    /// Assembles a tuple from already-issued counter values.
    pub fn build_sub_ids(
        &self,
        category: &CategoryInfo,
        global_value: u64,
        category_value: u64,
    ) -> SubIdTuple {
        SubIdTuple {
            s1: self.template.platform_token.clone(),
            s2: self.template.partner_token.clone(),
            s3: prepare_category_slug(&category.name),
            s4: global_code(&self.template.prefix, global_value),
            s5: category_code(&self.template.prefix, &category.sigla, category_value),
        }
    }

    /// Issues one global and one category counter value and returns the
    /// validated tuple with the advanced state.
    ///
    /// When the tuple fails validation the error lists every failing field
    /// and no advanced state is returned, so the caller's counters are left
    /// exactly as they were.
    pub fn generate_sub_ids(
        &self,
        product: &Product,
        category: &CategoryInfo,
        counters: &CounterState,
    ) -> Result<(SubIdTuple, CounterState), DomainError> {
        let (global_value, counters) = counters.next_global_counter();
        let (category_value, counters) = counters.next_category_counter(&category.sigla);
        let sub_ids = self.build_sub_ids(category, global_value, category_value);

        let report = self.validate_sub_ids(&sub_ids);
        if !report.is_valid {
            tracing::warn!(
                event_name = "subids.validation_failed",
                product_id = product.id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
                category = %category.name,
                sigla = %category.sigla,
                errors = ?report.errors,
                "generated sub-ids failed validation"
            );
            return Err(DomainError::Validation { errors: report.errors });
        }

        Ok((sub_ids, counters))
    }

    pub fn validate_sub_ids(&self, sub_ids: &SubIdTuple) -> ValidationReport {
        self.validator.validate(&sub_ids.as_array())
    }

    pub fn validate_raw<S: AsRef<str>>(&self, sub_ids: &[S]) -> ValidationReport {
        self.validator.validate(sub_ids)
    }
}
