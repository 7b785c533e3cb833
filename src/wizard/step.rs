//! Step definitions and the typed per-step payload contract.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::WizardError;

/// 1-based, order-significant step identifier
pub type StepId = u32;

/// Accumulated form data, one record per step
pub type StepData<P> = BTreeMap<StepId, P>;

/// Name of the serde tag carried by every step payload
pub const STEP_TAG: &str = "step";

/// Predicate deciding whether a step is bypassed given the data entered so far
pub type SkipPredicate<P> = Arc<dyn Fn(&StepData<P>) -> bool + Send + Sync>;

/// Extra per-step check run at the step boundary, after required fields
pub type FieldCheck<P> = fn(&P) -> Vec<FieldError>;

/// Inline validation message for a single form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Per-step form record.
///
/// Implemented by an enum whose variants are the concrete record types of a
/// wizard's steps, serialized internally tagged by [`STEP_TAG`]. Record fields
/// are optional and skipped when unset, so a record's serialized object holds
/// exactly the keys the user has filled in.
pub trait StepPayload:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Step this record belongs to
    fn step_id(&self) -> StepId;

    /// Every serialized field of this record, without the step tag
    fn present_fields(&self) -> Result<Map<String, Value>, WizardError> {
        match serde_json::to_value(self)? {
            Value::Object(mut map) => {
                map.remove(STEP_TAG);
                Ok(map)
            }
            other => Err(WizardError::Payload(format!(
                "step record serialized to {other} instead of an object"
            ))),
        }
    }

    /// Filled-in fields of this record: present and not blank
    fn fields(&self) -> Result<Map<String, Value>, WizardError> {
        let mut map = self.present_fields()?;
        map.retain(|_, v| !is_blank(v));
        Ok(map)
    }

    /// True when no field of the record is filled in
    fn is_blank(&self) -> bool {
        self.fields().map(|f| f.is_empty()).unwrap_or(true)
    }

    /// Shallow-merge the present keys of `patch` into this record.
    ///
    /// Blank values overwrite. Keys the patch does not serialize are kept.
    fn merge(&mut self, patch: Self) -> Result<(), WizardError> {
        if patch.step_id() != self.step_id() {
            return Err(WizardError::StepMismatch {
                expected: self.step_id(),
                actual: patch.step_id(),
            });
        }
        self.merge_fields(patch.present_fields()?)
    }

    /// Shallow-merge raw field values; `null` unsets the field
    fn merge_fields(&mut self, fields: Map<String, Value>) -> Result<(), WizardError> {
        let mut merged = serde_json::to_value(&*self)?;
        if let Value::Object(base) = &mut merged {
            for (key, value) in fields {
                if key == STEP_TAG {
                    continue;
                }
                if value.is_null() {
                    base.remove(&key);
                } else {
                    base.insert(key, value);
                }
            }
        }
        *self = serde_json::from_value(merged)?;
        Ok(())
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Build a step record from an untagged JSON object of field values
pub fn payload_from_fields<P: StepPayload>(slug: &str, fields: Value) -> Result<P, WizardError> {
    let mut map = match fields {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(WizardError::Payload(format!(
                "expected an object of field values, got {other}"
            )))
        }
    };
    map.retain(|_, v| !v.is_null());
    map.insert(STEP_TAG.to_string(), Value::String(slug.to_string()));
    Ok(serde_json::from_value(Value::Object(map))?)
}

/// One step of a wizard definition
pub struct WizardStep<P> {
    pub id: StepId,
    /// Serde tag of this step's record
    pub slug: &'static str,
    pub title: &'static str,
    pub(crate) skip: Option<SkipPredicate<P>>,
    pub(crate) required: Vec<&'static str>,
    pub(crate) check: Option<FieldCheck<P>>,
}

impl<P: StepPayload> WizardStep<P> {
    pub fn new(id: StepId, slug: &'static str, title: &'static str) -> Self {
        Self {
            id,
            slug,
            title,
            skip: None,
            required: Vec::new(),
            check: None,
        }
    }

    /// Bypass this step whenever `predicate` holds for the accumulated data
    pub fn skip_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StepData<P>) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(predicate));
        self
    }

    /// Fields that must be filled before moving past this step
    pub fn require(mut self, fields: &[&'static str]) -> Self {
        self.required.extend_from_slice(fields);
        self
    }

    pub fn check(mut self, check: FieldCheck<P>) -> Self {
        self.check = Some(check);
        self
    }

    pub fn has_skip_rule(&self) -> bool {
        self.skip.is_some()
    }

    pub fn required_fields(&self) -> &[&'static str] {
        &self.required
    }

    pub fn is_skipped(&self, data: &StepData<P>) -> bool {
        self.skip.as_ref().is_some_and(|skip| skip(data))
    }

    /// Validate this step's record (absent record = nothing filled in)
    pub fn validate(&self, record: Option<&P>) -> Vec<FieldError> {
        let fields = record.and_then(|r| r.fields().ok()).unwrap_or_default();
        let mut errors: Vec<FieldError> = self
            .required
            .iter()
            .filter(|name| !fields.contains_key(**name))
            .map(|name| FieldError::required(*name))
            .collect();

        if let (Some(check), Some(record)) = (self.check, record) {
            errors.extend(check(record));
        }
        errors
    }
}

impl<P> fmt::Debug for WizardStep<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardStep")
            .field("id", &self.id)
            .field("slug", &self.slug)
            .field("title", &self.title)
            .field("skip", &self.skip.is_some())
            .field("required", &self.required)
            .finish()
    }
}
