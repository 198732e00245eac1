use crate::state::StepExecution;
use crate::state::StepStatus;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// A single value recorded by a step: either free text or a list of strings
/// (multi-select form fields such as `selected_studio_company_ids`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text.as_str()),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::Text(_) => None,
            FieldValue::List(items) => Some(items.as_slice()),
        }
    }

    /// Confirmation flags arrive as form text. Empty strings and the usual
    /// negative spellings count as unset.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Text(text) => {
                let text = text.trim();
                !text.is_empty()
                    && !text.eq_ignore_ascii_case("false")
                    && !text.eq_ignore_ascii_case("no")
                    && text != "0"
            }
            FieldValue::List(items) => !items.is_empty(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// Raw step data: manual form input or automated step output.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Accumulated view of everything completed steps have recorded for one
/// execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowContext {
    values: FieldMap,
}

impl WorkflowContext {
    /// Merges completed steps in ascending step order. Within a step the
    /// output is applied first and the manual input second, so a human
    /// confirmation wins over an automated value for the same key.
    pub fn from_steps<'a, I>(steps: I) -> Self
    where
        I: IntoIterator<Item = &'a StepExecution>,
    {
        let mut completed: Vec<&StepExecution> = steps
            .into_iter()
            .filter(|step| step.status == StepStatus::Completed)
            .collect();
        completed.sort_by_key(|step| step.step_order);

        let mut context = Self::default();
        for step in completed {
            if let Some(output) = &step.output {
                context.merge(output);
            }
            if let Some(input) = &step.manual_input {
                context.merge(input);
            }
        }
        context
    }

    pub fn merge(&mut self, fields: &FieldMap) {
        for (key, value) in fields {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Text value for `key`, treating empty strings as absent.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(FieldValue::as_text)
            .filter(|text| !text.is_empty())
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(FieldValue::as_list)
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(FieldValue::is_truthy)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<FieldMap> for WorkflowContext {
    fn from(values: FieldMap) -> Self {
        Self { values }
    }
}

/// Text field helper shared by the manual handlers: empty means missing.
pub(crate) fn text_field<'a>(fields: &'a FieldMap, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(FieldValue::as_text)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

pub(crate) fn list_field(fields: &FieldMap, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(FieldValue::List(items)) => items.clone(),
        Some(FieldValue::Text(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    }
}
