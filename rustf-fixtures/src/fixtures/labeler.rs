//! Stable fixture labels

use super::LabelMapping;
use crate::config::DEFAULT_LABEL;
use crate::error::{Error, Result};
use crate::models::inflection::parameterize;
use crate::store::Record;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static TEMPLATE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\{([^}]+)\}").expect("Labeler: Invalid template placeholder regex")
});

/// Computes the label of every record written to a fixture file
///
/// Labels already known from the loaded fixtures are kept unless `rename`
/// is set, so regenerating leaves existing entries where they were.
pub struct Labeler<'a> {
    mapping: &'a LabelMapping,
    templates: &'a BTreeMap<String, String>,
    rename: bool,
}

impl<'a> Labeler<'a> {
    pub fn new(
        mapping: &'a LabelMapping,
        templates: &'a BTreeMap<String, String>,
        rename: bool,
    ) -> Self {
        Self {
            mapping,
            templates,
            rename,
        }
    }

    pub fn label_for(&self, table: &str, record: &Record) -> Result<String> {
        if !self.rename {
            if let Some(label) = self.mapping.get(&(table.to_string(), record.id)) {
                return Ok(label.clone());
            }
        }
        self.fresh_label(table, record)
    }

    /// Label from the table's template, or `<table>_<id>` without one
    pub fn fresh_label(&self, table: &str, record: &Record) -> Result<String> {
        match self.templates.get(table) {
            Some(template) if template != DEFAULT_LABEL => {
                let interpolated = interpolate(table, template, record)?;
                Ok(parameterize(&interpolated))
            }
            _ => Ok(format!("{}_{}", table, record.id)),
        }
    }
}

fn interpolate(table: &str, template: &str, record: &Record) -> Result<String> {
    let mut missing = None;
    let interpolated = TEMPLATE_PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let attribute = caps[1].trim();
        match record.get(attribute) {
            Some(value) => value.as_string().unwrap_or_default(),
            None => {
                missing.get_or_insert_with(|| attribute.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(attribute) => Err(Error::MissingAttribute {
            table: table.to_string(),
            attribute,
        }),
        None => Ok(interpolated.into_owned()),
    }
}
