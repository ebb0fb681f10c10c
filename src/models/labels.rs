//! Ownership label convention
//!
//! Every object this crate manages carries `<prefix>.content=true`; pods and
//! services of one workload additionally carry `<prefix>.service.label=<name>`.
//! These keys are the only query interface against the cluster, so they must
//! stay byte-for-byte compatible with objects created by earlier deployments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default label prefix
pub const DEFAULT_LABEL_PREFIX: &str = "soajs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelScheme {
    prefix: String,
}

impl Default for LabelScheme {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_PREFIX)
    }
}

impl LabelScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}.{}", self.prefix, suffix)
        }
    }

    /// `<prefix>.content`
    pub fn ownership_key(&self) -> String {
        self.key("content")
    }

    /// `<prefix>.service.label`
    pub fn workload_key(&self) -> String {
        self.key("service.label")
    }

    /// `<prefix>.service.replicas`
    pub fn replicas_key(&self) -> String {
        self.key("service.replicas")
    }

    pub fn secret_name_key(&self) -> String {
        self.key("secret.name")
    }

    pub fn secret_type_key(&self) -> String {
        self.key("secret.type")
    }

    /// Selector matching every managed object
    pub fn ownership_selector(&self) -> String {
        format!("{}=true", self.ownership_key())
    }

    /// Selector matching the pods of one workload
    pub fn workload_selector(&self, label: &str) -> String {
        format!("{}={}", self.workload_key(), label)
    }

    pub fn ownership_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.ownership_key(), "true".to_string())])
    }

    pub fn is_owned(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        labels
            .and_then(|l| l.get(&self.ownership_key()))
            .is_some_and(|v| v == "true")
    }
}

/// Evaluate an equality-based selector (`k=v,k2=v2`) against a label set.
///
/// An empty selector matches everything.
pub fn selector_matches(selector: &str, labels: Option<&BTreeMap<String, String>>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            let (key, value) = match term.split_once("==").or_else(|| term.split_once('=')) {
                Some((k, v)) => (k.trim(), v.trim()),
                None => return labels.is_some_and(|l| l.contains_key(term)),
            };
            labels
                .and_then(|l| l.get(key))
                .is_some_and(|v| v == value)
        })
}
