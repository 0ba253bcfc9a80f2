use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One parish record. Kept as the raw object so rewriting a document doesn't reorder its keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parish(pub Map<String, Value>);

impl Parish {
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> &str {
        self.str("name").unwrap_or("Unknown")
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Replaces in place, or appends a new key.
    pub fn set(&mut self, key: &str, value: Value) {
        match self.0.get_mut(key) {
            Some(slot) => *slot = value,
            None => { self.0.insert(key.to_owned(), value); }
        }
    }
}

/// A per-diocese document: `{ ..., "parishes": [...] }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParishDocument(pub Value);

impl ParishDocument {
    pub fn parishes(&self) -> anyhow::Result<Vec<Parish>> {
        let Some(parishes) = self.0.get("parishes") else { bail!("no 'parishes' key") };
        Ok(serde_json::from_value(parishes.clone())?)
    }

    /// New document with the parish list replaced and every other key untouched.
    pub fn with_parishes(&self, parishes: Vec<Parish>) -> anyhow::Result<Self> {
        let mut doc = self.0.clone();
        let Some(slot) = doc.get_mut("parishes") else { bail!("no 'parishes' key") };
        *slot = serde_json::to_value(parishes)?;
        Ok(Self(doc))
    }
}
