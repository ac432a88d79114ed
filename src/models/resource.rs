//! Resource model.
//!
//! Resources are the people or equipment assigned to tasks. A task holds
//! a list of [`ResourceRef`] (resource id plus allocation unit); in resource
//! view each resource also owns a synthetic group row whose children are
//! clones of the tasks assigned to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a resource id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads an id from a JSON cell (number or non-empty string).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(
                n.as_i64().map(|v| v.to_string()).unwrap_or_else(|| n.to_string()),
            )),
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            _ => None,
        }
    }

    /// Writes the id back as a JSON cell, numeric when possible.
    pub fn to_value(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(self.0.clone()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ResourceId {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl From<&str> for ResourceId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// A resource that can be assigned to tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: ResourceId,
    /// Human-readable name.
    pub name: String,
    /// Default allocation in percent (100 = full time).
    #[serde(default = "default_unit")]
    pub unit: f64,
}

fn default_unit() -> f64 {
    100.0
}

impl Resource {
    /// Creates a full-time resource.
    pub fn new(id: impl Into<ResourceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: 100.0,
        }
    }

    /// Sets the default allocation unit.
    pub fn with_unit(mut self, unit: f64) -> Self {
        self.unit = unit.max(0.0);
        self
    }

    /// A reference to this resource at its default unit.
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            id: self.id.clone(),
            name: self.name.clone(),
            unit: self.unit,
        }
    }
}

/// A resource assignment on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Assigned resource.
    pub id: ResourceId,
    /// Resource name (denormalized for display).
    pub name: String,
    /// Allocation in percent.
    pub unit: f64,
}

impl ResourceRef {
    /// Creates a full-time assignment.
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            unit: 100.0,
        }
    }

    /// Sets the allocation unit.
    pub fn with_unit(mut self, unit: f64) -> Self {
        self.unit = unit.max(0.0);
        self
    }
}

/// Total allocation of a resource list, as a fraction (1.0 = one full-time resource).
pub fn total_units(resources: &[ResourceRef]) -> f64 {
    resources.iter().map(|r| r.unit).sum::<f64>() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_builder() {
        let r = Resource::new(1, "Martin").with_unit(50.0);
        assert_eq!(r.id, ResourceId::from(1));
        assert_eq!(r.name, "Martin");
        assert!((r.unit - 50.0).abs() < 1e-10);

        let rr = r.to_ref();
        assert_eq!(rr.id.as_str(), "1");
        assert!((rr.unit - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_unit_clamping() {
        let r = ResourceRef::new("R").with_unit(-5.0);
        assert_eq!(r.unit, 0.0);
    }

    #[test]
    fn test_total_units() {
        let list = vec![ResourceRef::new(1), ResourceRef::new(2).with_unit(50.0)];
        assert!((total_units(&list) - 1.5).abs() < 1e-10);
        assert_eq!(total_units(&[]), 0.0);
    }

    #[test]
    fn test_resource_id_values() {
        assert_eq!(ResourceId::from_value(&json!(4)), Some(ResourceId::from(4)));
        assert_eq!(ResourceId::from(4).to_value(), json!(4));
        assert_eq!(ResourceId::from("x").to_value(), json!("x"));
        assert_eq!(ResourceId::from_value(&json!(null)), None);
    }
}
