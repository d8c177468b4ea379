//! Named deployment environment profiles.
//!
//! Each profile becomes a template-configuration file in the build output
//! (`test.json`, `production.json`) that the test and production deploy
//! actions read their parameter overrides from. Profiles are plain values
//! handed to the builders; there is no process-wide registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A named set of variables for one deployment environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    /// Profile name; also the configuration file stem.
    pub name: String,
    /// Variables applied to stacks deployed with this profile.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
}

impl EnvironmentProfile {
    /// Creates an empty profile.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
        }
    }

    /// Adds a variable.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// File name of the template configuration for this profile.
    #[must_use]
    pub fn config_file_name(&self) -> String {
        format!("{}.json", self.name)
    }

    /// Renders the template configuration document.
    #[must_use]
    pub fn template_configuration(&self) -> Value {
        json!({ "Parameters": self.variables })
    }
}

/// The profiles used by the test and production stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfiles {
    /// Profile for the test stack.
    pub test: EnvironmentProfile,
    /// Profile for the production stack.
    pub production: EnvironmentProfile,
}

impl Default for EnvironmentProfiles {
    fn default() -> Self {
        Self {
            test: EnvironmentProfile::new("test").with_variable("MESSAGE", "Hello Test!"),
            production: EnvironmentProfile::new("production")
                .with_variable("MESSAGE", "Hello Production!"),
        }
    }
}

impl EnvironmentProfiles {
    /// Creates profiles from explicit values.
    #[must_use]
    pub fn new(test: EnvironmentProfile, production: EnvironmentProfile) -> Self {
        Self { test, production }
    }

    /// Iterates the profiles, test first.
    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentProfile> {
        [&self.test, &self.production].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let profiles = EnvironmentProfiles::default();
        assert_eq!(profiles.test.config_file_name(), "test.json");
        assert_eq!(profiles.production.config_file_name(), "production.json");
        assert_eq!(
            profiles.production.variables.get("MESSAGE").map(String::as_str),
            Some("Hello Production!")
        );
    }

    #[test]
    fn test_template_configuration_shape() {
        let profile = EnvironmentProfile::new("staging").with_variable("MESSAGE", "hi");
        assert_eq!(
            profile.template_configuration(),
            json!({"Parameters": {"MESSAGE": "hi"}})
        );
    }

    #[test]
    fn test_iter_order() {
        let names: Vec<_> = EnvironmentProfiles::default()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["test", "production"]);
    }
}
