//! Model alias resolution.
//!
//! Clients name models loosely (`llama3.2`, `sonnet`, a Claude model id); the
//! backend wants its own canonical tag. [`ModelMap`] is built once at startup
//! and only read afterwards, so it is shared across requests without locking.

use crate::config::ModelOverrides;
use std::collections::HashMap;

/// Bare model names mapped to their `:latest` tag.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("llama3.2", "llama3.2:latest"),
    ("llama3.1", "llama3.1:latest"),
    ("llama3", "llama3:latest"),
    ("mistral", "mistral:latest"),
    ("qwen2.5-coder", "qwen2.5-coder:latest"),
    ("codellama", "codellama:latest"),
    ("gemma2", "gemma2:latest"),
    ("phi3", "phi3:latest"),
];

/// Immutable alias → canonical backend model id table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMap {
    entries: HashMap<String, String>,
}

impl ModelMap {
    /// Built-in defaults, then configured aliases, then role overrides.
    ///
    /// Each non-empty role override is registered under its role name and as a
    /// self-mapping, so a canonical id handed back by the client resolves to itself.
    #[must_use]
    pub fn new(overrides: &ModelOverrides) -> Self {
        let mut entries: HashMap<String, String> = DEFAULT_ALIASES
            .iter()
            .map(|&(alias, id)| (alias.to_string(), id.to_string()))
            .collect();

        for (alias, id) in &overrides.aliases {
            entries.insert(alias.clone(), id.clone());
        }

        for (role, value) in overrides.roles() {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            entries.insert(value.to_string(), value.to_string());
            entries.insert(role.to_string(), value.to_string());
        }

        Self { entries }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(&ModelOverrides::default())
    }

    /// Exact-match lookup; unknown aliases are returned unchanged.
    #[must_use]
    pub fn resolve<'a>(&'a self, alias: &'a str) -> &'a str {
        self.entries.get(alias).map_or(alias, String::as_str)
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
