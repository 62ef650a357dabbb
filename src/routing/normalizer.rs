//! Raw label → category reconciliation
//!
//! Stages, first match wins:
//! 1. exact canonical name (case-insensitive, trimmed)
//! 2. substring containment of an alias in the lowercased, trimmed label;
//!    canonical names count as aliases here, longer aliases are tried first
//! 3. the configured default category
//!
//! `normalize` is total and never leaves the closed set.

use crate::category::{Category, CategorySet};
use crate::config::{ConfigError, DispatchConfig};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CategoryNormalizer {
    categories: CategorySet,
    /// Lowercased alias phrases, longest first
    aliases: Vec<(String, Category)>,
}

impl CategoryNormalizer {
    /// Build from a category set and `(alias, category name)` pairs.
    ///
    /// Pairs are taken in the order given; among aliases of equal length the
    /// earlier pair wins. Canonical names are registered ahead of all pairs.
    pub fn new<I, A, C>(categories: CategorySet, aliases: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let mut table: Vec<(String, Category)> = categories
            .iter()
            .map(|c| (c.as_str().to_lowercase(), c.clone()))
            .collect();

        for (alias, target) in aliases {
            let (alias, target) = (alias.as_ref(), target.as_ref());
            let phrase = alias.trim().to_lowercase();
            if phrase.is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "empty alias for category '{target}'"
                )));
            }
            let category = categories.get(target).ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "alias '{alias}' references unknown category '{target}'"
                ))
            })?;
            table.push((phrase, category.clone()));
        }

        // Stable: equal lengths keep registration order
        table.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        Ok(Self {
            categories,
            aliases: table,
        })
    }

    /// Per-category aliases in category order, then the `[aliases]` table
    pub fn from_config(config: &DispatchConfig) -> Result<Self, ConfigError> {
        let categories = config.category_set()?;

        let per_category = config.categories.iter().flat_map(|c| {
            c.aliases
                .iter()
                .map(move |alias| (alias.as_str(), c.name.as_str()))
        });
        let table = config
            .aliases
            .iter()
            .map(|(alias, target)| (alias.as_str(), target.as_str()));

        Self::new(categories, per_category.chain(table))
    }

    pub fn normalize(&self, raw_label: &str) -> Category {
        if let Some(category) = self.categories.get(raw_label) {
            return category.clone();
        }

        let label = raw_label.trim().to_lowercase();
        if let Some((alias, category)) = self
            .aliases
            .iter()
            .find(|(alias, _)| label.contains(alias.as_str()))
        {
            debug!(raw_label, alias = %alias, category = %category, "Label matched alias");
            return category.clone();
        }

        let fallback = self.categories.default_category();
        debug!(raw_label, category = %fallback, "Label unrecognized, using default");
        fallback.clone()
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }
}
