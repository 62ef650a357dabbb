//! Category → pipeline table
//!
//! Built once from validated configuration and shared read-only afterwards.
//! Construction fails unless every category in the closed set owns a
//! non-empty pipeline, so lookups for a valid `Category` cannot miss.

use crate::category::{Category, CategorySet};
use crate::config::{ConfigError, DispatchConfig};
use crate::dispatch::step::PipelineStep;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DispatchTable {
    categories: CategorySet,
    pipelines: HashMap<Category, Vec<PipelineStep>>,
}

impl DispatchTable {
    pub fn new<I, S>(categories: CategorySet, pipelines: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, Vec<PipelineStep>)>,
        S: AsRef<str>,
    {
        let mut table = HashMap::new();
        for (name, steps) in pipelines {
            let name = name.as_ref();
            let category = categories.get(name).ok_or_else(|| {
                ConfigError::InvalidConfig(format!("pipeline for unknown category '{name}'"))
            })?;
            if table.insert(category.clone(), steps).is_some() {
                return Err(ConfigError::InvalidConfig(format!(
                    "category '{name}' has more than one pipeline"
                )));
            }
        }

        for category in categories.iter() {
            match table.get(category) {
                Some(steps) if !steps.is_empty() => {}
                Some(_) => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "category '{category}' has no pipeline steps"
                    )))
                }
                None => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "category '{category}' has no dispatch entry"
                    )))
                }
            }
        }

        Ok(Self {
            categories,
            pipelines: table,
        })
    }

    pub fn from_config(config: &DispatchConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.category_set()?,
            config
                .categories
                .iter()
                .map(|c| (c.name.as_str(), c.pipeline.clone())),
        )
    }

    /// Ordered steps for `category`
    pub fn steps(&self, category: &Category) -> Option<&[PipelineStep]> {
        self.pipelines.get(category).map(Vec::as_slice)
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }
}
