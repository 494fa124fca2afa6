//! Symptom taxonomy: the static mapping from symptom identifiers to symptom groups.
//!
//! A group carries a priority weight that feeds the triage score and an override flag for
//! red-flag groups whose detection alone forces the HIGH tier. A symptom may belong to several
//! groups. The taxonomy is immutable once loaded.
//!
//! The default taxonomy is embedded in the crate (`data/symptom_groups.yaml`); deployments may
//! supply their own YAML document with the same shape.

use crate::constants::DEFAULT_TAXONOMY_YAML;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::OnceLock;

/// A clinically related cluster of symptoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomGroup {
    pub id: String,
    pub priority: u32,
    /// Detection of this group forces the HIGH tier.
    #[serde(default, rename = "override")]
    pub is_override: bool,
    pub symptoms: BTreeSet<String>,
}

impl SymptomGroup {
    pub fn contains(&self, symptom: &str) -> bool {
        self.symptoms.contains(symptom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomTaxonomy {
    groups: Vec<SymptomGroup>,
}

impl SymptomTaxonomy {
    /// Builds a taxonomy from groups, validating it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Taxonomy` if a group id is blank or repeated, a group has no
    /// members, or a member identifier is blank.
    pub fn new(groups: Vec<SymptomGroup>) -> CoreResult<Self> {
        let mut seen = HashSet::new();
        for group in &groups {
            if group.id.trim().is_empty() {
                return Err(CoreError::Taxonomy("group id cannot be empty".into()));
            }
            if !seen.insert(group.id.as_str()) {
                return Err(CoreError::Taxonomy(format!(
                    "duplicate group id '{}'",
                    group.id
                )));
            }
            if group.symptoms.is_empty() {
                return Err(CoreError::Taxonomy(format!(
                    "group '{}' has no symptoms",
                    group.id
                )));
            }
            if group.symptoms.iter().any(|s| s.trim().is_empty()) {
                return Err(CoreError::Taxonomy(format!(
                    "group '{}' contains a blank symptom id",
                    group.id
                )));
            }
        }

        Ok(Self { groups })
    }

    /// Parses and validates a taxonomy YAML document.
    pub fn from_yaml(yaml: &str) -> CoreResult<Self> {
        let parsed: SymptomTaxonomy =
            serde_yaml::from_str(yaml).map_err(CoreError::TaxonomyParse)?;
        Self::new(parsed.groups)
    }

    /// Loads the taxonomy from `path`, or the embedded default when `path` is `None`.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(CoreError::TaxonomyRead)?;
                let taxonomy = Self::from_yaml(&yaml)?;
                tracing::info!(
                    path = %path.display(),
                    groups = taxonomy.groups.len(),
                    "loaded symptom taxonomy"
                );
                Ok(taxonomy)
            }
            None => Ok(Self::builtin().clone()),
        }
    }

    /// The embedded default taxonomy, parsed once per process.
    pub fn builtin() -> &'static SymptomTaxonomy {
        static BUILTIN: OnceLock<SymptomTaxonomy> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            Self::from_yaml(DEFAULT_TAXONOMY_YAML).expect("embedded symptom taxonomy is valid")
        })
    }

    pub fn groups(&self) -> &[SymptomGroup] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&SymptomGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// True if any group lists `symptom`.
    pub fn is_known(&self, symptom: &str) -> bool {
        self.groups.iter().any(|g| g.contains(symptom))
    }

    /// Groups whose member set intersects `symptoms`, in taxonomy order, each at most once.
    ///
    /// Unknown identifiers match nothing.
    pub fn detect<'a, I, S>(&'a self, symptoms: I) -> Vec<&'a SymptomGroup>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: Vec<S> = symptoms.into_iter().collect();
        self.groups
            .iter()
            .filter(|group| wanted.iter().any(|s| group.contains(s.as_ref())))
            .collect()
    }
}
