//! Three-level category taxonomy (main → sub → leaf).

use super::language::Language;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{collections::BTreeMap, fmt};

/// The category a group is filed under.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct CategoryPath {
    pub main_category: String,
    pub sub_category: String,
    pub leaf_category: String,
}

impl CategoryPath {
    pub fn new(
        main: impl Into<String>,
        sub: impl Into<String>,
        leaf: impl Into<String>,
    ) -> Self {
        Self {
            main_category: main.into(),
            sub_category: sub.into(),
            leaf_category: leaf.into(),
        }
    }

    /// Case-insensitive substring match against any of the three levels.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.main_category, &self.sub_category, &self.leaf_category]
            .into_iter()
            .any(|name| name.to_lowercase().contains(&needle))
    }
}

/// Category names per language. Korean names live on the group itself.
pub type CategoryTranslations = BTreeMap<Language, CategoryPath>;

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} > {} > {}",
            self.main_category, self.sub_category, self.leaf_category
        )
    }
}

/// Immutable category tree, loaded once per request.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryTaxonomy {
    pub mains: Vec<MainCategory>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MainCategory {
    pub name: String,
    pub subs: Vec<SubCategory>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SubCategory {
    pub name: String,
    pub leaves: Vec<String>,
}

impl CategoryTaxonomy {
    /// Build the tree from flat rows, keeping first-seen order at every level.
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = CategoryPath>,
    {
        let mut mains: Vec<MainCategory> = Vec::new();
        for path in paths {
            let main_idx = match mains.iter().position(|m| m.name == path.main_category) {
                Some(idx) => idx,
                None => {
                    mains.push(MainCategory {
                        name: path.main_category,
                        subs: Vec::new(),
                    });
                    mains.len() - 1
                }
            };
            let subs = &mut mains[main_idx].subs;
            let sub_idx = match subs.iter().position(|s| s.name == path.sub_category) {
                Some(idx) => idx,
                None => {
                    subs.push(SubCategory {
                        name: path.sub_category,
                        leaves: Vec::new(),
                    });
                    subs.len() - 1
                }
            };
            let leaves = &mut subs[sub_idx].leaves;
            if !leaves.contains(&path.leaf_category) {
                leaves.push(path.leaf_category);
            }
        }
        Self { mains }
    }

    pub fn is_empty(&self) -> bool {
        self.mains.is_empty()
    }
}
