//! Selection controller: the universe of selectable entity names and the
//! user's chosen subset.

use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Distinct non-null entity names, sorted lexicographically.
pub fn entity_universe(df: &DataFrame, entity_column: &str) -> AppResult<Vec<String>> {
    let col = df.column(entity_column)?;
    let ca = col.str()?;
    let names: BTreeSet<&str> = ca.into_iter().flatten().collect();
    Ok(names.into_iter().map(str::to_string).collect())
}

/// The first `n` names of a sorted universe, or all of them when there are fewer.
pub fn default_selection(universe: &[String], n: usize) -> Selection {
    Selection::from_names(universe.iter().take(n).cloned())
}

/// A set of entity names. Iteration order is sorted, which keeps everything
/// derived from a selection deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(BTreeSet<String>);

impl Selection {
    pub fn empty() -> Self { Self::default() }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool { self.0.contains(name) }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

    /// Reject names that are not part of `universe`. Hosts call this before
    /// handing a user-supplied selection to the pipeline.
    pub fn validate_against(&self, universe: &[String]) -> AppResult<()> {
        let unknown: Vec<&str> = self.iter().filter(|n| universe.binary_search_by(|u| u.as_str().cmp(n)).is_err()).collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AppError::user("unknown_entity", format!("not in the table: {}", unknown.join(", "))))
        }
    }
}

impl<'a> FromIterator<&'a str> for Selection {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self::from_names(iter)
    }
}
