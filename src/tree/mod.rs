//! Read-only index of the organizational hierarchy.
//!
//! Units are stored in an arena and addressed by index. Parent links are
//! supplied by an external editor, so every walk carries a seen-set and
//! reports a revisit as a data-integrity error instead of looping.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};
use crate::model::OrganizationalUnit;

/// Arena-backed unit tree.
#[derive(Debug, Clone, Default)]
pub struct UnitTree {
    units: Vec<OrganizationalUnit>,
    index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
}

impl UnitTree {
    /// Build the tree and check its structural invariants.
    ///
    /// Fails when ids collide, a parent reference dangles, an ancestor chain
    /// does not terminate, or a stored depth or path disagrees with the
    /// ancestors.
    pub fn new(units: Vec<OrganizationalUnit>) -> AnalysisResult<Self> {
        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.id.clone(), i).is_some() {
                return Err(AnalysisError::integrity(format!(
                    "duplicate unit id '{}'",
                    unit.id
                )));
            }
        }

        let mut children = vec![Vec::new(); units.len()];
        for (i, unit) in units.iter().enumerate() {
            if let Some(parent_id) = &unit.parent_id {
                let parent = index.get(parent_id).copied().ok_or_else(|| {
                    AnalysisError::integrity(format!(
                        "unit '{}' references unknown parent '{}'",
                        unit.id, parent_id
                    ))
                })?;
                children[parent].push(i);
            }
        }

        let tree = Self {
            units,
            index,
            children,
        };
        tree.check_ancestry()?;
        tree.check_paths()?;
        Ok(tree)
    }

    fn check_ancestry(&self) -> AnalysisResult<()> {
        for unit in &self.units {
            let mut seen = HashSet::new();
            let mut ancestors = 0u32;
            let mut cursor = unit.parent_id.as_deref();
            while let Some(parent_id) = cursor {
                if !seen.insert(parent_id) || parent_id == unit.id {
                    return Err(AnalysisError::integrity(format!(
                        "cycle in ancestor chain of unit '{}' at '{}'",
                        unit.id, parent_id
                    )));
                }
                ancestors += 1;
                cursor = self.units[self.index[parent_id]].parent_id.as_deref();
            }
            if ancestors != unit.depth {
                return Err(AnalysisError::integrity(format!(
                    "unit '{}' has depth {} but {} ancestors",
                    unit.id, unit.depth, ancestors
                )));
            }
        }
        Ok(())
    }

    /// Root path is the name; a child's path is `<parent path>/<name>`.
    fn check_paths(&self) -> AnalysisResult<()> {
        for unit in &self.units {
            let expected = match unit.parent_id.as_deref() {
                Some(parent_id) => {
                    format!("{}/{}", self.units[self.index[parent_id]].path, unit.name)
                }
                None => unit.name.clone(),
            };
            if unit.path != expected {
                return Err(AnalysisError::integrity(format!(
                    "unit '{}' has path '{}', expected '{}'",
                    unit.id, unit.path, expected
                )));
            }
        }
        Ok(())
    }

    /// Look up a unit by id
    pub fn get(&self, id: &str) -> Option<&OrganizationalUnit> {
        self.index.get(id).map(|&i| &self.units[i])
    }

    /// Whether the unit exists and has no children
    pub fn is_leaf(&self, id: &str) -> bool {
        self.index
            .get(id)
            .map(|&i| self.children[i].is_empty())
            .unwrap_or(false)
    }

    /// Number of units in the tree
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the tree has no units
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Leaf descendants of `unit_id` (the unit itself when it is a leaf),
    /// ordered by path, then creation time, then insertion order.
    pub fn leaf_units(&self, unit_id: &str) -> AnalysisResult<Vec<&OrganizationalUnit>> {
        let start = self
            .index
            .get(unit_id)
            .copied()
            .ok_or_else(|| AnalysisError::UnknownUnit {
                unit_id: unit_id.to_string(),
            })?;

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        let mut leaves = Vec::new();

        while let Some(i) = stack.pop() {
            if !visited.insert(i) {
                return Err(AnalysisError::integrity(format!(
                    "unit '{}' revisited while collecting leaves of '{}'",
                    self.units[i].id, unit_id
                )));
            }
            if self.children[i].is_empty() {
                leaves.push(i);
            } else {
                stack.extend(self.children[i].iter().copied());
            }
        }

        leaves.sort_by(|&a, &b| {
            let (ua, ub) = (&self.units[a], &self.units[b]);
            ua.path
                .cmp(&ub.path)
                .then(ua.created_at.cmp(&ub.created_at))
                .then(a.cmp(&b))
        });

        debug!(
            unit_id = %unit_id,
            leaf_count = leaves.len(),
            visited = visited.len(),
            "Resolved leaf units"
        );

        Ok(leaves.into_iter().map(|i| &self.units[i]).collect())
    }

    /// Ids of the leaf descendants, in [`leaf_units`](Self::leaf_units) order.
    pub fn leaf_ids(&self, unit_id: &str) -> AnalysisResult<Vec<String>> {
        Ok(self
            .leaf_units(unit_id)?
            .into_iter()
            .map(|u| u.id.clone())
            .collect())
    }
}
