//! Page range parsing
//!
//! Turns a selection like `"1-3, 5, 8-10"` into zero-based page groups,
//! one group per comma-separated clause.

use crate::error::{ComposeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Zero-based page indices produced from one clause.
///
/// Indices are strictly increasing and unique; deserialised groups are
/// normalised through [`RangeGroup::from_indices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct RangeGroup(Vec<usize>);

impl From<Vec<usize>> for RangeGroup {
    fn from(indices: Vec<usize>) -> Self {
        Self::from_indices(indices)
    }
}

impl From<RangeGroup> for Vec<usize> {
    fn from(group: RangeGroup) -> Self {
        group.0
    }
}

impl RangeGroup {
    /// Build a group from arbitrary indices, sorting and collapsing duplicates.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let set: BTreeSet<usize> = indices.into_iter().collect();
        Self(set.into_iter().collect())
    }

    pub fn pages(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<usize> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Render the group back as a 1-based clause, e.g. `"8-10"` or `"1,3,4"`.
    pub fn describe(&self) -> String {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) if first == last => (first + 1).to_string(),
            (Some(first), Some(last)) if last - first + 1 == self.len() => {
                format!("{}-{}", first + 1, last + 1)
            }
            _ => self
                .0
                .iter()
                .map(|p| (p + 1).to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }
}

/// How a multi-clause selection turns into outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// One output per clause.
    #[default]
    SplitEach,
    /// All clauses flattened into a single output.
    ExtractAll,
}

/// Parse a page range expression against a document of `total_pages` pages.
///
/// Fails on the first bad clause; no partial result is returned.
pub fn parse_range(expression: &str, total_pages: usize) -> Result<Vec<RangeGroup>> {
    if expression.trim().is_empty() {
        return Err(ComposeError::EmptySelection);
    }

    expression
        .split(',')
        .map(|clause| parse_clause(clause, total_pages))
        .collect()
}

fn parse_clause(raw: &str, total_pages: usize) -> Result<RangeGroup> {
    let clause = raw.trim();
    if clause.is_empty() {
        return Err(syntax(clause, "empty clause"));
    }

    if let Some((start, end)) = clause.split_once('-') {
        let start = parse_number(clause, start, "start")?;
        let end = parse_number(clause, end, "end")?;

        if start > end {
            return Err(syntax(
                clause,
                &format!("descending range {} > {}", start, end),
            ));
        }

        check_bounds(clause, start, total_pages)?;
        check_bounds(clause, end, total_pages)?;

        // Both ends fit in usize once bounds-checked
        Ok(RangeGroup::from_indices(
            (start as usize - 1)..=(end as usize - 1),
        ))
    } else {
        let page = parse_number(clause, clause, "page")?;
        check_bounds(clause, page, total_pages)?;
        Ok(RangeGroup(vec![page as usize - 1]))
    }
}

fn parse_number(clause: &str, token: &str, what: &str) -> Result<u64> {
    let token = token.trim();
    if token.is_empty() {
        return Err(syntax(clause, &format!("missing {}", what)));
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(syntax(clause, &format!("invalid {}: {}", what, token)));
    }
    // All digits, so the only parse failure left is overflow
    Ok(token.parse::<u64>().unwrap_or(u64::MAX))
}

fn check_bounds(clause: &str, page: u64, total_pages: usize) -> Result<()> {
    if page == 0 || page > total_pages as u64 {
        return Err(ComposeError::OutOfBounds {
            clause: clause.to_string(),
            page,
            total: total_pages,
        });
    }
    Ok(())
}

fn syntax(clause: &str, reason: &str) -> ComposeError {
    ComposeError::InvalidRangeSyntax {
        clause: clause.to_string(),
        reason: reason.to_string(),
    }
}

/// Merge every group into one sorted, deduplicated group.
pub fn flatten(groups: &[RangeGroup]) -> RangeGroup {
    RangeGroup::from_indices(groups.iter().flat_map(|g| g.pages().iter().copied()))
}

/// Apply a selection mode to parsed groups.
pub fn select(groups: Vec<RangeGroup>, mode: SelectionMode) -> Vec<RangeGroup> {
    match mode {
        SelectionMode::SplitEach => groups,
        SelectionMode::ExtractAll => vec![flatten(&groups)],
    }
}

/// Fixed-size groups of `every` pages covering the whole document.
pub fn chunk_groups(total_pages: usize, every: usize) -> Result<Vec<RangeGroup>> {
    if every == 0 {
        return Err(syntax("0", "chunk size must be at least 1"));
    }
    if total_pages == 0 {
        return Err(ComposeError::EmptySelection);
    }

    Ok((0..total_pages)
        .step_by(every)
        .map(|start| RangeGroup((start..(start + every).min(total_pages)).collect()))
        .collect())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn clause_strategy(total: usize) -> impl Strategy<Value = (usize, usize)> {
        (1..=total).prop_flat_map(move |start| (Just(start), start..=total))
    }

    proptest! {
        /// Property: a canonical expression parses back to the indices it encodes
        #[test]
        fn canonical_expression_round_trips(
            (total, clauses) in (1usize..60).prop_flat_map(|total| {
                (Just(total), prop::collection::vec(clause_strategy(total), 1..8))
            })
        ) {
            let expr = clauses
                .iter()
                .map(|&(s, e)| if s == e { s.to_string() } else { format!("{}-{}", s, e) })
                .collect::<Vec<_>>()
                .join(",");

            let groups = parse_range(&expr, total).unwrap();
            prop_assert_eq!(groups.len(), clauses.len());
            for (group, &(s, e)) in groups.iter().zip(&clauses) {
                let expected: Vec<usize> = (s - 1..e).collect();
                prop_assert_eq!(group.pages(), expected.as_slice());
            }
        }

        /// Property: every group is strictly increasing
        #[test]
        fn groups_are_strictly_increasing(s in 1usize..50, len in 0usize..50) {
            let total = s + len;
            let groups = parse_range(&format!("{}-{}", s, s + len), total).unwrap();
            prop_assert!(groups[0].pages().windows(2).all(|w| w[0] < w[1]));
        }

        /// Property: pages past the end are always rejected
        #[test]
        fn pages_past_end_rejected(total in 1usize..100, extra in 1usize..100) {
            let page = total + extra;
            let result = parse_range(&page.to_string(), total);
            let is_out_of_bounds = matches!(result, Err(ComposeError::OutOfBounds { .. }));
            prop_assert!(is_out_of_bounds);
        }
    }
}
