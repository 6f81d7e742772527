//! Split planning
//!
//! Decides whether a selection produces one output or one output per group,
//! and gives every output a stable file name.

use crate::error::{ComposeError, Result};
use crate::plan::{DocumentId, PagePlan};
use crate::range::RangeGroup;
use serde::Serialize;
use std::collections::HashMap;

/// One planned output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPlan {
    /// 0-based source pages, in output order.
    pub pages: Vec<usize>,
    pub suggested_file_name: String,
}

impl OutputPlan {
    pub fn to_page_plan(&self, document: DocumentId) -> PagePlan {
        PagePlan::select(document, &self.pages)
    }
}

/// Plan outputs for parsed range groups.
///
/// `base_name` is the source file name; a trailing `.pdf` is dropped.
pub fn plan_split(groups: &[RangeGroup], base_name: &str) -> Result<Vec<OutputPlan>> {
    if groups.is_empty() || groups.iter().any(RangeGroup::is_empty) {
        return Err(ComposeError::EmptySelection);
    }

    let base = file_stem(base_name);

    if let [group] = groups {
        return Ok(vec![OutputPlan {
            pages: group.pages().to_vec(),
            suggested_file_name: format!("{}-extracted.pdf", base),
        }]);
    }

    let mut used: HashMap<String, usize> = HashMap::new();
    Ok(groups
        .iter()
        .map(|group| {
            let stem = group_stem(base, group);
            let seen = used.entry(stem.clone()).or_insert(0);
            *seen += 1;
            let suggested_file_name = if *seen == 1 {
                format!("{}.pdf", stem)
            } else {
                format!("{}-{}.pdf", stem, seen)
            };
            OutputPlan {
                pages: group.pages().to_vec(),
                suggested_file_name,
            }
        })
        .collect())
}

fn group_stem(base: &str, group: &RangeGroup) -> String {
    // Groups are non-empty here
    let first = group.first().unwrap_or_default() + 1;
    let last = group.last().unwrap_or_default() + 1;
    if first == last {
        format!("{}-page-{}", base, first)
    } else {
        format!("{}-pages-{}-{}", base, first, last)
    }
}

pub(crate) fn file_stem(name: &str) -> &str {
    let name = name.trim();
    let stem = name
        .len()
        .checked_sub(4)
        .filter(|&i| name.is_char_boundary(i) && name[i..].eq_ignore_ascii_case(".pdf"))
        .map_or(name, |i| &name[..i]);
    if stem.is_empty() {
        "document"
    } else {
        stem
    }
}
