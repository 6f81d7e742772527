//! Page plans
//!
//! A [`PagePlan`] is the single description of an output document: which
//! source page lands at each position, how far to turn it, and what to stamp
//! on it. Plans are built from a snapshot of the UI's page list and never
//! shared with it afterwards.

use crate::error::{ComposeError, Result};
use crate::overlay::OverlaySpec;
use crate::rotation::accumulate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identifies a source document within one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "document {}", self.0)
    }
}

/// A page of a source document (0-based index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRef {
    pub document: DocumentId,
    pub index: usize,
}

impl PageRef {
    pub fn new(document: DocumentId, index: usize) -> Self {
        Self { document, index }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub source: PageRef,
    /// Degrees added to the page's own rotation. Always a multiple of 90.
    pub rotation_delta: i64,
    pub overlays: Vec<OverlaySpec>,
}

impl PlanEntry {
    pub fn copy_of(source: PageRef) -> Self {
        Self {
            source,
            rotation_delta: 0,
            overlays: Vec::new(),
        }
    }
}

/// Which output positions an overlay or rotation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageTargets {
    #[default]
    All,
    /// Explicit 0-based output positions.
    Only(Vec<usize>),
    ExcludeFirst,
    ExcludeLast,
    ExcludeFirstAndLast,
}

impl PageTargets {
    /// Build from "skip first/last page" checkboxes.
    pub fn excluding(first: bool, last: bool) -> Self {
        match (first, last) {
            (false, false) => PageTargets::All,
            (true, false) => PageTargets::ExcludeFirst,
            (false, true) => PageTargets::ExcludeLast,
            (true, true) => PageTargets::ExcludeFirstAndLast,
        }
    }

    pub fn includes(&self, position: usize, len: usize) -> bool {
        let is_first = position == 0;
        let is_last = position + 1 == len;
        match self {
            PageTargets::All => true,
            PageTargets::Only(positions) => positions.contains(&position),
            PageTargets::ExcludeFirst => !is_first,
            PageTargets::ExcludeLast => !is_last,
            PageTargets::ExcludeFirstAndLast => !is_first && !is_last,
        }
    }
}

/// Ordered per-page instructions for one output document.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PagePlan {
    entries: Vec<PlanEntry>,
}

impl PagePlan {
    pub fn new(entries: Vec<PlanEntry>) -> Self {
        Self { entries }
    }

    /// Every page of a document in its original order.
    pub fn identity(document: DocumentId, page_count: usize) -> Self {
        Self::select(document, &(0..page_count).collect::<Vec<_>>())
    }

    /// The listed pages, in the listed order.
    pub fn select(document: DocumentId, indices: &[usize]) -> Self {
        Self::new(
            indices
                .iter()
                .map(|&index| PlanEntry::copy_of(PageRef::new(document, index)))
                .collect(),
        )
    }

    /// A new page order for one document. Pages left out are dropped.
    pub fn reorder(document: DocumentId, page_count: usize, order: &[usize]) -> Result<Self> {
        if order.is_empty() {
            return Err(ComposeError::EmptySelection);
        }

        let mut seen = HashSet::with_capacity(order.len());
        for &index in order {
            if index >= page_count {
                return Err(ComposeError::PageIndex {
                    document,
                    index,
                    page_count,
                });
            }
            if !seen.insert(index) {
                return Err(ComposeError::DuplicatePage { page: index + 1 });
            }
        }

        Ok(Self::select(document, order))
    }

    /// All pages of each document, documents in the given order.
    pub fn merge(documents: &[(DocumentId, usize)]) -> Self {
        Self::new(
            documents
                .iter()
                .flat_map(|&(document, page_count)| {
                    (0..page_count).map(move |index| PlanEntry::copy_of(PageRef::new(document, index)))
                })
                .collect(),
        )
    }

    /// Every page except the deleted ones.
    pub fn without(document: DocumentId, page_count: usize, deleted: &[usize]) -> Result<Self> {
        if let Some(&index) = deleted.iter().find(|&&i| i >= page_count) {
            return Err(ComposeError::PageIndex {
                document,
                index,
                page_count,
            });
        }

        let deleted: HashSet<usize> = deleted.iter().copied().collect();
        let kept: Vec<usize> = (0..page_count).filter(|i| !deleted.contains(i)).collect();
        if kept.is_empty() {
            return Err(ComposeError::EmptySelection);
        }
        Ok(Self::select(document, &kept))
    }

    /// Add `delta` degrees to the entries at the given output positions.
    pub fn rotate_pages(mut self, positions: &[usize], delta: i64) -> Result<Self> {
        let len = self.entries.len();
        for &position in positions {
            let entry = self
                .entries
                .get_mut(position)
                .ok_or_else(|| ComposeError::OutOfBounds {
                    clause: "rotate".into(),
                    page: position as u64 + 1,
                    total: len,
                })?;
            entry.rotation_delta = accumulate(entry.rotation_delta, delta)?.degrees();
        }
        Ok(self)
    }

    pub fn rotate_all(self, delta: i64) -> Result<Self> {
        let positions: Vec<usize> = (0..self.entries.len()).collect();
        self.rotate_pages(&positions, delta)
    }

    /// Attach one overlay to every targeted output position.
    pub fn stamp(self, overlay: OverlaySpec, targets: &PageTargets) -> Result<Self> {
        let overlay = overlay.validate()?;
        Ok(self.stamp_each(|position, len| {
            targets.includes(position, len).then(|| overlay.clone())
        }))
    }

    /// Attach a per-position overlay; `None` leaves the page untouched.
    pub fn stamp_each<F>(mut self, mut overlay_for: F) -> Self
    where
        F: FnMut(usize, usize) -> Option<OverlaySpec>,
    {
        let len = self.entries.len();
        for (position, entry) in self.entries.iter_mut().enumerate() {
            if let Some(overlay) = overlay_for(position, len) {
                entry.overlays.push(overlay);
            }
        }
        self
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Documents the plan reads from, in first-use order.
    pub fn documents(&self) -> Vec<DocumentId> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.source.document)
            .filter(|d| seen.insert(*d))
            .collect()
    }
}
