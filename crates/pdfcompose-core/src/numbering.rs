//! Page numbering
//!
//! Page numbers are ordinary text overlays, one per stamped page, rendered
//! from a template such as `"Page {n} of {total}"`.

use crate::error::{ComposeError, Result};
use crate::overlay::{parse_hex_color, Anchor, OverlayContent, OverlaySpec, TextStyle};
use crate::plan::{PagePlan, PageTargets};
use serde::{Deserialize, Serialize};

/// How excluded pages affect the numbers on the pages that are stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingPolicy {
    /// Excluded pages still count: the third page is numbered 3 even when
    /// the first page carries no number.
    #[default]
    Continue,
    /// Only stamped pages are counted, consecutively from `start_at`.
    Renumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageNumbering {
    /// Text with `{n}` and `{total}` placeholders.
    pub template: String,
    pub anchor: Anchor,
    pub font_size: f64,
    pub font_name: Option<String>,
    pub color: String,
    /// Distance in points from the page edge.
    pub margin: f64,
    /// Number given to the first counted page.
    pub start_at: usize,
    pub targets: PageTargets,
    pub policy: NumberingPolicy,
}

impl Default for PageNumbering {
    fn default() -> Self {
        Self {
            template: "{n}".to_string(),
            anchor: Anchor::BottomCenter,
            font_size: 10.0,
            font_name: None,
            color: "#000000".to_string(),
            margin: 24.0,
            start_at: 1,
            targets: PageTargets::All,
            policy: NumberingPolicy::Continue,
        }
    }
}

impl PageNumbering {
    fn validate(&self) -> Result<()> {
        if self.template.trim().is_empty() {
            return Err(ComposeError::InvalidOverlay("page number template is empty".into()));
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ComposeError::InvalidOverlay(format!(
                "font size must be positive, got {}",
                self.font_size
            )));
        }
        if parse_hex_color(&self.color).is_none() {
            return Err(ComposeError::InvalidOverlay(format!("invalid color {}", self.color)));
        }
        Ok(())
    }

    /// Text shown on each output position; `None` for unstamped positions.
    pub fn labels(&self, page_count: usize) -> Result<Vec<Option<String>>> {
        let stamped = (0..page_count)
            .filter(|&p| self.targets.includes(p, page_count))
            .count();
        let counted_total = match self.policy {
            NumberingPolicy::Continue => page_count,
            NumberingPolicy::Renumber => stamped,
        };
        let total = match counted_total.checked_sub(1) {
            Some(last) => self.start_at.checked_add(last).ok_or_else(|| {
                ComposeError::InvalidOverlay(format!(
                    "page numbers starting at {} overflow",
                    self.start_at
                ))
            })?,
            None => self.start_at.saturating_sub(1),
        };

        // Every counted value is below `counted_total`, so no number exceeds `total`
        let mut rank = 0;
        Ok((0..page_count)
            .map(|position| {
                if !self.targets.includes(position, page_count) {
                    return None;
                }
                let counted = match self.policy {
                    NumberingPolicy::Continue => position,
                    NumberingPolicy::Renumber => rank,
                };
                rank += 1;
                Some(self.render(self.start_at + counted, total))
            })
            .collect())
    }

    fn render(&self, n: usize, total: usize) -> String {
        self.template
            .replace("{n}", &n.to_string())
            .replace("{total}", &total.to_string())
    }

    fn overlay(&self, text: String) -> OverlaySpec {
        let style = TextStyle {
            font_size: self.font_size,
            color: self.color.clone(),
            font_name: self.font_name.clone(),
            is_bold: false,
            is_italic: false,
        };
        OverlaySpec::at_anchor(OverlayContent::Text { text, style }, self.anchor)
            .with_margin(self.margin)
    }

    /// Return `plan` with a page-number overlay on every targeted page.
    pub fn apply(&self, plan: PagePlan) -> Result<PagePlan> {
        self.validate()?;
        let labels = self.labels(plan.len())?;

        let overlays = labels
            .into_iter()
            .map(|label| label.map(|text| self.overlay(text).validate()).transpose())
            .collect::<Result<Vec<_>>>()?;

        let mut overlays = overlays.into_iter();
        Ok(plan.stamp_each(|_, _| overlays.next().flatten()))
    }
}
