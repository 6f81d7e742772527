//! PDF page composition
//!
//! This crate builds new PDF documents out of pages of existing ones using
//! lopdf: merge, split, reorder, rotate, delete, and stamping text or image
//! overlays (watermarks, signatures, page numbers).
//!
//! Every tool follows the same path:
//! - a request is parsed into a [`PagePlan`] (or several, for split)
//! - the [`Assembler`] validates the whole plan, then copies pages into a
//!   fresh document and serialises it
//!
//! Sources are never modified and all work happens on in-memory buffers.

pub mod assemble;
pub mod command;
pub mod error;
pub mod image;
pub mod metrics;
pub mod numbering;
pub mod overlay;
pub mod plan;
pub mod range;
pub mod rotation;
pub mod source;
pub mod split;
pub mod stamp;

#[cfg(test)]
mod test_support;

pub use assemble::{assemble, Assembler, CancelToken};
pub use command::{ComposeCommand, OutputSpec, PageItem, ProcessMetrics, ProcessResult};
pub use error::{ComposeError, ErrorKind, ErrorReport, Result};
pub use numbering::{NumberingPolicy, PageNumbering};
pub use overlay::{AbsolutePosition, Align, Alignment, Anchor, OverlayContent, OverlaySpec, TextStyle};
pub use plan::{DocumentId, PagePlan, PageRef, PageTargets, PlanEntry};
pub use range::{parse_range, RangeGroup, SelectionMode};
pub use rotation::{accumulate, Rotation};
pub use source::{get_page_count, PageInfo, PageOrientation, SourceDocument, SourceSet};
pub use split::{plan_split, OutputPlan};

/// Validate `spec` and place it on a `page_width` x `page_height` page.
pub fn place_overlay(spec: &OverlaySpec, page_width: f64, page_height: f64) -> Result<AbsolutePosition> {
    if !(page_width.is_finite() && page_width > 0.0 && page_height.is_finite() && page_height > 0.0) {
        return Err(ComposeError::InvalidOverlay(format!(
            "page size must be positive, got {}x{}",
            page_width, page_height
        )));
    }
    let spec = spec.clone().validate()?;
    Ok(overlay::place(&spec, page_width, page_height))
}
