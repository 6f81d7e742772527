//! WASM bindings for PDF page composition
//!
//! This module provides a stateful, session-based API for the merge, split,
//! organize, rotate, delete, watermark, signature and page-number tools.
//! All state is held in Rust, minimizing JavaScript complexity.
//!
//! ## Architecture
//!
//! - Documents live in a `ComposeSession` and are referred to by id
//! - Each tool sends one JSON command (see `pdfcompose_core::ComposeCommand`)
//! - Errors reach JavaScript as `{ kind, message, recoverable }` objects
//! - JavaScript only handles DOM events and file I/O
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { ComposeSession, parseRange } from './pkg/pdfcompose_wasm.js';
//!
//! await init();
//!
//! const session = new ComposeSession();
//! const cancel = session.cancelHandle();
//! session.setProgressCallback((current, total, msg) => updateUI(current, total, msg));
//! const a = session.addDocument("a.pdf", bytesA);
//! const b = session.addDocument("b.pdf", bytesB);
//!
//! const [merged] = session.execute(JSON.stringify({ type: "Merge", documents: [b.id, a.id] }));
//! downloadBlob(merged.bytes, merged.name);
//! ```

pub mod logging;
pub mod session;
pub mod validation;

#[cfg(test)]
mod testing;

use pdfcompose_core::{ComposeError, OverlaySpec, RangeGroup};
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Re-export main types for JavaScript
pub use session::{CancelHandle, ComposeSession, DocumentInfo};
pub use validation::PdfInfo;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logging::init_logging(tracing::Level::INFO);
}

/// Convert an engine error into a `{ kind, message, recoverable }` object
pub(crate) fn js_error(err: ComposeError) -> JsValue {
    serde_wasm_bindgen::to_value(&err.report()).unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
}

pub(crate) fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| js_error(ComposeError::Serialization(e.to_string())))
}

/// Get the library version
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Quick validation check for a PDF file
#[wasm_bindgen(js_name = quickValidate)]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    validation::quick_validate(bytes).map_err(js_error)
}

/// Get detailed PDF info without creating a session
/// Useful for showing file info before user commits to an operation
#[wasm_bindgen(js_name = getPdfInfo)]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = validation::validate_pdf(bytes).map_err(js_error)?;
    to_js(&info)
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen(js_name = getPageCount)]
pub fn get_page_count(bytes: &[u8]) -> Result<usize, JsValue> {
    pdfcompose_core::get_page_count(bytes).map_err(js_error)
}

/// Parse "1-3, 5, 8-10" into groups of 1-based page numbers
#[wasm_bindgen(js_name = parseRange)]
pub fn parse_range(expression: &str, total_pages: usize) -> Result<JsValue, JsValue> {
    let groups = parse_range_internal(expression, total_pages).map_err(js_error)?;
    to_js(&groups)
}

fn parse_range_internal(expression: &str, total_pages: usize) -> Result<Vec<Vec<usize>>, ComposeError> {
    Ok(pdfcompose_core::parse_range(expression, total_pages)?
        .iter()
        .map(|group| group.pages().iter().map(|&i| i + 1).collect())
        .collect())
}

/// Plan split outputs for groups of 1-based page numbers
/// Returns `[{ pages, suggested_file_name }]` with 1-based pages
#[wasm_bindgen(js_name = planSplit)]
pub fn plan_split(groups: JsValue, base_name: &str) -> Result<JsValue, JsValue> {
    let groups: Vec<Vec<usize>> = serde_wasm_bindgen::from_value(groups)
        .map_err(|e| js_error(ComposeError::Serialization(e.to_string())))?;
    let plans = plan_split_internal(&groups, base_name).map_err(js_error)?;
    to_js(&plans)
}

#[derive(Debug, Serialize, PartialEq)]
struct SplitPlanJs {
    pages: Vec<usize>,
    suggested_file_name: String,
}

fn plan_split_internal(groups: &[Vec<usize>], base_name: &str) -> Result<Vec<SplitPlanJs>, ComposeError> {
    let groups = groups
        .iter()
        .map(|pages| {
            let indices = pages
                .iter()
                .map(|&page| {
                    page.checked_sub(1).ok_or_else(|| ComposeError::InvalidRangeSyntax {
                        clause: page.to_string(),
                        reason: "pages are numbered from 1".to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RangeGroup::from_indices(indices))
        })
        .collect::<Result<Vec<_>, ComposeError>>()?;

    Ok(pdfcompose_core::plan_split(&groups, base_name)?
        .into_iter()
        .map(|plan| SplitPlanJs {
            pages: plan.pages.iter().map(|&i| i + 1).collect(),
            suggested_file_name: plan.suggested_file_name,
        })
        .collect())
}

/// Place an overlay on a page; returns `{ x, y, rotation, width, height }` in points
#[wasm_bindgen(js_name = placeOverlay)]
pub fn place_overlay(spec: JsValue, page_width: f64, page_height: f64) -> Result<JsValue, JsValue> {
    let spec: OverlaySpec = serde_wasm_bindgen::from_value(spec)
        .map_err(|e| js_error(ComposeError::Serialization(e.to_string())))?;
    let position = pdfcompose_core::place_overlay(&spec, page_width, page_height).map_err(js_error)?;
    to_js(&position)
}

/// Format bytes as human-readable string
#[wasm_bindgen(js_name = formatBytes)]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
