//! Stateful composition session
//!
//! Holds the loaded documents in Rust memory. JavaScript refers to them by
//! the numeric id returned from `addDocument` and sends tool requests as
//! JSON commands.

use crate::{js_error, to_js};
use crate::validation::PdfInfo;
use pdfcompose_core::{
    Assembler, CancelToken, ComposeCommand, ComposeError, DocumentId, OutputSpec, PageInfo,
    SourceDocument, SourceSet,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Document entry with metadata
struct DocumentEntry {
    id: DocumentId,
    name: String,
    info: PdfInfo,
}

/// Document info for JS serialization
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentInfo {
    pub id: u32,
    pub name: String,
    #[serde(flatten)]
    pub info: PdfInfo,
}

/// Cancels a running `execute` from inside the progress callback.
#[wasm_bindgen]
pub struct CancelHandle {
    token: CancelToken,
}

#[wasm_bindgen]
impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Stateful session that holds documents in Rust memory
#[wasm_bindgen]
pub struct ComposeSession {
    documents: Vec<DocumentEntry>,
    sources: SourceSet,
    next_id: u32,
    cancel: CancelToken,
    progress_callback: Option<js_sys::Function>,
}

impl Default for ComposeSession {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl ComposeSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            sources: SourceSet::new(),
            next_id: 0,
            cancel: CancelToken::new(),
            progress_callback: None,
        }
    }

    /// Set a progress callback function
    /// Callback signature: (current: number, total: number, message: string) => void
    #[wasm_bindgen(js_name = setProgressCallback)]
    pub fn set_progress_callback(&mut self, callback: js_sys::Function) {
        self.progress_callback = Some(callback);
    }

    /// Handle that stays usable while `execute` holds the session.
    #[wasm_bindgen(js_name = cancelHandle)]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
        }
    }

    /// Request cancellation of the current (or next) `execute`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Add a document to the session
    /// Returns `{ id, name, page_count, ... }` on success
    #[wasm_bindgen(js_name = addDocument)]
    pub fn add_document(&mut self, name: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let info = self.add_document_internal(name, bytes).map_err(js_error)?;
        to_js(&info)
    }

    #[wasm_bindgen(js_name = removeDocument)]
    pub fn remove_document(&mut self, id: u32) -> Result<(), JsValue> {
        self.remove_document_internal(DocumentId(id)).map_err(js_error)
    }

    /// Get info for a page (1-based page number)
    #[wasm_bindgen(js_name = getPageInfo)]
    pub fn get_page_info(&self, id: u32, page_num: usize) -> Result<JsValue, JsValue> {
        let info = self
            .page_info_internal(DocumentId(id), page_num)
            .map_err(js_error)?;
        to_js(&info)
    }

    /// Get all document infos, in the order they were added
    #[wasm_bindgen(js_name = getDocumentInfos)]
    pub fn get_document_infos(&self) -> Result<JsValue, JsValue> {
        to_js(&self.document_infos())
    }

    #[wasm_bindgen(js_name = documentCount)]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Get total page count across all documents
    #[wasm_bindgen(js_name = totalPageCount)]
    pub fn total_page_count(&self) -> usize {
        self.documents.iter().map(|d| d.info.page_count).sum()
    }

    /// Run a JSON command and return `[{ name, bytes }]`, one per output file
    pub fn execute(&self, command_json: &str) -> Result<js_sys::Array, JsValue> {
        let outputs = self.execute_internal(command_json).map_err(js_error)?;

        let result = js_sys::Array::new();
        for output in outputs {
            let bytes = js_sys::Uint8Array::new_with_length(output.bytes.len() as u32);
            bytes.copy_from(&output.bytes);

            let entry = js_sys::Object::new();
            js_sys::Reflect::set(&entry, &"name".into(), &output.suggested_file_name.into())?;
            js_sys::Reflect::set(&entry, &"bytes".into(), &bytes)?;
            result.push(&entry);
        }
        Ok(result)
    }
}

impl ComposeSession {
    fn add_document_internal(&mut self, name: &str, bytes: &[u8]) -> Result<DocumentInfo, ComposeError> {
        let id = DocumentId(self.next_id);
        let source = SourceDocument::load(id, bytes)?;
        let info = PdfInfo::from_source(&source, bytes);

        self.sources.insert(source);
        self.next_id += 1;
        self.documents.push(DocumentEntry {
            id,
            name: name.to_string(),
            info,
        });

        tracing::info!(document = id.0, name, pages = self.sources.get(id)?.page_count(), "added document");
        self.entry_info(id)
    }

    fn remove_document_internal(&mut self, id: DocumentId) -> Result<(), ComposeError> {
        self.sources.remove(id).ok_or(ComposeError::SourceLoad {
            document: id,
            reason: "document is not loaded".to_string(),
        })?;
        self.documents.retain(|d| d.id != id);
        Ok(())
    }

    fn page_info_internal(&self, id: DocumentId, page_num: usize) -> Result<PageInfo, ComposeError> {
        let source = self.sources.get(id)?;
        let index = page_num.checked_sub(1).ok_or(ComposeError::PageIndex {
            document: id,
            index: 0,
            page_count: source.page_count(),
        })?;
        source.page_info(index)
    }

    fn entry_info(&self, id: DocumentId) -> Result<DocumentInfo, ComposeError> {
        self.documents
            .iter()
            .find(|d| d.id == id)
            .map(|d| DocumentInfo {
                id: d.id.0,
                name: d.name.clone(),
                info: d.info.clone(),
            })
            .ok_or(ComposeError::SourceLoad {
                document: id,
                reason: "document is not loaded".to_string(),
            })
    }

    fn document_infos(&self) -> Vec<DocumentInfo> {
        self.documents
            .iter()
            .filter_map(|d| self.entry_info(d.id).ok())
            .collect()
    }

    /// Output names follow the file the command works on.
    fn base_name(&self, command: &ComposeCommand) -> String {
        command
            .primary_document()
            .and_then(|id| self.documents.iter().find(|d| d.id == id))
            .map_or_else(|| "document.pdf".to_string(), |d| d.name.clone())
    }

    fn execute_internal(&self, command_json: &str) -> Result<Vec<OutputSpec>, ComposeError> {
        let command = ComposeCommand::from_json(command_json)?;
        let base_name = self.base_name(&command);
        let assembler = Assembler::new(&self.sources).with_cancel(self.cancel.clone());

        let result = command.execute_with(&assembler, &self.sources, &base_name, |done, total| {
            self.report_progress(done, total, &format!("Page {} of {}", done, total));
        });

        // A cancellation applies to one run only
        self.cancel.reset();
        if let Err(e) = &result {
            tracing::warn!(command = command.name(), error = %e, "command failed");
        }
        result
    }

    /// Report progress to JavaScript callback
    fn report_progress(&self, current: usize, total: usize, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            let this = JsValue::null();
            let _ = callback.call3(
                &this,
                &JsValue::from(current as u32),
                &JsValue::from(total as u32),
                &JsValue::from_str(message),
            );
        }
    }
}
