//! Declarative tool requests
//!
//! Every tool in the UI sends one [`ComposeCommand`]. A command is turned into
//! one or more page plans, each assembled into an [`OutputSpec`].

use crate::assemble::Assembler;
use crate::error::{ComposeError, ErrorReport, Result};
use crate::numbering::PageNumbering;
use crate::overlay::{OverlayContent, OverlaySpec};
use crate::plan::{DocumentId, PagePlan, PageRef, PageTargets, PlanEntry};
use crate::range::{chunk_groups, parse_range, select, RangeGroup, SelectionMode};
use crate::rotation::accumulate;
use crate::source::SourceSet;
use crate::split::{file_stem, plan_split};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One page of an organize snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageItem {
    pub document: DocumentId,
    /// 0-based page index in `document`.
    pub index: usize,
    /// Degrees added to the page's rotation.
    #[serde(default)]
    pub rotation: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum ComposeCommand {
    /// Pages from any loaded documents, in the order shown.
    Organize { pages: Vec<PageItem> },
    Reorder {
        document: DocumentId,
        order: Vec<usize>,
    },
    Rotate {
        document: DocumentId,
        /// 0-based pages to turn; all pages when absent.
        #[serde(default)]
        pages: Option<Vec<usize>>,
        degrees: i64,
    },
    Delete {
        document: DocumentId,
        pages: Vec<usize>,
    },
    Merge { documents: Vec<DocumentId> },
    Split {
        document: DocumentId,
        ranges: String,
        #[serde(default)]
        mode: SelectionMode,
    },
    /// Split into consecutive chunks of `every` pages.
    SplitEvery { document: DocumentId, every: usize },
    Watermark {
        document: DocumentId,
        overlay: OverlaySpec,
        #[serde(default)]
        targets: PageTargets,
    },
    Signature {
        document: DocumentId,
        /// 0-based page to sign.
        page: usize,
        overlay: OverlaySpec,
    },
    PageNumbers {
        document: DocumentId,
        #[serde(default)]
        numbering: PageNumbering,
    },
}

/// One output document.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub bytes: Vec<u8>,
    pub suggested_file_name: String,
    pub page_count: usize,
}

/// A plan waiting to be assembled, with its output name.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOutput {
    pub plan: PagePlan,
    pub suggested_file_name: String,
}

impl ComposeCommand {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ComposeError::Serialization(e.to_string()))
    }

    /// Short verb used in logs and output names.
    pub fn name(&self) -> &'static str {
        match self {
            ComposeCommand::Organize { .. } => "organize",
            ComposeCommand::Reorder { .. } => "reorder",
            ComposeCommand::Rotate { .. } => "rotate",
            ComposeCommand::Delete { .. } => "delete",
            ComposeCommand::Merge { .. } => "merge",
            ComposeCommand::Split { .. } => "split",
            ComposeCommand::SplitEvery { .. } => "split-every",
            ComposeCommand::Watermark { .. } => "watermark",
            ComposeCommand::Signature { .. } => "signature",
            ComposeCommand::PageNumbers { .. } => "page-numbers",
        }
    }

    /// The document whose name the outputs are named after.
    pub fn primary_document(&self) -> Option<DocumentId> {
        match self {
            ComposeCommand::Organize { pages } => pages.first().map(|p| p.document),
            ComposeCommand::Merge { .. } => None,
            ComposeCommand::Reorder { document, .. }
            | ComposeCommand::Rotate { document, .. }
            | ComposeCommand::Delete { document, .. }
            | ComposeCommand::Split { document, .. }
            | ComposeCommand::SplitEvery { document, .. }
            | ComposeCommand::Watermark { document, .. }
            | ComposeCommand::Signature { document, .. }
            | ComposeCommand::PageNumbers { document, .. } => Some(*document),
        }
    }

    /// Build the page plans for this command. Nothing is assembled.
    pub fn plan(&self, sources: &SourceSet, base_name: &str) -> Result<Vec<PlannedOutput>> {
        let count = |document: DocumentId| -> Result<usize> {
            Ok(sources.get(document)?.page_count())
        };
        let stem = file_stem(base_name);
        let single = |plan: PagePlan, suffix: &str| {
            vec![PlannedOutput {
                plan,
                suggested_file_name: format!("{}-{}.pdf", stem, suffix),
            }]
        };

        Ok(match self {
            ComposeCommand::Organize { pages } => {
                if pages.is_empty() {
                    return Err(ComposeError::EmptySelection);
                }
                let entries = pages
                    .iter()
                    .map(|item| {
                        let page_count = count(item.document)?;
                        if item.index >= page_count {
                            return Err(ComposeError::PageIndex {
                                document: item.document,
                                index: item.index,
                                page_count,
                            });
                        }
                        let mut entry = PlanEntry::copy_of(PageRef::new(item.document, item.index));
                        entry.rotation_delta = accumulate(0, item.rotation)?.degrees();
                        Ok(entry)
                    })
                    .collect::<Result<Vec<_>>>()?;
                single(PagePlan::new(entries), "organized")
            }
            ComposeCommand::Reorder { document, order } => {
                single(PagePlan::reorder(*document, count(*document)?, order)?, "reordered")
            }
            ComposeCommand::Rotate {
                document,
                pages,
                degrees,
            } => {
                let plan = PagePlan::identity(*document, count(*document)?);
                let plan = match pages {
                    Some(pages) => plan.rotate_pages(pages, *degrees)?,
                    None => plan.rotate_all(*degrees)?,
                };
                single(plan, "rotated")
            }
            ComposeCommand::Delete { document, pages } => {
                single(PagePlan::without(*document, count(*document)?, pages)?, "edited")
            }
            ComposeCommand::Merge { documents } => {
                if documents.is_empty() {
                    return Err(ComposeError::EmptySelection);
                }
                let counts = documents
                    .iter()
                    .map(|&document| Ok((document, count(document)?)))
                    .collect::<Result<Vec<_>>>()?;
                vec![PlannedOutput {
                    plan: PagePlan::merge(&counts),
                    suggested_file_name: "merged.pdf".to_string(),
                }]
            }
            ComposeCommand::Split {
                document,
                ranges,
                mode,
            } => {
                let groups = select(parse_range(ranges, count(*document)?)?, *mode);
                split_outputs(*document, &groups, base_name)?
            }
            ComposeCommand::SplitEvery { document, every } => {
                let groups = chunk_groups(count(*document)?, *every)?;
                split_outputs(*document, &groups, base_name)?
            }
            ComposeCommand::Watermark {
                document,
                overlay,
                targets,
            } => {
                let plan = PagePlan::identity(*document, count(*document)?)
                    .stamp(overlay.clone(), targets)?;
                single(plan, "watermarked")
            }
            ComposeCommand::Signature {
                document,
                page,
                overlay,
            } => {
                if !matches!(overlay.content, OverlayContent::Image { .. }) {
                    return Err(ComposeError::InvalidOverlay(
                        "a signature must be an image".into(),
                    ));
                }
                let page_count = count(*document)?;
                if *page >= page_count {
                    return Err(ComposeError::PageIndex {
                        document: *document,
                        index: *page,
                        page_count,
                    });
                }
                let plan = PagePlan::identity(*document, page_count)
                    .stamp(overlay.clone(), &PageTargets::Only(vec![*page]))?;
                single(plan, "signed")
            }
            ComposeCommand::PageNumbers {
                document,
                numbering,
            } => {
                let plan = numbering.apply(PagePlan::identity(*document, count(*document)?))?;
                single(plan, "numbered")
            }
        })
    }

    /// Plan and assemble every output. All plans are built before any is assembled.
    pub fn execute_with<F>(
        &self,
        assembler: &Assembler<'_>,
        sources: &SourceSet,
        base_name: &str,
        mut on_page: F,
    ) -> Result<Vec<OutputSpec>>
    where
        F: FnMut(usize, usize),
    {
        let planned = self.plan(sources, base_name)?;
        let total: usize = planned.iter().map(|p| p.plan.len()).sum();
        tracing::info!(
            command = self.name(),
            outputs = planned.len(),
            pages = total,
            "executing command"
        );

        let mut done = 0;
        planned
            .into_iter()
            .map(|output| {
                let bytes = assembler.assemble_with_progress(&output.plan, |page, _| {
                    on_page(done + page, total);
                })?;
                done += output.plan.len();
                Ok(OutputSpec {
                    bytes,
                    suggested_file_name: output.suggested_file_name,
                    page_count: output.plan.len(),
                })
            })
            .collect()
    }

    pub fn execute(&self, sources: &SourceSet, base_name: &str) -> Result<Vec<OutputSpec>> {
        self.execute_with(&Assembler::new(sources), sources, base_name, |_, _| {})
    }
}

fn split_outputs(
    document: DocumentId,
    groups: &[RangeGroup],
    base_name: &str,
) -> Result<Vec<PlannedOutput>> {
    Ok(plan_split(groups, base_name)?
        .into_iter()
        .map(|output| PlannedOutput {
            plan: output.to_page_plan(document),
            suggested_file_name: output.suggested_file_name,
        })
        .collect())
}

/// JSON-friendly summary of a command run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    pub files: Vec<EncodedOutput>,
    pub error: Option<ErrorReport>,
    pub metrics: Option<ProcessMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodedOutput {
    pub file_name: String,
    /// Base64-encoded PDF data
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: usize,
    pub output_count: usize,
    pub processing_time_ms: u64,
}

impl ProcessResult {
    /// `processing_time_ms` is measured by the caller; the core has no clock.
    pub fn from_outcome(
        outcome: Result<Vec<OutputSpec>>,
        input_size_bytes: usize,
        processing_time_ms: u64,
    ) -> Self {
        match outcome {
            Ok(outputs) => Self {
                success: true,
                metrics: Some(ProcessMetrics {
                    input_size_bytes,
                    output_size_bytes: outputs.iter().map(|o| o.bytes.len()).sum(),
                    page_count: outputs.iter().map(|o| o.page_count).sum(),
                    output_count: outputs.len(),
                    processing_time_ms,
                }),
                files: outputs
                    .into_iter()
                    .map(|o| EncodedOutput {
                        file_name: o.suggested_file_name,
                        data: STANDARD.encode(&o.bytes),
                    })
                    .collect(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                files: Vec::new(),
                error: Some(e.report()),
                metrics: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::image::encode_test_png;
    use crate::test_support::{create_test_pdf, page_content, page_rotate};
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    const A: DocumentId = DocumentId(0);
    const B: DocumentId = DocumentId(1);

    fn sources() -> SourceSet {
        SourceSet::from_bytes(&[create_test_pdf(5, "A"), create_test_pdf(2, "B")]).unwrap()
    }

    fn names(outputs: &[OutputSpec]) -> Vec<&str> {
        outputs.iter().map(|o| o.suggested_file_name.as_str()).collect()
    }

    #[test]
    fn test_deserialize_split() {
        let cmd = ComposeCommand::from_json(
            r#"{"type": "Split", "document": 0, "ranges": "1-2, 4"}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ComposeCommand::Split {
                document: A,
                ranges: "1-2, 4".into(),
                mode: SelectionMode::SplitEach,
            }
        );
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ComposeCommand::from_json(
            r#"{"type": "Merge", "documents": [0], "compress": true}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializationError);
        assert!(ComposeCommand::from_json(r#"{"type": "Explode"}"#).is_err());
    }

    #[test]
    fn test_split_produces_one_output_per_clause() {
        let set = sources();
        let cmd = ComposeCommand::Split {
            document: A,
            ranges: "1-2, 5".into(),
            mode: SelectionMode::SplitEach,
        };
        let outputs = cmd.execute(&set, "report.pdf").unwrap();
        assert_eq!(names(&outputs), vec!["report-pages-1-2.pdf", "report-page-5.pdf"]);

        let second = Document::load_mem(&outputs[1].bytes).unwrap();
        assert_eq!(second.get_pages().len(), 1);
        assert!(page_content(&second, 0).contains("A-Page-5"));
    }

    #[test]
    fn test_split_extract_all_flattens() {
        let set = sources();
        let cmd = ComposeCommand::Split {
            document: A,
            ranges: "4, 1-2".into(),
            mode: SelectionMode::ExtractAll,
        };
        let outputs = cmd.execute(&set, "report.pdf").unwrap();
        assert_eq!(names(&outputs), vec!["report-extracted.pdf"]);
        assert_eq!(outputs[0].page_count, 3);
    }

    #[test]
    fn test_split_every() {
        let set = sources();
        let cmd = ComposeCommand::SplitEvery { document: A, every: 2 };
        let outputs = cmd.execute(&set, "a.pdf").unwrap();
        let counts: Vec<usize> = outputs.iter().map(|o| o.page_count).collect();
        assert_eq!(counts, vec![2, 2, 1]);
    }

    #[test]
    fn test_merge_two_documents() {
        let set = sources();
        let outputs = ComposeCommand::Merge {
            documents: vec![B, A],
        }
        .execute(&set, "ignored.pdf")
        .unwrap();
        assert_eq!(names(&outputs), vec!["merged.pdf"]);

        let merged = Document::load_mem(&outputs[0].bytes).unwrap();
        assert_eq!(merged.get_pages().len(), 7);
        assert!(page_content(&merged, 0).contains("B-Page-1"));
        assert!(page_content(&merged, 2).contains("A-Page-1"));
    }

    #[test]
    fn test_organize_mixes_documents_and_rotation() {
        let set = sources();
        let cmd = ComposeCommand::Organize {
            pages: vec![
                PageItem { document: B, index: 1, rotation: -90 },
                PageItem { document: A, index: 0, rotation: 0 },
            ],
        };
        let outputs = cmd.execute(&set, "mix.pdf").unwrap();
        let doc = Document::load_mem(&outputs[0].bytes).unwrap();
        assert!(page_content(&doc, 0).contains("B-Page-2"));
        assert_eq!(page_rotate(&doc, 0), 270);
        assert_eq!(outputs[0].suggested_file_name, "mix-organized.pdf");
    }

    #[test]
    fn test_organize_rejects_bad_rotation_and_index() {
        let set = sources();
        let bad_rotation = ComposeCommand::Organize {
            pages: vec![PageItem { document: A, index: 0, rotation: 45 }],
        };
        assert_eq!(
            bad_rotation.execute(&set, "a.pdf").unwrap_err(),
            ComposeError::UnsupportedRotation(45)
        );

        let bad_index = ComposeCommand::Organize {
            pages: vec![PageItem { document: B, index: 2, rotation: 0 }],
        };
        assert!(matches!(
            bad_index.execute(&set, "a.pdf").unwrap_err(),
            ComposeError::PageIndex { index: 2, page_count: 2, .. }
        ));
    }

    #[test]
    fn test_rotate_selected_pages() {
        let set = sources();
        let cmd = ComposeCommand::from_json(
            r#"{"type": "Rotate", "document": 1, "pages": [1], "degrees": 180}"#,
        )
        .unwrap();
        let outputs = cmd.execute(&set, "b.pdf").unwrap();
        let doc = Document::load_mem(&outputs[0].bytes).unwrap();
        assert_eq!((page_rotate(&doc, 0), page_rotate(&doc, 1)), (0, 180));
    }

    #[test]
    fn test_delete_pages() {
        let set = sources();
        let outputs = ComposeCommand::Delete {
            document: A,
            pages: vec![0, 4],
        }
        .execute(&set, "a.pdf")
        .unwrap();
        assert_eq!(outputs[0].page_count, 3);
    }

    #[test]
    fn test_signature_requires_image_and_valid_page() {
        let set = sources();
        let text = OverlaySpec::new(
            OverlayContent::Text {
                text: "me".into(),
                style: Default::default(),
            },
            50.0,
            50.0,
        );
        let err = ComposeCommand::Signature {
            document: A,
            page: 0,
            overlay: text,
        }
        .execute(&set, "a.pdf")
        .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidOverlay(_)));

        let image = OverlaySpec::new(
            OverlayContent::Image {
                data: encode_test_png(3, 2, [0, 0, 0, 255]),
                width: 150.0,
                height: 50.0,
            },
            60.0,
            80.0,
        );
        let err = ComposeCommand::Signature {
            document: B,
            page: 9,
            overlay: image.clone(),
        }
        .execute(&set, "b.pdf")
        .unwrap_err();
        assert!(matches!(err, ComposeError::PageIndex { index: 9, .. }));

        let outputs = ComposeCommand::Signature {
            document: B,
            page: 1,
            overlay: image,
        }
        .execute(&set, "b.pdf")
        .unwrap();
        assert_eq!(outputs[0].suggested_file_name, "b-signed.pdf");
    }

    #[test]
    fn test_progress_spans_all_outputs() {
        let set = sources();
        let cmd = ComposeCommand::SplitEvery { document: A, every: 3 };
        let mut progress = Vec::new();
        cmd.execute_with(&Assembler::new(&set), &set, "a.pdf", |done, total| {
            progress.push((done, total))
        })
        .unwrap();
        assert_eq!(progress, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    }

    #[test]
    fn test_process_result_reports_errors() {
        let ok = ProcessResult::from_outcome(
            ComposeCommand::Merge { documents: vec![A] }.execute(&sources(), "a.pdf"),
            100,
            7,
        );
        assert!(ok.success);
        let metrics = ok.metrics.unwrap();
        assert_eq!((metrics.page_count, metrics.output_count), (5, 1));
        assert!(STANDARD.decode(&ok.files[0].data).unwrap().starts_with(b"%PDF-"));

        let failed = ProcessResult::from_outcome(Err(ComposeError::EmptySelection), 100, 1);
        assert!(!failed.success);
        assert_eq!(failed.error.unwrap().kind, ErrorKind::EmptySelection);
    }
}
