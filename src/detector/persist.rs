//! Class template persistence.
//!
//! Each class is written to its own document. A path pattern holds exactly
//! one `%s`, replaced by the class id; the extension selects YAML or JSON.
//! A document lists template pyramids in id order, each with its provenance
//! and one template per pyramid level.

use crate::detector::{check_pose_records, Detector};
use crate::pose::PoseDocument;
use crate::template::{Provenance, Template, TemplatePyramid};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::codec::{read_document, write_document};
use crate::util::{ShapeMatchError, ShapeMatchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CLASS_PLACEHOLDER: &str = "%s";

#[derive(Debug, Serialize, Deserialize)]
struct PyramidDocument {
    template_id: usize,
    #[serde(default)]
    provenance: Provenance,
    templates: Vec<Template>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClassDocument {
    class_id: String,
    pyramid_levels: usize,
    template_pyramids: Vec<PyramidDocument>,
}

/// Outcome of a bulk class load.
#[derive(Debug, Default, PartialEq)]
pub struct ReadReport {
    /// Classes that were loaded, in request order.
    pub loaded: Vec<String>,
    /// Classes rejected by validation, with the reason.
    pub failed: Vec<(String, ShapeMatchError)>,
    /// Pose documents of the loaded classes, when read alongside.
    pub poses: BTreeMap<String, PoseDocument>,
}

impl ReadReport {
    /// Returns true when every requested class was loaded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Expands a `%s` path pattern for one class.
pub(crate) fn class_path(pattern: &str, class_id: &str) -> ShapeMatchResult<PathBuf> {
    if pattern.matches(CLASS_PLACEHOLDER).count() != 1 {
        return Err(ShapeMatchError::InvalidPathPattern {
            pattern: pattern.to_string(),
        });
    }
    Ok(PathBuf::from(pattern.replace(CLASS_PLACEHOLDER, class_id)))
}

fn mismatch(class_id: &str, reason: String) -> ShapeMatchError {
    ShapeMatchError::PersistenceMismatch {
        class_id: class_id.to_string(),
        reason,
    }
}

/// Validates a parsed document and converts it into the stored form.
fn pyramids_from_document(
    doc: ClassDocument,
    class_id: &str,
    levels: usize,
) -> ShapeMatchResult<Vec<TemplatePyramid>> {
    if doc.class_id != class_id {
        return Err(mismatch(
            class_id,
            format!("document belongs to class `{}`", doc.class_id),
        ));
    }
    if doc.pyramid_levels != levels {
        return Err(mismatch(
            class_id,
            format!(
                "document has {} pyramid levels, detector uses {levels}",
                doc.pyramid_levels
            ),
        ));
    }

    let count = doc.template_pyramids.len();
    let mut pyramids = Vec::with_capacity(count);
    for (expected_id, entry) in doc.template_pyramids.into_iter().enumerate() {
        if entry.template_id != expected_id {
            return Err(mismatch(
                class_id,
                format!(
                    "template id {} found where {expected_id} was expected",
                    entry.template_id
                ),
            ));
        }
        if entry.templates.len() != levels {
            return Err(mismatch(
                class_id,
                format!(
                    "template {expected_id} has {} levels, expected {levels}",
                    entry.templates.len()
                ),
            ));
        }
        for (level, templ) in entry.templates.iter().enumerate() {
            if templ.pyramid_level() != level {
                return Err(mismatch(
                    class_id,
                    format!("template {expected_id} lists level {level} out of order"),
                ));
            }
            templ.check_invariants().map_err(|reason| {
                mismatch(class_id, format!("template {expected_id}: {reason}"))
            })?;
        }
        if let Provenance::Derived { source_id, .. } = entry.provenance {
            if source_id >= count {
                return Err(mismatch(
                    class_id,
                    format!("template {expected_id} derives from missing template {source_id}"),
                ));
            }
        }
        pyramids.push(TemplatePyramid::new(entry.templates, entry.provenance));
    }
    Ok(pyramids)
}

impl Detector {
    fn class_document(&self, class_id: &str) -> ShapeMatchResult<ClassDocument> {
        let pyramids = self
            .classes
            .get(class_id)
            .ok_or_else(|| ShapeMatchError::UnknownClass {
                class_id: class_id.to_string(),
            })?;
        Ok(ClassDocument {
            class_id: class_id.to_string(),
            pyramid_levels: self.pyramid_levels(),
            template_pyramids: pyramids
                .iter()
                .enumerate()
                .map(|(template_id, pyramid)| PyramidDocument {
                    template_id,
                    provenance: pyramid.provenance(),
                    templates: pyramid.templates().to_vec(),
                })
                .collect(),
        })
    }

    /// Writes one class to `path`.
    pub fn write_class(&self, class_id: &str, path: impl AsRef<Path>) -> ShapeMatchResult<()> {
        let doc = self.class_document(class_id)?;
        write_document(path.as_ref(), &doc)
    }

    /// Writes every class to `pattern` with `%s` replaced by the class id.
    pub fn write_classes(&self, pattern: &str) -> ShapeMatchResult<()> {
        let _span = trace_span!("write_classes", classes = self.classes.len()).entered();
        for class_id in self.classes.keys() {
            let path = class_path(pattern, class_id)?;
            self.write_class(class_id, &path)?;
        }
        Ok(())
    }

    /// Reads one class from `path`, replacing any class with the same id.
    pub fn read_class(&mut self, class_id: &str, path: impl AsRef<Path>) -> ShapeMatchResult<()> {
        let doc: ClassDocument = read_document(path.as_ref())?;
        let pyramids = pyramids_from_document(doc, class_id, self.pyramid_levels())?;
        self.classes.insert(class_id.to_string(), pyramids);
        Ok(())
    }

    /// Reads the requested classes from `pattern`.
    ///
    /// Files that cannot be read or parsed abort the call before any class
    /// is replaced. Documents that parse but disagree with the detector are
    /// reported per class in the returned [`ReadReport`] while the remaining
    /// classes still load.
    pub fn read_classes<S: AsRef<str>>(
        &mut self,
        class_ids: &[S],
        pattern: &str,
    ) -> ShapeMatchResult<ReadReport> {
        self.read_bulk(class_ids, pattern, None)
    }

    /// Reads the requested classes together with their pose documents.
    ///
    /// Same failure rules as [`Detector::read_classes`]; a pose document
    /// that disagrees with its class document rejects that class only.
    /// Accepted pose documents are returned in [`ReadReport::poses`].
    pub fn read_classes_with_poses<S: AsRef<str>>(
        &mut self,
        class_ids: &[S],
        pattern: &str,
        pose_pattern: &str,
    ) -> ShapeMatchResult<ReadReport> {
        self.read_bulk(class_ids, pattern, Some(pose_pattern))
    }

    fn read_bulk<S: AsRef<str>>(
        &mut self,
        class_ids: &[S],
        pattern: &str,
        pose_pattern: Option<&str>,
    ) -> ShapeMatchResult<ReadReport> {
        let _span = trace_span!("read_classes", classes = class_ids.len()).entered();
        let mut docs = Vec::with_capacity(class_ids.len());
        for class_id in class_ids {
            let class_id = class_id.as_ref();
            let doc: ClassDocument = read_document(&class_path(pattern, class_id)?)?;
            let poses = match pose_pattern {
                Some(pose_pattern) => {
                    Some(PoseDocument::load(class_path(pose_pattern, class_id)?)?)
                }
                None => None,
            };
            docs.push((class_id, doc, poses));
        }

        let levels = self.pyramid_levels();
        let mut report = ReadReport::default();
        for (class_id, doc, poses) in docs {
            let checked = pyramids_from_document(doc, class_id, levels).and_then(|pyramids| {
                if let Some(poses) = &poses {
                    check_pose_records(poses, class_id, pyramids.len())?;
                }
                Ok(pyramids)
            });
            match checked {
                Ok(pyramids) => {
                    self.classes.insert(class_id.to_string(), pyramids);
                    report.loaded.push(class_id.to_string());
                    if let Some(poses) = poses {
                        report.poses.insert(class_id.to_string(), poses);
                    }
                }
                Err(err) => {
                    let reason = err.to_string();
                    trace_warn!("class_rejected", class_id = class_id, reason = reason.as_str());
                    report.failed.push((class_id.to_string(), err));
                }
            }
        }
        trace_event!(
            "classes_read",
            loaded = report.loaded.len(),
            failed = report.failed.len()
        );
        Ok(report)
    }
}
