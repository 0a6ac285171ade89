//! Persisted pose libraries.
//!
//! A pose document lists, for one class, which pose each stored template id
//! was built from. It is written next to the class templates so a test run can
//! map a match back to its angle and scale.

use crate::pose::Pose;
use crate::util::codec::{read_document, write_document};
use crate::util::ShapeMatchResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One pose of the library and the template id it was stored under.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    /// Pose the template was built for.
    pub pose: Pose,
    /// Template id within the class.
    pub template_id: usize,
}

/// Pose library of one class.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseDocument {
    /// Class the records belong to.
    pub class_id: String,
    /// Width of the training image the poses were rendered from.
    pub src_width: usize,
    /// Height of the training image the poses were rendered from.
    pub src_height: usize,
    /// Records in insertion order.
    pub records: Vec<PoseRecord>,
}

impl PoseDocument {
    /// Creates an empty document for a class.
    pub fn new(class_id: impl Into<String>, src_width: usize, src_height: usize) -> Self {
        Self {
            class_id: class_id.into(),
            src_width,
            src_height,
            records: Vec::new(),
        }
    }

    /// Appends a record.
    pub fn push(&mut self, pose: Pose, template_id: usize) {
        self.records.push(PoseRecord { pose, template_id });
    }

    /// Returns the pose stored for `template_id`, if any.
    pub fn pose_of(&self, template_id: usize) -> Option<Pose> {
        self.records
            .iter()
            .find(|record| record.template_id == template_id)
            .map(|record| record.pose)
    }

    /// Writes the document; YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn save(&self, path: impl AsRef<Path>) -> ShapeMatchResult<()> {
        write_document(path.as_ref(), self)
    }

    /// Reads a document written by [`PoseDocument::save`].
    pub fn load(path: impl AsRef<Path>) -> ShapeMatchResult<Self> {
        read_document(path.as_ref())
    }
}
