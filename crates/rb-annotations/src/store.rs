use std::collections::HashMap;

use chrono::Utc;
use rb_core::core::{ImageId, RegionId};
use uuid::Uuid;

use crate::models::{BoundingBox, BoxUpdate, ImageAnnotation, NormalizedRect};

/// One entry in the undo log. `bbox` is the box value after the action;
/// `Update` additionally carries the value before it.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationAction {
    Add {
        image_id: ImageId,
        bbox: BoundingBox,
    },
    Update {
        image_id: ImageId,
        bbox: BoundingBox,
        previous: BoundingBox,
    },
    Delete {
        image_id: ImageId,
        bbox: BoundingBox,
    },
}

/// In-memory annotation state: per-image box collections, skip flags, the
/// paired undo/redo stacks, and the dirty flag consumed by the save layer.
///
/// All operations are synchronous and total — invalid targets are no-ops,
/// never errors. Single logical writer; hosts sharing a store across
/// threads must serialize access themselves.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    annotations: HashMap<ImageId, ImageAnnotation>,
    undo_stack: Vec<AnnotationAction>,
    redo_stack: Vec<AnnotationAction>,
    dirty: bool,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, image_id: &ImageId) -> &mut ImageAnnotation {
        self.annotations
            .entry(image_id.clone())
            .or_insert_with(|| ImageAnnotation::empty(image_id.clone()))
    }

    /// Pushing a fresh action always abandons the redo branch.
    fn push_action(&mut self, action: AnnotationAction) {
        self.undo_stack.push(action);
        self.redo_stack.clear();
        self.dirty = true;
    }

    /// Create or replace the box for `(image, region)`.
    ///
    /// The rect is clamped into the unit square first. When the region is
    /// already boxed, the replacement keeps the existing box id and list
    /// position and is logged as an update; otherwise a new box with a
    /// fresh id is appended and logged as an add.
    pub fn add_box(
        &mut self,
        image_id: &ImageId,
        region_id: &RegionId,
        rect: NormalizedRect,
    ) -> BoundingBox {
        let rect = rect.clamped();
        let annotation = self.entry_mut(image_id);
        annotation.last_modified = Utc::now();

        let existing = annotation
            .boxes
            .iter()
            .position(|b| &b.region_id == region_id);

        match existing {
            Some(pos) => {
                let previous = annotation.boxes[pos].clone();
                let bbox = BoundingBox {
                    id: previous.id,
                    region_id: region_id.clone(),
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                };
                annotation.boxes[pos] = bbox.clone();
                self.push_action(AnnotationAction::Update {
                    image_id: image_id.clone(),
                    bbox: bbox.clone(),
                    previous,
                });
                bbox
            }
            None => {
                let bbox = BoundingBox {
                    id: Uuid::new_v4(),
                    region_id: region_id.clone(),
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                };
                annotation.boxes.push(bbox.clone());
                self.push_action(AnnotationAction::Add {
                    image_id: image_id.clone(),
                    bbox: bbox.clone(),
                });
                bbox
            }
        }
    }

    /// Merge the `Some` fields of `update` into an existing box. No-op when
    /// the image or box does not exist. No clamping here — callers clamp.
    pub fn update_box(&mut self, image_id: &ImageId, box_id: Uuid, update: BoxUpdate) {
        let Some(annotation) = self.annotations.get_mut(image_id) else {
            return;
        };
        let Some(pos) = annotation.boxes.iter().position(|b| b.id == box_id) else {
            return;
        };

        let previous = annotation.boxes[pos].clone();
        let mut bbox = previous.clone();
        if let Some(x) = update.x {
            bbox.x = x;
        }
        if let Some(y) = update.y {
            bbox.y = y;
        }
        if let Some(width) = update.width {
            bbox.width = width;
        }
        if let Some(height) = update.height {
            bbox.height = height;
        }

        annotation.boxes[pos] = bbox.clone();
        annotation.last_modified = Utc::now();
        self.push_action(AnnotationAction::Update {
            image_id: image_id.clone(),
            bbox,
            previous,
        });
    }

    /// Remove a box by id. No-op when the image or box does not exist.
    pub fn delete_box(&mut self, image_id: &ImageId, box_id: Uuid) {
        let Some(annotation) = self.annotations.get_mut(image_id) else {
            return;
        };
        let Some(pos) = annotation.boxes.iter().position(|b| b.id == box_id) else {
            return;
        };

        let removed = annotation.boxes.remove(pos);
        annotation.last_modified = Utc::now();
        self.push_action(AnnotationAction::Delete {
            image_id: image_id.clone(),
            bbox: removed,
        });
    }

    /// Remove the box annotating `region_id`, if any.
    pub fn delete_box_by_region(&mut self, image_id: &ImageId, region_id: &RegionId) {
        let Some(annotation) = self.annotations.get(image_id) else {
            return;
        };
        let Some(box_id) = annotation
            .boxes
            .iter()
            .find(|b| &b.region_id == region_id)
            .map(|b| b.id)
        else {
            return;
        };
        self.delete_box(image_id, box_id);
    }

    /// Remove every box for an image in one step. This is the one
    /// irreversible mutation: it wipes BOTH history stacks instead of
    /// logging an action. No-op when there is nothing to clear.
    pub fn clear_boxes(&mut self, image_id: &ImageId) {
        let Some(annotation) = self.annotations.get_mut(image_id) else {
            return;
        };
        if annotation.boxes.is_empty() {
            return;
        }

        annotation.boxes.clear();
        annotation.last_modified = Utc::now();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.dirty = true;
    }

    /// Set the skip flag, creating the annotation lazily. Not undo-logged.
    pub fn mark_skipped(&mut self, image_id: &ImageId) {
        let annotation = self.entry_mut(image_id);
        annotation.skipped = true;
        annotation.last_modified = Utc::now();
        self.dirty = true;
    }

    /// Clear the skip flag. No-op when the annotation does not exist.
    pub fn unmark_skipped(&mut self, image_id: &ImageId) {
        let Some(annotation) = self.annotations.get_mut(image_id) else {
            return;
        };
        annotation.skipped = false;
        annotation.last_modified = Utc::now();
        self.dirty = true;
    }

    /// Reverse the most recent action. Returns `false` when there is
    /// nothing to undo. Exactly one entry moves to the redo stack.
    pub fn undo(&mut self) -> bool {
        let Some(action) = self.undo_stack.pop() else {
            return false;
        };

        match &action {
            AnnotationAction::Add { image_id, bbox } => {
                if let Some(annotation) = self.annotations.get_mut(image_id) {
                    annotation.boxes.retain(|b| b.id != bbox.id);
                    annotation.last_modified = Utc::now();
                }
            }
            AnnotationAction::Update {
                image_id,
                bbox,
                previous,
            } => {
                if let Some(annotation) = self.annotations.get_mut(image_id) {
                    if let Some(pos) = annotation.boxes.iter().position(|b| b.id == bbox.id) {
                        annotation.boxes[pos] = previous.clone();
                    }
                    annotation.last_modified = Utc::now();
                }
            }
            AnnotationAction::Delete { image_id, bbox } => {
                let annotation = self.entry_mut(image_id);
                annotation.boxes.push(bbox.clone());
                annotation.last_modified = Utc::now();
            }
        }

        self.redo_stack.push(action);
        self.dirty = true;
        true
    }

    /// Re-apply the most recently undone action. Returns `false` when the
    /// redo stack is empty.
    pub fn redo(&mut self) -> bool {
        let Some(action) = self.redo_stack.pop() else {
            return false;
        };

        match &action {
            AnnotationAction::Add { image_id, bbox } => {
                let annotation = self.entry_mut(image_id);
                annotation.boxes.push(bbox.clone());
                annotation.last_modified = Utc::now();
            }
            AnnotationAction::Update { image_id, bbox, .. } => {
                let annotation = self.entry_mut(image_id);
                if let Some(pos) = annotation.boxes.iter().position(|b| b.id == bbox.id) {
                    annotation.boxes[pos] = bbox.clone();
                }
                annotation.last_modified = Utc::now();
            }
            AnnotationAction::Delete { image_id, bbox } => {
                let annotation = self.entry_mut(image_id);
                annotation.boxes.retain(|b| b.id != bbox.id);
                annotation.last_modified = Utc::now();
            }
        }

        self.undo_stack.push(action);
        self.dirty = true;
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn annotation(&self, image_id: &ImageId) -> Option<&ImageAnnotation> {
        self.annotations.get(image_id)
    }

    pub fn box_for_region(
        &self,
        image_id: &ImageId,
        region_id: &RegionId,
    ) -> Option<&BoundingBox> {
        self.annotations
            .get(image_id)?
            .boxes
            .iter()
            .find(|b| &b.region_id == region_id)
    }

    /// Read surface for the persistence collaborator.
    pub fn annotations(&self) -> &HashMap<ImageId, ImageAnnotation> {
        &self.annotations
    }

    /// Bulk-replace the whole collection (session open). Resets both
    /// history stacks and the dirty flag; history never crosses a load.
    pub fn load_annotations(&mut self, annotations: HashMap<ImageId, ImageAnnotation>) {
        self.annotations = annotations;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
