use std::collections::HashMap;

use rb_core::core::{parse_regions, regions_for_item, DatasetItem, ImageDimensions, ImageId, Role};

use crate::models::{BoundingBox, ImageAnnotation};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Also emit items that have no annotation at all. Skipped items are
    /// never emitted, regardless of this flag.
    pub include_unannotated: bool,
}

/// Pixel-coordinate payload for a spliced region tag: `x1.y1.x2.y2`.
pub fn format_coordinates(bbox: &BoundingBox, dimensions: ImageDimensions) -> String {
    let width = f64::from(dimensions.width);
    let height = f64::from(dimensions.height);
    let x1 = (bbox.x * width).round() as i64;
    let y1 = (bbox.y * height).round() as i64;
    let x2 = ((bbox.x + bbox.width) * width).round() as i64;
    let y2 = ((bbox.y + bbox.height) * height).round() as i64;
    format!("{x1}.{y1}.{x2}.{y2}")
}

/// Merge stored boxes back into the dataset text.
///
/// Every emitted item is a deep copy; the inputs are never mutated. The
/// first `gpt` turn is re-parsed for authoritative offsets, then boxed
/// regions are spliced in descending start-offset order — rewriting from
/// the tail keeps every not-yet-processed span's offsets valid. Regions
/// without a box or without known pixel dimensions keep their original
/// placeholder.
pub fn export_dataset(
    items: &[DatasetItem],
    annotations: &HashMap<ImageId, ImageAnnotation>,
    dimensions: &HashMap<ImageId, ImageDimensions>,
    options: ExportOptions,
) -> Vec<DatasetItem> {
    let mut exported = Vec::new();

    for item in items {
        let annotation = annotations.get(&item.id);
        if annotation.is_none() && !options.include_unannotated {
            continue;
        }
        if annotation.is_some_and(|a| a.skipped) {
            continue;
        }

        let mut copy = item.clone();
        let Some(gpt_index) = copy.conversations.iter().position(|c| c.from == Role::Gpt) else {
            exported.push(copy);
            continue;
        };

        let mut value = copy.conversations[gpt_index].value.clone();
        let mut regions = parse_regions(&value);

        let boxes: HashMap<_, _> = annotation
            .map(|a| {
                a.boxes
                    .iter()
                    .map(|b| (b.region_id.clone(), b))
                    .collect()
            })
            .unwrap_or_default();

        regions.sort_by(|a, b| b.start_offset.cmp(&a.start_offset));
        for region in &regions {
            let Some(bbox) = boxes.get(&region.id) else {
                continue;
            };
            let Some(dims) = dimensions.get(&item.id) else {
                continue;
            };
            let coords = format_coordinates(bbox, *dims);
            value.replace_range(
                region.start_offset..region.end_offset,
                &format!("<region>{coords}</region>"),
            );
        }

        copy.conversations[gpt_index].value = value;
        exported.push(copy);
    }

    exported
}

/// Aggregate annotation progress over a dataset snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    pub total_images: usize,
    /// Items whose box count equals their region count (> 0), not skipped.
    pub annotated_images: usize,
    pub skipped_images: usize,
    pub total_regions: usize,
    /// Box count across all non-skipped annotations, partial ones included.
    pub annotated_regions: usize,
    pub completion_percentage: u32,
}

pub fn get_export_stats(
    items: &[DatasetItem],
    annotations: &HashMap<ImageId, ImageAnnotation>,
) -> ExportStats {
    let mut stats = ExportStats {
        total_images: items.len(),
        annotated_images: 0,
        skipped_images: 0,
        total_regions: 0,
        annotated_regions: 0,
        completion_percentage: 0,
    };

    for item in items {
        let regions = regions_for_item(item);
        stats.total_regions += regions.len();

        let Some(annotation) = annotations.get(&item.id) else {
            continue;
        };
        if annotation.skipped {
            stats.skipped_images += 1;
        } else {
            stats.annotated_regions += annotation.boxes.len();
            if annotation.boxes.len() == regions.len() && !regions.is_empty() {
                stats.annotated_images += 1;
            }
        }
    }

    if stats.total_images > 0 {
        stats.completion_percentage =
            ((stats.annotated_images as f64 / stats.total_images as f64) * 100.0).round() as u32;
    }

    stats
}
