use std::collections::HashMap;

use rb_core::core::{DatasetItem, ImageDimensions, ImageId};

use crate::files::DatasetDir;

/// Probe pixel dimensions for every item's image file.
///
/// Unreadable or missing images are logged and omitted from the result;
/// the exporter then leaves their regions unspliced, which is the intended
/// per-image degradation.
pub fn probe_dimensions(
    dir: &DatasetDir,
    items: &[DatasetItem],
) -> HashMap<ImageId, ImageDimensions> {
    let mut dimensions = HashMap::new();

    for item in items {
        let path = dir.image_path(&item.image);
        match image::image_dimensions(&path) {
            Ok((width, height)) => {
                dimensions.insert(item.id.clone(), ImageDimensions { width, height });
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    image = %path.display(),
                    "failed to read image dimensions"
                );
            }
        }
    }

    dimensions
}
