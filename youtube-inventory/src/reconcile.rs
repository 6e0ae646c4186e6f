//! Merging of tier results into the final, ordered inventory.

use crate::duration;
use crate::record::{Privacy, VideoRecord};
use crate::youtube_api::Video;
use std::collections::{HashMap, HashSet};

/// Builds one record per id, in the order of `ids`.
///
/// Ids present in `found` become full records. Everything else, whether listed in `missing`
/// or not, becomes an unresolved placeholder. The output does not depend on the order in
/// which `found` and `missing` were filled.
pub fn reconcile(
    ids: &[String],
    found: &HashMap<String, Video>,
    missing: &HashSet<String>,
) -> Vec<VideoRecord> {
    let records: Vec<VideoRecord> = ids
        .iter()
        .map(|id| match found.get(id) {
            Some(video) => resolved(id, video),
            None => {
                if !missing.contains(id) {
                    tracing::debug!(id = %id, "id was neither found nor reported missing");
                }
                VideoRecord::unresolved(id.as_str())
            }
        })
        .collect();

    tracing::debug!(
        total = records.len(),
        unresolved = records.iter().filter(|r| r.is_unresolved()).count(),
        "reconciled inventory"
    );
    records
}

fn resolved(id: &str, video: &Video) -> VideoRecord {
    let classification = duration::classify(video.duration());
    VideoRecord {
        id: id.to_string(),
        title: video.title().map(str::to_owned),
        published_at: video.published_at().map(str::to_owned),
        duration: video.duration().map(str::to_owned),
        duration_seconds: classification.seconds(),
        video_type: classification.video_type(),
        privacy: Privacy::from_status(video.privacy_status()),
        note: None,
    }
}
