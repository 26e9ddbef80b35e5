//! Project snapshot JSON.

use cs_ir::ProjectSnapshot;
use tracing::debug;

use crate::FormatError;

/// Parse a project snapshot. Tempo is clamped and the loop region repaired.
pub fn load_project_json(data: &str) -> Result<ProjectSnapshot, FormatError> {
    let mut snapshot: ProjectSnapshot = serde_json::from_str(data)?;
    snapshot.tempo = snapshot.clamped_tempo();
    debug!(
        tracks = snapshot.tracks.len(),
        tempo = snapshot.tempo,
        loop_start = snapshot.loop_region.start(),
        loop_end = snapshot.loop_region.end(),
        "loaded project"
    );
    Ok(snapshot)
}

/// Serialize a project snapshot as pretty-printed JSON.
pub fn project_to_json(snapshot: &ProjectSnapshot) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}
