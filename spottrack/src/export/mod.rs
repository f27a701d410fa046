//! Deterministic export of one track model to its two output files.

pub mod feature_table;
pub mod trajectory;

use std::path::{Path, PathBuf};

use crate::config::Calibration;
use crate::error::ExportError;
use crate::model::TrackModel;

pub use feature_table::{render_feature_table, write_feature_table};
pub use trajectory::{TrajectoryDocument, render_trajectories};

/// Paths written by [`export_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub trajectory: PathBuf,
    pub feature_table: PathBuf,
}

/// Render both documents, then write them.
///
/// Nothing is written unless both documents rendered; the model is only read.
pub fn export_model(
    model: &TrackModel,
    calibration: &Calibration,
    source_name: &str,
    trajectory_path: &Path,
    feature_table_path: &Path,
) -> Result<ExportedFiles, ExportError> {
    let trajectory = render_trajectories(model, calibration, source_name)?;
    let table = render_feature_table(model)?;

    write_file(trajectory_path, trajectory.as_bytes())?;
    write_file(feature_table_path, &table)?;
    tracing::debug!(
        "Wrote {} and {}",
        trajectory_path.display(),
        feature_table_path.display()
    );

    Ok(ExportedFiles {
        trajectory: trajectory_path.to_path_buf(),
        feature_table: feature_table_path.to_path_buf(),
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::pool;

    #[test]
    fn test_export_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let model = TrackModel::unlinked(pool(&[(0, 1.0, 1.0)]));
        let xml = dir.path().join("a.xml");
        let csv = dir.path().join("a.csv");

        let files = export_model(&model, &Calibration::default(), "a", &xml, &csv).unwrap();
        assert_eq!(files.trajectory, xml);
        let table = std::fs::read_to_string(&csv).unwrap();
        assert_eq!(table.lines().count(), 2);
        let doc = TrajectoryDocument::from_xml(&std::fs::read_to_string(&xml).unwrap()).unwrap();
        assert_eq!(doc.n_tracks, 1);
    }

    #[test]
    fn test_unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing").join("a.xml");
        let csv = dir.path().join("a.csv");
        let model = TrackModel::default();
        let result = export_model(&model, &Calibration::default(), "a", &missing, &csv);
        assert!(matches!(result, Err(ExportError::Io { path, .. }) if path == missing));
    }
}
