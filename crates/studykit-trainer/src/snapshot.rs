use std::path::Path;

use studykit_core::{Dataset, MlError, MlResult};

use crate::harness::TrainingFrame;

/// Write a training frame to CSV: `user_id`, one column per feature, `target`.
pub fn write_snapshot(path: &Path, frame: &TrainingFrame) -> MlResult<()> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| MlError::Serialization(e.to_string()))?;

    let mut header = vec!["user_id".to_string()];
    header.extend(frame.feature_names.iter().map(|n| n.to_string()));
    header.push("target".to_string());
    writer
        .write_record(&header)
        .map_err(|e| MlError::Serialization(e.to_string()))?;

    for (i, user_id) in frame.user_ids.iter().enumerate() {
        let (features, target) = frame.dataset.row(i);
        let mut record = vec![user_id.to_string()];
        record.extend(features.iter().map(|v| v.to_string()));
        record.push(target.to_string());
        writer
            .write_record(&record)
            .map_err(|e| MlError::Serialization(e.to_string()))?;
    }

    writer.flush().map_err(|e| MlError::Serialization(e.to_string()))
}

/// Read a snapshot written by `write_snapshot`. Column names are taken from
/// the header; unparsable numbers are an error, not a silent zero.
pub fn read_snapshot(path: &Path) -> MlResult<(Dataset, Vec<String>, Vec<u64>)> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| MlError::Serialization(e.to_string()))?;

    let header = reader
        .headers()
        .map_err(|e| MlError::Serialization(e.to_string()))?
        .clone();
    if header.len() < 3 {
        return Err(MlError::Serialization(
            "snapshot needs user_id, at least one feature, and target columns".into(),
        ));
    }
    let feature_names: Vec<String> =
        header.iter().skip(1).take(header.len() - 2).map(String::from).collect();

    let mut rows = Vec::new();
    let mut targets = Vec::new();
    let mut user_ids = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| MlError::Serialization(e.to_string()))?;
        let mut fields = record.iter();

        let user_id: u64 = fields
            .next()
            .ok_or_else(|| MlError::Serialization("missing user_id".into()))?
            .parse()
            .map_err(|_| MlError::Serialization("bad user_id".into()))?;

        let values: Vec<f64> = fields
            .map(|f| {
                f.parse::<f64>()
                    .map_err(|_| MlError::Serialization(format!("bad numeric field: {f}")))
            })
            .collect::<MlResult<_>>()?;
        if values.len() != feature_names.len() + 1 {
            return Err(MlError::DimensionMismatch {
                expected: feature_names.len() + 1,
                got: values.len(),
            });
        }

        let (features, target) = values.split_at(feature_names.len());
        rows.push(features.to_vec());
        targets.push(target[0]);
        user_ids.push(user_id);
    }

    Ok((Dataset::new(rows, targets)?, feature_names, user_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use studykit_core::UserFeatureProfile;

    fn toy_frame() -> TrainingFrame {
        let rows = vec![vec![0.1; 9], vec![0.5; 9], vec![0.9; 9]];
        let targets = vec![10.0, 50.0, 90.0];
        TrainingFrame {
            dataset: Dataset::new(rows, targets).unwrap(),
            feature_names: UserFeatureProfile::FEATURE_NAMES.to_vec(),
            user_ids: vec![7, 8, 9],
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join("studykit_snapshot_test.csv");

        let frame = toy_frame();
        write_snapshot(&path, &frame).unwrap();
        let (dataset, names, user_ids) = read_snapshot(&path).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(names.len(), 9);
        assert_eq!(user_ids, vec![7, 8, 9]);
        assert_eq!(dataset.targets(), frame.dataset.targets());
        assert_eq!(dataset.features()[1], frame.dataset.features()[1]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = std::env::temp_dir();
        let path = dir.join("studykit_snapshot_garbage.csv");
        std::fs::write(&path, "user_id,a,target\n1,not_a_number,5\n").unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(MlError::Serialization(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
