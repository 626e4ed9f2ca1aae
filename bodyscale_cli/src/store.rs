//! Append-only CSV reading history.
//!
//! One row per confirmed reading with a fixed header. Reads validate the
//! header before deserializing any row.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use bodyscale_core::{Reading, ReadingStore};
use bodyscale_traits::BoxError;

pub const HEADER: [&str; 14] = [
    "profile_id",
    "weight_kg",
    "bmi",
    "body_fat_pct",
    "water_pct",
    "muscle_kg",
    "bone_kg",
    "bmr_kcal",
    "metabolic_age",
    "visceral_fat",
    "body_type",
    "impedance_ohm",
    "origin",
    "measured_at",
];

#[derive(Debug, Clone)]
pub struct CsvReadingStore {
    path: PathBuf,
}

impl CsvReadingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_empty_file(&self) -> bool {
        std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0)
    }

    fn read_all(&self) -> Result<Vec<Reading>, BoxError> {
        if self.is_empty_file() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let headers = rdr.headers()?.clone();
        if !headers.iter().eq(HEADER.iter().copied()) {
            return Err(format!(
                "reading history {} must have headers {}",
                self.path.display(),
                HEADER.join(",")
            )
            .into());
        }
        let mut out = Vec::new();
        for (i, row) in rdr.deserialize::<Reading>().enumerate() {
            let row = row.map_err(|e| format!("invalid history row {}: {e}", i + 1))?;
            out.push(row);
        }
        Ok(out)
    }
}

impl ReadingStore for CsvReadingStore {
    fn save(&mut self, reading: &Reading) -> Result<(), BoxError> {
        let fresh = self.is_empty_file();
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut w = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        w.serialize(reading)?;
        w.flush()?;
        tracing::debug!(path = %self.path.display(), "reading appended");
        Ok(())
    }

    fn recent(&self, profile_id: &str, limit: usize) -> Result<Vec<Reading>, BoxError> {
        let mut rows: Vec<Reading> = self
            .read_all()?
            .into_iter()
            .rev()
            .filter(|r| r.profile_id == profile_id)
            .collect();
        rows.sort_by(|a, b| b.measured_at.cmp(&a.measured_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(profile: &str, weight: f32, at: &str, with_composition: bool) -> Reading {
        let mut v = json!({
            "profile_id": profile,
            "weight_kg": weight,
            "bmi": 24.5,
            "body_fat_pct": null,
            "water_pct": null,
            "muscle_kg": null,
            "bone_kg": null,
            "bmr_kcal": null,
            "metabolic_age": null,
            "visceral_fat": null,
            "body_type": null,
            "impedance_ohm": null,
            "origin": "scale",
            "measured_at": at,
        });
        if with_composition {
            v["body_fat_pct"] = json!(21.3);
            v["water_pct"] = json!(55.1);
            v["muscle_kg"] = json!(54.2);
            v["bone_kg"] = json!(3.12);
            v["bmr_kcal"] = json!(1650);
            v["metabolic_age"] = json!(31);
            v["visceral_fat"] = json!(8);
            v["body_type"] = json!("normal");
            v["impedance_ohm"] = json!(480);
        }
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvReadingStore::new(dir.path().join("none.csv"));
        assert!(store.recent("default", 5).unwrap().is_empty());
    }

    #[test]
    fn rows_round_trip_newest_first_per_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvReadingStore::new(dir.path().join("nested/readings.csv"));
        store
            .save(&reading("default", 70.0, "2024-03-01T08:00:00Z", true))
            .unwrap();
        store
            .save(&reading("other", 55.0, "2024-03-02T08:00:00Z", false))
            .unwrap();
        store
            .save(&reading("default", 71.5, "2024-03-03T08:00:00Z", false))
            .unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().next().unwrap(), HEADER.join(","));
        assert_eq!(text.lines().count(), 4);

        let rows = store.recent("default", 5).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].weight_kg, 71.5);
        assert!(!rows[0].has_composition());
        assert_eq!(rows[1], reading("default", 70.0, "2024-03-01T08:00:00Z", true));

        assert_eq!(store.recent("default", 1).unwrap().len(), 1);
    }

    #[test]
    fn wrong_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "weight,when\n70,yesterday\n").unwrap();
        let err = CsvReadingStore::new(&path).recent("default", 5).unwrap_err();
        assert!(err.to_string().contains("must have headers"));
    }
}
