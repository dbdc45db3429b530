//! Capacity-bounded tabular destination: the whole retention buffer is
//! rewritten as a CSV table on every cycle, so the file always mirrors the
//! sink's `buffer` most recent records.

use std::{collections::VecDeque, fs::File, io::BufWriter, path::PathBuf};

use csv::Writer;

use crate::{
    error::{PersistError, StartError},
    pipeline::Record,
    store::Destination,
};

pub struct CsvTableDestination {
    path: PathBuf,
    columns: Vec<String>,
}

impl CsvTableDestination {
    /// Verifies the file is writable up front; a destination that cannot be
    /// opened fails the start attempt, not the first cycle.
    pub fn open(
        path: PathBuf,
        input_names: Vec<String>,
        output_names: Vec<String>,
    ) -> Result<Self, StartError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        File::create(&path)?;

        let mut columns = vec!["date_time".to_string()];
        columns.extend(input_names);
        columns.extend(output_names);
        Ok(Self { path, columns })
    }
}

impl Destination for CsvTableDestination {
    fn persist(
        &mut self,
        _latest: &Record,
        history: &VecDeque<Record>,
    ) -> Result<(), PersistError> {
        let file = File::create(&self.path)?;
        let mut wtr = Writer::from_writer(BufWriter::new(file));
        wtr.write_record(&self.columns)?;

        for record in history {
            let mut row = Vec::with_capacity(self.columns.len());
            row.push(record.timestamp.to_rfc3339());
            for v in record.inputs.iter().chain(record.outputs.iter()) {
                row.push(v.to_string());
            }
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(seq: u64) -> Record {
        Record {
            seq,
            timestamp: Utc::now(),
            inputs: vec![seq as f64],
            outputs: vec![seq as f64 * 2.0],
        }
    }

    #[test]
    fn rewrites_full_table_each_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let mut dest = CsvTableDestination::open(
            path.clone(),
            vec!["feed".into()],
            vec!["quality".into()],
        )
        .unwrap();

        let mut history: VecDeque<Record> = VecDeque::new();
        for seq in 1..=3 {
            history.push_back(record(seq));
            let latest = history.back().unwrap().clone();
            dest.persist(&latest, &history).unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date_time,feed,quality");
        // Header plus exactly the current history.
        assert_eq!(lines.len(), 4);
        assert!(lines[3].contains("3,6"));
    }
}
