//! Diagnostic CSV dumps.
//!
//! Dumps mirror what the pipeline persisted so a run can be inspected without
//! opening the database. They are diagnostics: every failure here is logged
//! and swallowed, the database pipeline never aborts on a dump error.

use std::io::Write;
use std::path::Path;
use tracing::warn;

use crate::models::{Fingerprint, ResourceRecord};

/// Truncate the fingerprint dump and write its header row.
pub fn reset_fingerprint_dump(path: &Path) {
    if let Err(e) = write_all(path, "file_name,total_tokens,unique_tokens,relational_distance\n")
    {
        warn!(path = %path.display(), error = %e, "could not reset fingerprint dump");
    }
}

/// Append one document row to the fingerprint dump.
pub fn append_fingerprint_row(path: &Path, fp: &Fingerprint) {
    let row = format!(
        "{},{},{},{}\n",
        fp.file_name, fp.total_tokens, fp.unique_tokens, fp.relational_distance
    );
    if let Err(e) = append_all(path, &row) {
        warn!(path = %path.display(), error = %e, "could not append fingerprint dump row");
    }
}

/// Write the per-document filtered-token dump: one `token,frequency` row per
/// surviving token.
pub fn write_filtered_dump(dir: &Path, fp: &Fingerprint) {
    let path = dir.join(format!("{}.csv", fp.file_name));
    let mut out = String::new();
    for token in &fp.tokens {
        out.push_str(&format!("{},{}\n", token.token, token.frequency));
    }
    if let Err(e) = write_all(&path, &out) {
        warn!(path = %path.display(), error = %e, "could not write filtered dump");
    }
}

/// Truncate the resource dump and write its header row.
pub fn reset_resource_dump(path: &Path) {
    if let Err(e) = write_all(path, "id,file_name,file_path,modified,epoch_time,chunk_count\n") {
        warn!(path = %path.display(), error = %e, "could not reset resource dump");
    }
}

/// Append one resource row, with a human-readable modification time next to
/// the epoch value.
pub fn append_resource_row(path: &Path, record: &ResourceRecord) {
    let modified = chrono::DateTime::from_timestamp(record.epoch_time, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    let row = format!(
        "{},{},{},{},{},{}\n",
        record.id, record.file_name, record.file_path, modified, record.epoch_time,
        record.chunk_count
    );
    if let Err(e) = append_all(path, &row) {
        warn!(path = %path.display(), error = %e, "could not append resource dump row");
    }
}

fn write_all(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

fn append_all(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeightedToken;

    #[test]
    fn fingerprint_dump_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("processed").join("data_dumper.csv");

        let fp = Fingerprint {
            file_name: "a".into(),
            total_tokens: 18,
            unique_tokens: 3,
            relational_distance: 11.5758,
            tokens: vec![WeightedToken {
                token: "cat".into(),
                frequency: 3,
                weight: 0.26,
            }],
        };

        reset_fingerprint_dump(&path);
        append_fingerprint_row(&path, &fp);
        append_fingerprint_row(&path, &fp);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("file_name,"));
        assert_eq!(lines[1], "a,18,3,11.5758");

        // Reset truncates
        reset_fingerprint_dump(&path);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn filtered_dump_lists_tokens() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fp = Fingerprint {
            file_name: "doc".into(),
            total_tokens: 8,
            unique_tokens: 2,
            relational_distance: 5.0,
            tokens: vec![
                WeightedToken {
                    token: "cat".into(),
                    frequency: 3,
                    weight: 0.6,
                },
                WeightedToken {
                    token: "dog".into(),
                    frequency: 5,
                    weight: 1.0,
                },
            ],
        };

        write_filtered_dump(tmp.path(), &fp);
        let content = std::fs::read_to_string(tmp.path().join("doc.csv")).unwrap();
        assert_eq!(content, "cat,3\ndog,5\n");
    }
}
