use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List the files under `root` whose names match any of the include globs,
/// sorted by path for deterministic processing order.
pub fn list_input_files(root: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("Input directory does not exist: {}", root.display());
    }

    let include_set = build_globset(include_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !include_set.is_match(name.as_ref()) {
            continue;
        }

        files.push(entry.path().to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_matching_files_sorted() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("a.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("skip.txt"), "x").unwrap();

        let files = list_input_files(tmp.path(), &["*.json".to_string()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn missing_directory_errors() {
        assert!(list_input_files(Path::new("no/such/dir"), &["*.json".to_string()]).is_err());
    }

    #[test]
    fn empty_directory_is_fine() {
        let tmp = tempfile::TempDir::new().unwrap();
        let files = list_input_files(tmp.path(), &["*.json".to_string()]).unwrap();
        assert!(files.is_empty());
    }
}
