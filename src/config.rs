use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub resources: ResourcesConfig,
    pub tfidf: TfidfConfig,
    pub prompt: PromptConfig,
    pub matrix: MatrixConfig,
    pub routes: RoutesConfig,
    pub dumps: DumpsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/pdf_text.db"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub token_json_dir: PathBuf,
    pub include_globs: Vec<String>,
    /// Tokens longer than this never enter the store.
    pub max_length: usize,
    /// Tokens rarer than this never enter the store.
    pub min_value: i64,
    pub reset_table: bool,
    /// Remove each token JSON after it has been persisted.
    pub delete_source: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            token_json_dir: PathBuf::from("data/token_json"),
            include_globs: vec!["*.json".to_string()],
            max_length: 14,
            min_value: 3,
            reset_table: true,
            delete_source: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResourcesConfig {
    pub resource_dir: PathBuf,
    pub include_globs: Vec<String>,
    pub reset_table: bool,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("data/resources"),
            include_globs: vec!["*.pdf".to_string()],
            reset_table: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TfidfConfig {
    pub global_terms_path: PathBuf,
    /// Global terms below this corpus frequency are not scored.
    pub min_thres_freq: i64,
    /// Upserts per batch inside the single build transaction.
    pub buffer_size: usize,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            global_terms_path: PathBuf::from("data/global_terms.json"),
            min_thres_freq: 4,
            buffer_size: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub buffer_path: PathBuf,
    pub output_path: PathBuf,
    pub top_n: usize,
    /// Looser than ingestion: queries keep longer and rarer tokens.
    pub max_length: usize,
    pub min_value: i64,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            buffer_path: PathBuf::from("data/buffer.json"),
            output_path: PathBuf::from("data/output_prompt.txt"),
            top_n: 9999,
            max_length: 16,
            min_value: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatrixConfig {
    /// Source indices claimed per cursor fetch-add.
    pub ids_per_worker: usize,
    /// Edges a producer accumulates before handing a batch to the writer.
    pub write_threshold: usize,
    /// Producer count; 0 means hardware parallelism (fallback 5).
    pub workers: usize,
    pub reset_table: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            ids_per_worker: 10,
            write_threshold: 10_000,
            workers: 0,
            reset_table: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutesConfig {
    pub output_path: PathBuf,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("data/route_list.txt"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DumpsConfig {
    pub enabled: bool,
    pub processed_dir: PathBuf,
}

impl Default for DumpsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            processed_dir: PathBuf::from("data/processed_data"),
        }
    }
}

impl DumpsConfig {
    pub fn fingerprint_dump_path(&self) -> PathBuf {
        self.processed_dir.join("data_dumper.csv")
    }

    pub fn filtered_dir(&self) -> PathBuf {
        self.processed_dir.join("filtered")
    }

    pub fn resource_dump_path(&self) -> PathBuf {
        self.processed_dir.join("data_info.csv")
    }
}

/// Load configuration from a TOML file, falling back to the default layout
/// when the file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.ingest.max_length == 0 {
        anyhow::bail!("ingest.max_length must be > 0");
    }
    if config.ingest.min_value < 1 {
        anyhow::bail!("ingest.min_value must be >= 1");
    }
    if config.prompt.max_length == 0 {
        anyhow::bail!("prompt.max_length must be > 0");
    }
    if config.prompt.top_n == 0 {
        anyhow::bail!("prompt.top_n must be >= 1");
    }
    if config.tfidf.buffer_size == 0 {
        anyhow::bail!("tfidf.buffer_size must be >= 1");
    }
    if config.matrix.ids_per_worker == 0 {
        anyhow::bail!("matrix.ids_per_worker must be >= 1");
    }
    if config.matrix.write_threshold == 0 {
        anyhow::bail!("matrix.write_threshold must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.ingest.max_length, 14);
        assert_eq!(config.ingest.min_value, 3);
        assert_eq!(config.tfidf.min_thres_freq, 4);
        assert_eq!(config.matrix.write_threshold, 10_000);
        assert_eq!(config.storage.db_path, PathBuf::from("data/pdf_text.db"));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("studyrec.toml");
        std::fs::write(&path, "[ingest]\nmax_length = 10\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.ingest.max_length, 10);
        assert_eq!(config.ingest.min_value, 3);
        assert_eq!(config.prompt.max_length, 16);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("studyrec.toml");
        std::fs::write(&path, "[matrix]\nwrite_threshold = 0\n").unwrap();

        assert!(load_config(&path).is_err());
    }
}
