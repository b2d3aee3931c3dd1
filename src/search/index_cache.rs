use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::ann_engine::FlatL2Index;
use super::data_loader::Dataset;

/// Persisted semantic index: the embedding matrix (held inside the flat
/// index, row-aligned with the dataset) plus what it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticIndexCache {
    pub dataset_fingerprint: [u8; 32],
    pub embedding_model: String,
    pub index: FlatL2Index,
}

impl SemanticIndexCache {
    pub fn new(dataset: &Dataset, embedding_model: &str, index: FlatL2Index) -> Self {
        Self {
            dataset_fingerprint: dataset.fingerprint(),
            embedding_model: embedding_model.to_string(),
            index,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open semantic index cache at {:?}", path))?;
        let cache: Self = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("Semantic index cache at {:?} is corrupt", path))?;
        Ok(cache)
    }

    /// Writes the whole artifact to a sibling temp file and renames it into
    /// place, so readers see either the old file or the complete new one.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
        }

        let tmp_path = temp_path(path);
        let write_result = (|| -> Result<()> {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.context(format!("Failed to write semantic index cache to {:?}", tmp_path)));
        }
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move semantic index cache into {:?}", path))?;
        Ok(())
    }

    /// Whether this cache was built from exactly `dataset`'s rows with `embedding_model`.
    pub fn matches(&self, dataset: &Dataset, embedding_model: &str) -> bool {
        self.dataset_fingerprint == dataset.fingerprint()
            && self.index.len() == dataset.len()
            && self.embedding_model == embedding_model
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "semantic_index".into());
    name.push(".tmp");
    path.with_file_name(name)
}
