use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const PARSED_DIR: &str = "parsed";

/// Directory of `<run_id>.xml` batch files. Consumed batches move to `parsed/`.
#[derive(Debug, Clone)]
pub struct DataLake {
    root: PathBuf,
}

impl DataLake {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn parsed_dir(&self) -> PathBuf {
        self.root.join(PARSED_DIR)
    }

    pub fn batch_path(&self, run_id: u64) -> PathBuf {
        self.root.join(format!("{}.xml", run_id))
    }

    pub fn write_batch(&self, run_id: u64, xml: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.batch_path(run_id);
        fs::write(&path, xml)?;
        Ok(path)
    }

    /// Unparsed batch files, ordered by run_id. Files whose stem is not a
    /// number sort after the numbered ones, by name.
    pub fn pending_batches(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut batches = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list data lake: {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "xml") {
                batches.push(path);
            }
        }
        batches.sort_by_key(|p| {
            let stem = p.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            (stem.parse::<u64>().map_or(u64::MAX, |id| id), stem)
        });
        Ok(batches)
    }

    pub fn mark_parsed(&self, batch: &Path) -> Result<PathBuf> {
        let dir = self.parsed_dir();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let name = batch
            .file_name()
            .with_context(|| format!("not a batch file: {}", batch.display()))?;
        let target = dir.join(name);
        fs::rename(batch, &target)
            .with_context(|| format!("Failed to move {} to {}", batch.display(), target.display()))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_batches_sorted_by_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let lake = DataLake::new(dir.path().join("lake"));
        for id in [10, 2, 1] {
            lake.write_batch(id, "<rss><channel/></rss>").unwrap();
        }
        fs::write(lake.root().join("notes.txt"), "ignored").unwrap();

        let names: Vec<_> = lake
            .pending_batches()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1.xml", "2.xml", "10.xml"]);
    }

    #[test]
    fn test_mark_parsed_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let lake = DataLake::new(dir.path());
        let batch = lake.write_batch(5, "<rss><channel/></rss>").unwrap();

        let moved = lake.mark_parsed(&batch).unwrap();
        assert!(!batch.exists());
        assert_eq!(moved, lake.parsed_dir().join("5.xml"));
        assert!(lake.pending_batches().unwrap().is_empty());
    }

    #[test]
    fn test_missing_lake_has_no_batches() {
        let dir = tempfile::tempdir().unwrap();
        let lake = DataLake::new(dir.path().join("absent"));
        assert!(lake.pending_batches().unwrap().is_empty());
    }
}
