use crate::custody::SwitchLedger;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Local TOML file holding the whole ledger
pub struct Storage {
    file_path: PathBuf,
}

impl Storage {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Load the ledger, falling back to an empty one
    ///
    /// A missing, unreadable or malformed file is never an error here.
    pub fn load(&self) -> SwitchLedger {
        match self.try_load() {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::warn!(
                    path = %self.file_path.display(),
                    error = %format!("{:#}", e),
                    "Ignoring unreadable ledger file"
                );
                SwitchLedger::new()
            }
        }
    }

    fn try_load(&self) -> Result<SwitchLedger> {
        if !self.file_path.exists() {
            return Ok(SwitchLedger::new());
        }

        let content = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read {}", self.file_path.display()))?;
        if content.trim().is_empty() {
            return Ok(SwitchLedger::new());
        }
        let ledger: SwitchLedger = toml::from_str(&content).context("Malformed ledger file")?;
        Ok(ledger.normalized())
    }

    /// Replace the stored ledger
    ///
    /// Writes a sibling temp file and renames it over the target, so readers
    /// see either the old or the new ledger.
    pub fn save(&self, ledger: &SwitchLedger) -> Result<()> {
        let content = toml::to_string_pretty(ledger)?;

        if let Some(dir) = self.file_path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let tmp_path = self.file_path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.file_path)
            .with_context(|| format!("Failed to replace {}", self.file_path.display()))?;
        Ok(())
    }
}
