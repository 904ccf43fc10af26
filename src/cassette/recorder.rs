//! Records provider exchanges into a cassette file.

use std::path::PathBuf;

use chrono::Utc;

use super::format::{CallKind, Cassette, Exchange};

/// Collects exchanges and writes them as a YAML cassette.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    name: String,
    commit: String,
    exchanges: Vec<Exchange>,
}

impl CassetteRecorder {
    /// Create a recorder that will write to the given path.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self { path: path.into(), name: name.into(), commit: commit.into(), exchanges: Vec::new() }
    }

    /// Append an exchange; sequence numbers follow insertion order.
    pub fn record(
        &mut self,
        method: CallKind,
        request: serde_json::Value,
        response: serde_json::Value,
    ) {
        let seq = self.exchanges.len() as u64;
        self.exchanges.push(Exchange { seq, method, request, response });
    }

    /// Number of exchanges recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Write the cassette YAML file to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, std::io::Error> {
        let cassette = Cassette {
            name: self.name,
            recorded_at: Utc::now(),
            commit: self.commit,
            exchanges: self.exchanges,
        };
        let yaml = serde_yaml::to_string(&cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        Ok(self.path)
    }
}
