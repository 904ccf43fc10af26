//! Loading cassettes from disk.

use std::path::Path;

use super::format::Cassette;
use super::replayer::CassetteReplayer;

/// Load a cassette file and create a replayer.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_cassette(path: &Path) -> Result<CassetteReplayer, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
    let cassette: Cassette = serde_yaml::from_str(&content)
        .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;
    tracing::debug!(name = %cassette.name, exchanges = cassette.exchanges.len(), "loaded cassette");
    Ok(CassetteReplayer::new(cassette))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::CallKind;

    #[test]
    fn load_valid_cassette() {
        let dir = std::env::temp_dir().join("recolor_cassette_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.cassette.yaml");
        std::fs::write(
            &path,
            "name: test\nrecorded_at: \"2026-10-01T00:00:00Z\"\ncommit: abc\nexchanges:\n  \
             - seq: 0\n    method: submit\n    response:\n      err:\n        status: 500\n        \
             message: boom\n",
        )
        .unwrap();

        let mut replayer = load_cassette(&path).unwrap();
        let exchange = replayer.next_exchange(CallKind::Submit).unwrap();
        assert_eq!(exchange.seq, 0);
        assert_eq!(exchange.response["err"]["status"], 500);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_nonexistent_fails() {
        assert!(load_cassette(Path::new("/nonexistent/cassette.yaml")).is_err());
    }

    #[test]
    fn load_garbage_fails() {
        let dir = std::env::temp_dir().join("recolor_cassette_garbage_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.cassette.yaml");
        std::fs::write(&path, "exchanges: [[[").unwrap();
        assert!(load_cassette(&path).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
