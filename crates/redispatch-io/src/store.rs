use crate::exporter::export_solved;
use crate::path_security::resolve_destination;
use anyhow::Context;
use redispatch_core::{NetworkError, NetworkResult, ResultsStore, SolvedNetwork};
use std::path::{Path, PathBuf};

/// Writes solved networks as CSV folders below a root directory.
///
/// Every export empties its destination first, so results from an earlier
/// run never mix with the current one.
#[derive(Debug, Clone)]
pub struct CsvResultsStore {
    root: PathBuf,
}

impl CsvResultsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResultsStore for CsvResultsStore {
    fn export(&self, solved: &SolvedNetwork, destination: &str) -> NetworkResult<()> {
        let path = resolve_destination(&self.root, destination)
            .map_err(|e| NetworkError::Validation(e.to_string()))?;
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        export_solved(solved, &path)
            .with_context(|| format!("exporting {} to {}", solved.network().name, path.display()))?;
        tracing::info!(destination = %path.display(), objective = solved.objective(), "exported results");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redispatch_core::{Bus, Dispatch, Network};
    use tempfile::tempdir;

    fn solved() -> SolvedNetwork {
        let mut network = Network::new("tiny");
        network.add_bus(Bus::new("A")).unwrap();
        let mut dispatch = Dispatch::default();
        dispatch.objective = 42.0;
        dispatch.buses_marginal_price.insert("A".into(), vec![10.0]);
        SolvedNetwork::new(network, dispatch)
    }

    #[test]
    fn export_replaces_stale_results() {
        let dir = tempdir().unwrap();
        let store = CsvResultsStore::new(dir.path());
        let stale = dir.path().join("run/network_model/stale.csv");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        store.export(&solved(), "run/network_model").unwrap();

        assert!(!stale.exists());
        let folder = dir.path().join("run/network_model");
        assert!(folder.join("buses.csv").exists());
        assert!(folder.join("buses-marginal_price.csv").exists());
        let objective = std::fs::read_to_string(folder.join("objective.json")).unwrap();
        assert!(objective.contains("42"));
    }

    #[test]
    fn escaping_destination_is_rejected() {
        let dir = tempdir().unwrap();
        let store = CsvResultsStore::new(dir.path().join("results"));
        let err = store.export(&solved(), "../outside").unwrap_err();
        assert!(matches!(err, NetworkError::Validation(_)));
        assert!(!dir.path().join("outside").exists());
    }
}
