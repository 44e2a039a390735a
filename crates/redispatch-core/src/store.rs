use crate::{NetworkResult, SolvedNetwork};

/// Persists solved networks.
///
/// `destination` is an opaque identifier interpreted by the implementation,
/// e.g. a folder path for file-based stores. Exporting to a destination that
/// already holds results replaces them.
pub trait ResultsStore {
    fn export(&self, solved: &SolvedNetwork, destination: &str) -> NetworkResult<()>;
}

impl<S: ResultsStore + ?Sized> ResultsStore for &S {
    fn export(&self, solved: &SolvedNetwork, destination: &str) -> NetworkResult<()> {
        (**self).export(solved, destination)
    }
}
