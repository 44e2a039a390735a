//! # redispatch-io: Network Data I/O
//!
//! Reads and writes networks as a folder of CSV tables and persists solved
//! networks through [`CsvResultsStore`], the file-based
//! [`ResultsStore`](redispatch_core::ResultsStore).
//!
//! ## Folder Layout
//!
//! | File | Content |
//! |------|---------|
//! | `snapshots.csv` | `name,weighting` |
//! | `buses.csv` | `name,country,x,y` |
//! | `generators.csv` | `name,bus,p_nom,marginal_cost,p_min_pu,p_max_pu,carrier` |
//! | `loads.csv` | `name,bus,p_set` |
//! | `storage_units.csv` | `name,bus,p_nom,max_hours,...` |
//! | `lines.csv` | `name,bus0,bus1,x,r,s_nom,s_max_pu` |
//! | `links.csv` | `name,bus0,bus1,p_nom,p_min_pu,p_max_pu,marginal_cost` |
//! | `<list>-<attr>.csv` | one column per component, one row per snapshot |
//! | `objective.json` | objective and solver of a solved network |
//!
//! Only `buses.csv` is required on import. A missing static table means
//! no components of that kind; a missing series file means every component
//! uses its static value. Empty cells fall back to the attribute default.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use redispatch_io::{export_csv_folder, import_csv_folder};
//!
//! fn main() -> anyhow::Result<()> {
//!     let network = import_csv_folder("networks/elec_s_6")?;
//!     println!("{}", network.stats());
//!     export_csv_folder(&network, "/tmp/elec_s_6_copy")?;
//!     Ok(())
//! }
//! ```

pub mod exporter;
pub mod importer;
pub mod path_security;
pub mod store;
pub mod tables;

pub use exporter::{export_csv_folder, export_solved};
pub use importer::{import_csv_folder, ImportResult};
pub use store::CsvResultsStore;
