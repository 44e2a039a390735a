use redispatch_core::{
    Bus, Dispatch, Generator, Line, Link, Load, Network, ResultsStore, Snapshot, SolvedNetwork,
    StorageUnit,
};
use redispatch_io::{export_csv_folder, import_csv_folder, CsvResultsStore};
use tempfile::tempdir;

fn sample_network() -> Network {
    let mut network = Network::new("sample").with_snapshots(vec![
        Snapshot::new("2013-01-01 00:00"),
        Snapshot::new("2013-01-01 01:00").with_weighting(2.0),
    ]);
    network
        .add_bus(Bus::new("DE0 0").with_country("DE").with_coordinates(9.9, 53.5))
        .unwrap();
    network
        .add_bus(Bus::new("DE0 1").with_country("DE").with_coordinates(11.5, 48.1))
        .unwrap();
    network
        .add_generator(
            Generator::new("DE0 0 onwind", "DE0 0", 200.0)
                .with_p_max_pu(vec![0.8, 0.3])
                .with_carrier("onwind"),
        )
        .unwrap();
    network
        .add_generator(Generator::new("DE0 1 OCGT", "DE0 1", 150.0).with_marginal_cost(60.0))
        .unwrap();
    network
        .add_load(Load::new("DE0 1", "DE0 1", vec![120.0, 90.0]))
        .unwrap();
    network
        .add_storage_unit(
            StorageUnit::new("DE0 1 battery", "DE0 1", 20.0)
                .with_max_hours(4.0)
                .with_efficiencies(0.95, 0.95)
                .cyclic(),
        )
        .unwrap();
    network
        .add_line(Line::new("1", "DE0 0", "DE0 1", 0.2).with_s_nom(100.0))
        .unwrap();
    network
        .add_link(Link::new("T1", "DE0 1", "DE0 0", 50.0).bidirectional())
        .unwrap();
    network
}

#[test]
fn exported_folder_imports_to_equal_components() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("sample");
    let network = sample_network();

    export_csv_folder(&network, &folder).unwrap();
    let imported = import_csv_folder(&folder).unwrap();

    assert_eq!(imported.name, "sample");
    assert_eq!(imported.snapshots(), network.snapshots());
    assert_eq!(imported.buses, network.buses);
    assert_eq!(imported.generators, network.generators);
    assert_eq!(imported.loads, network.loads);
    assert_eq!(imported.storage_units, network.storage_units);
    assert_eq!(imported.lines, network.lines);
    assert_eq!(imported.links, network.links);
}

#[test]
fn results_store_writes_dispatch_series() {
    let dir = tempdir().unwrap();
    let network = sample_network();
    let mut dispatch = Dispatch {
        objective: 1234.5,
        solver: "clarabel".into(),
        ..Dispatch::default()
    };
    dispatch
        .generators_p
        .insert("DE0 0 onwind".into(), vec![100.0, 60.0]);
    dispatch.lines_p0.insert("1".into(), vec![100.0, 60.0]);
    let solved = SolvedNetwork::new(network, dispatch);

    let store = CsvResultsStore::new(dir.path().join("results_redispatch"));
    store.export(&solved, "sample/network_model").unwrap();

    let folder = dir.path().join("results_redispatch/sample/network_model");
    let generators_p = std::fs::read_to_string(folder.join("generators-p.csv")).unwrap();
    let mut lines = generators_p.lines();
    assert_eq!(lines.next(), Some("snapshot,DE0 0 onwind"));
    assert_eq!(lines.next(), Some("2013-01-01 00:00,100"));
    assert!(folder.join("lines-p0.csv").exists());
    assert!(!folder.join("links-p0.csv").exists());

    // the exported folder is itself a loadable network
    let reloaded = import_csv_folder(&folder).unwrap();
    assert_eq!(reloaded.generators.len(), 2);
}
