use crate::Network;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, VecDeque};

/// Which branches connect buses when building the topology graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupling {
    /// Only AC lines; the resulting components share a voltage angle reference
    Lines,
    /// Lines and links; the resulting components can exchange power at all
    All,
}

/// Summary statistics of the bus graph.
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
}

/// Undirected bus graph; node weights are bus indices into `network.buses`.
pub fn bus_graph(network: &Network, coupling: Coupling) -> UnGraph<usize, ()> {
    let mut graph = UnGraph::with_capacity(network.buses.len(), network.lines.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(network.buses.len());
    for (i, bus) in network.buses.iter().enumerate() {
        index.insert(bus.name.as_str(), graph.add_node(i));
    }
    let mut connect = |bus0: &str, bus1: &str| {
        // dangling references are reported by validation, not here
        if let (Some(&a), Some(&b)) = (index.get(bus0), index.get(bus1)) {
            graph.add_edge(a, b, ());
        }
    };
    for line in &network.lines {
        connect(&line.bus0, &line.bus1);
    }
    if coupling == Coupling::All {
        for link in &network.links {
            connect(&link.bus0, &link.bus1);
        }
    }
    graph
}

/// Connected groups of bus indices, ordered by their first bus.
pub fn sub_networks(network: &Network, coupling: Coupling) -> Vec<Vec<usize>> {
    let graph = bus_graph(network, coupling);
    let mut visited = vec![false; graph.node_count()];
    let mut groups = Vec::new();
    for start in graph.node_indices() {
        if visited[start.index()] {
            continue;
        }
        let mut members = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited[start.index()] = true;
        while let Some(node) = queue.pop_front() {
            members.push(graph[node]);
            for neighbor in graph.neighbors(node) {
                if !visited[neighbor.index()] {
                    visited[neighbor.index()] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort_unstable();
        groups.push(members);
    }
    groups
}

/// Number of electrically separate islands (lines and links both couple).
pub fn island_count(network: &Network) -> usize {
    connected_components(&bus_graph(network, Coupling::All))
}

pub fn graph_stats(network: &Network) -> GraphStats {
    let graph = bus_graph(network, Coupling::All);
    let node_count = graph.node_count();
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors(node).count())
        .collect();
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / node_count as f64
    };
    GraphStats {
        node_count,
        edge_count: graph.edge_count(),
        connected_components: connected_components(&graph),
        min_degree: degrees.iter().copied().min().unwrap_or(0),
        avg_degree,
        max_degree: degrees.iter().copied().max().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bus, Line, Link};

    fn network() -> Network {
        let mut network = Network::new("graph");
        for name in ["a", "b", "c", "d"] {
            network.add_bus(Bus::new(name)).unwrap();
        }
        network.add_line(Line::new("ab", "a", "b", 0.1)).unwrap();
        network.add_line(Line::new("cd", "c", "d", 0.1)).unwrap();
        network.add_link(Link::new("bc", "b", "c", 10.0)).unwrap();
        network
    }

    #[test]
    fn links_do_not_join_ac_sub_networks() {
        let network = network();
        assert_eq!(
            sub_networks(&network, Coupling::Lines),
            vec![vec![0, 1], vec![2, 3]]
        );
        assert_eq!(sub_networks(&network, Coupling::All), vec![vec![0, 1, 2, 3]]);
        assert_eq!(island_count(&network), 1);
    }

    #[test]
    fn isolated_bus_is_own_island() {
        let mut network = network();
        network.add_bus(Bus::new("e")).unwrap();
        assert_eq!(island_count(&network), 2);
        let stats = graph_stats(&network);
        assert_eq!(stats.node_count, 5);
        assert_eq!(stats.edge_count, 3);
        assert_eq!(stats.min_degree, 0);
        assert_eq!(stats.max_degree, 2);
    }
}
