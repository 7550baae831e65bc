//! Referral network derived from the record list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{GraphConfig, PatientRecord};

/// Vertex kinds of the referral network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Patient,
    OriginLocation,
    Referrer,
}

impl NodeKind {
    fn id_prefix(self) -> &'static str {
        match self {
            NodeKind::Patient => "",
            NodeKind::OriginLocation => "location-",
            NodeKind::Referrer => "referrer-",
        }
    }
}

/// A patient, origin location or referrer, colored by kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub color: String,
}

/// Link from a patient to its origin location (weight 1) or referrer (weight 2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

/// Deduplicated nodes and patient edges derived from a record list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Node counts per kind plus the edge count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphStats {
    pub patients: usize,
    pub locations: usize,
    pub referrers: usize,
    pub edges: usize,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == id)
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.target == id)
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            edges: self.edges.len(),
            ..GraphStats::default()
        };
        for node in &self.nodes {
            match node.kind {
                NodeKind::Patient => stats.patients += 1,
                NodeKind::OriginLocation => stats.locations += 1,
                NodeKind::Referrer => stats.referrers += 1,
            }
        }
        stats
    }
}

/// Deduplication key for shared nodes.
///
/// `"Dr. Pérez"` and `" dr.  PÉREZ "` both become `"dr.-pérez"`; empty text
/// stays empty and acts as a shared bucket.
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Interning table keyed by (kind, normalized label).
struct Interner<'a> {
    config: &'a GraphConfig,
    seen: HashMap<(NodeKind, String), String>,
}

impl<'a> Interner<'a> {
    fn new(config: &'a GraphConfig) -> Self {
        Self {
            config,
            seen: HashMap::new(),
        }
    }

    /// Returns the node id for `label`, pushing a new node on first sight.
    fn intern(&mut self, nodes: &mut Vec<GraphNode>, kind: NodeKind, label: &str) -> String {
        let key = (kind, normalize_label(label));
        if let Some(id) = self.seen.get(&key) {
            return id.clone();
        }

        let id = format!("{}{}", kind.id_prefix(), key.1);
        nodes.push(GraphNode {
            id: id.clone(),
            label: label.to_string(),
            kind,
            photo_url: None,
            color: self.config.color_for(kind).to_string(),
        });
        self.seen.insert(key, id.clone());
        id
    }
}

/// Build the referral network for `records`.
///
/// Shared location/referrer nodes appear in first-occurrence order, each
/// followed by the patient that introduced them. Every record yields its own
/// patient node, even when identifiers repeat.
pub fn derive_graph(records: &[PatientRecord], config: &GraphConfig) -> Graph {
    let mut graph = Graph::default();
    let mut interner = Interner::new(config);

    for record in records {
        let location_id =
            interner.intern(&mut graph.nodes, NodeKind::OriginLocation, &record.commune);
        let referrer_id =
            interner.intern(&mut graph.nodes, NodeKind::Referrer, &record.referrer_name);

        graph.nodes.push(GraphNode {
            id: record.id.clone(),
            label: record.name.clone(),
            kind: NodeKind::Patient,
            photo_url: record.photo_url.clone(),
            color: config.patient_color.clone(),
        });

        graph.edges.push(GraphEdge {
            source: record.id.clone(),
            target: location_id,
            weight: 1,
            relationship: None,
        });
        graph.edges.push(GraphEdge {
            source: record.id.clone(),
            target: referrer_id,
            weight: 2,
            relationship: Some(record.relationship.clone()),
        });
    }

    tracing::debug!(
        records = records.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "derived referral graph"
    );

    graph
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn record(id: &str, name: &str, commune: &str, referrer: &str, relationship: &str) -> PatientRecord {
        PatientRecord {
            id: id.to_string(),
            name: name.to_string(),
            photo_url: None,
            commune: commune.to_string(),
            location_details: None,
            referrer_name: referrer.to_string(),
            relationship: relationship.to_string(),
            notes: String::new(),
            created_at: 0,
            birth_date: None,
            sex: None,
            diagnosis: String::new(),
            medications: String::new(),
            contraceptive: String::new(),
            last_treatment: String::new(),
        }
    }

    #[test]
    fn single_record_scenario() {
        let records = vec![record("1", "Ana", "Las Condes", "Dr. Pérez", "colega")];
        let graph = derive_graph(&records, &GraphConfig::default());

        let summary: Vec<_> = graph
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.kind, n.label.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("location-las-condes", NodeKind::OriginLocation, "Las Condes"),
                ("referrer-dr.-pérez", NodeKind::Referrer, "Dr. Pérez"),
                ("1", NodeKind::Patient, "Ana"),
            ]
        );

        assert_eq!(
            graph.edges,
            vec![
                GraphEdge {
                    source: "1".into(),
                    target: "location-las-condes".into(),
                    weight: 1,
                    relationship: None,
                },
                GraphEdge {
                    source: "1".into(),
                    target: "referrer-dr.-pérez".into(),
                    weight: 2,
                    relationship: Some("colega".into()),
                },
            ]
        );
    }

    #[test]
    fn colors_follow_kind() {
        let records = vec![record("1", "Ana", "Ñuñoa", "Rosa", "amiga")];
        let config = GraphConfig::default();
        let graph = derive_graph(&records, &config);
        for node in &graph.nodes {
            assert_eq!(node.color, config.color_for(node.kind));
        }
    }

    #[test]
    fn shared_commune_collapses_to_one_node() {
        let records = vec![
            record("1", "Ana", "Providencia", "Rosa", "amiga"),
            record("2", "Beto", "Providencia", "Luis", "hermano"),
        ];
        let graph = derive_graph(&records, &GraphConfig::default());

        let stats = graph.stats();
        assert_eq!(stats.locations, 1);
        assert_eq!(stats.referrers, 2);
        assert_eq!(stats.patients, 2);

        let incoming: Vec<_> = graph.incoming("location-providencia").collect();
        assert_eq!(incoming.len(), 2);
        assert!(incoming.iter().all(|edge| edge.weight == 1));
    }

    #[test]
    fn case_and_spacing_do_not_split_nodes() {
        let records = vec![
            record("1", "Ana", "Las Condes", "Dr. Pérez", "colega"),
            record("2", "Beto", "  las   CONDES ", "DR. PÉREZ", "colega"),
        ];
        let graph = derive_graph(&records, &GraphConfig::default());
        assert_eq!(graph.stats().locations, 1);
        assert_eq!(graph.stats().referrers, 1);
        // The first spelling seen names the node.
        assert_eq!(graph.node("location-las-condes").unwrap().label, "Las Condes");
    }

    #[test]
    fn empty_labels_share_a_bucket() {
        let records = vec![record("1", "Ana", "", "", ""), record("2", "Beto", " ", "", "")];
        let graph = derive_graph(&records, &GraphConfig::default());
        assert_eq!(graph.stats().locations, 1);
        assert_eq!(graph.stats().referrers, 1);
        assert!(graph.node("location-").is_some());
        assert!(graph.node("referrer-").is_some());
    }

    #[test]
    fn location_and_referrer_with_same_text_stay_apart() {
        let records = vec![record("1", "Ana", "Maipú", "Maipú", "vecino")];
        let graph = derive_graph(&records, &GraphConfig::default());
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.node("location-maipú").unwrap().kind, NodeKind::OriginLocation);
        assert_eq!(graph.node("referrer-maipú").unwrap().kind, NodeKind::Referrer);
    }

    #[test]
    fn duplicate_ids_still_yield_one_patient_node_each() {
        let records = vec![
            record("x", "Ana", "Providencia", "Rosa", "amiga"),
            record("x", "Ana", "Providencia", "Rosa", "amiga"),
        ];
        let graph = derive_graph(&records, &GraphConfig::default());
        assert_eq!(graph.stats().patients, 2);
        assert_eq!(graph.edges.len(), 4);
    }

    #[test]
    fn every_patient_has_location_and_referrer_edges() {
        let records = vec![
            record("1", "Ana", "Las Condes", "Rosa", "amiga"),
            record("2", "Beto", "Providencia", "Rosa", "amiga"),
            record("3", "Carla", "Las Condes", "Luis", "colega"),
        ];
        let graph = derive_graph(&records, &GraphConfig::default());

        for patient in graph.nodes.iter().filter(|n| n.kind == NodeKind::Patient) {
            let edges: Vec<_> = graph.edges_from(&patient.id).collect();
            assert_eq!(edges.len(), 2);

            let to_location = edges.iter().find(|e| e.weight == 1).unwrap();
            let to_referrer = edges.iter().find(|e| e.weight == 2).unwrap();
            assert_eq!(
                graph.node(&to_location.target).unwrap().kind,
                NodeKind::OriginLocation
            );
            assert_eq!(graph.node(&to_referrer.target).unwrap().kind, NodeKind::Referrer);
            assert!(to_referrer.relationship.is_some());
        }

        let distinct_locations: HashSet<_> =
            records.iter().map(|r| normalize_label(&r.commune)).collect();
        assert_eq!(graph.stats().locations, distinct_locations.len());
    }

    #[test]
    fn rederiving_is_stable() {
        let records = vec![
            record("1", "Ana", "Las Condes", "Rosa", "amiga"),
            record("2", "Beto", "Providencia", "Luis", "colega"),
        ];
        let config = GraphConfig::default();
        assert_eq!(derive_graph(&records, &config), derive_graph(&records, &config));
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let graph = derive_graph(&[], &GraphConfig::default());
        assert!(graph.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn node_kind_serializes_kebab_case() {
        let value = serde_json::to_value(NodeKind::OriginLocation).unwrap();
        assert_eq!(value, "origin-location");
    }
}
