use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A single member of the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    pub name: String,
    pub url: String,
    pub group: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub url: String,
}

/// One shard and its replication ring, in configured order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: u32,
    pub list: Vec<NodeConfig>,
}

/// On-disk layout of the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("topology declares no groups")]
    NoGroups,

    #[error("group {0} has no nodes")]
    EmptyGroup(u32),

    #[error("group ids must be contiguous from 0, found {found} at position {expected}")]
    NonContiguousGroups { expected: u32, found: u32 },

    #[error("node name '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("local node '{0}' is not part of the topology")]
    UnknownLocalNode(String),
}

/// Immutable cluster directory.
///
/// Nodes are stored in an arena; groups and the flattened cluster ring are index lists
/// into it. Ring positions are therefore resolved by index, which keeps the ordering
/// identical on every member.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    groups: Vec<Vec<usize>>,
    cluster_ring: Vec<usize>,
    local: usize,
}

impl Topology {
    pub fn from_config(config: TopologyConfig, local_name: &str) -> Result<Self, TopologyError> {
        if config.groups.is_empty() {
            return Err(TopologyError::NoGroups);
        }

        let mut groups_config = config.groups;
        groups_config.sort_by_key(|group| group.id);

        let mut nodes = Vec::new();
        let mut groups = Vec::with_capacity(groups_config.len());
        let mut seen = HashSet::new();

        for (position, group) in groups_config.into_iter().enumerate() {
            let expected = position as u32;
            if group.id != expected {
                return Err(TopologyError::NonContiguousGroups {
                    expected,
                    found: group.id,
                });
            }
            if group.list.is_empty() {
                return Err(TopologyError::EmptyGroup(group.id));
            }

            let mut ring = Vec::with_capacity(group.list.len());
            for node in group.list {
                if !seen.insert(node.name.clone()) {
                    return Err(TopologyError::DuplicateNode(node.name));
                }
                ring.push(nodes.len());
                nodes.push(Node {
                    name: node.name,
                    url: node.url.trim_end_matches('/').to_string(),
                    group: group.id,
                });
            }
            groups.push(ring);
        }

        let local = nodes
            .iter()
            .position(|node| node.name == local_name)
            .ok_or_else(|| TopologyError::UnknownLocalNode(local_name.to_string()))?;

        let cluster_ring = groups.iter().flatten().copied().collect();

        Ok(Self {
            nodes,
            groups,
            cluster_ring,
            local,
        })
    }

    pub fn local_node(&self) -> &Node {
        &self.nodes[self.local]
    }

    pub fn local_index(&self) -> usize {
        self.local
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Ring of one group. Unknown ids yield an empty ring.
    pub fn group_ring(&self, group: u32) -> &[usize] {
        self.groups
            .get(group as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every node, group by group in ascending id order.
    pub fn cluster_ring(&self) -> &[usize] {
        &self.cluster_ring
    }
}
