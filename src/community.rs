use std::collections::HashMap;

use itertools::Itertools;

use crate::graph::{LabelAssignment, NodeTable, VInt};

/// A community is identified by the label its members share.
pub type CommID = VInt;

/// Metadata of one community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommMeta {
    pub comm_id: CommID,     // The shared label.
    pub vertices: Vec<VInt>, // Members, in enumeration order.
}

impl CommMeta {
    pub fn size(&self) -> usize {
        self.vertices.len()
    }
}

/// The community structure induced by a label assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Communities {
    communities: Vec<CommMeta>,
}

impl Communities {
    /// Group vertices by label. Communities are ordered by the first member
    /// met in enumeration order.
    pub fn from_labels(labels: &LabelAssignment) -> Communities {
        let mut position = HashMap::<CommID, usize>::new();
        let communities = labels.iter().fold(Vec::<CommMeta>::new(), |mut acc, (vertex, label)| {
            match position.get(&label) {
                Some(idx) => acc[*idx].vertices.push(vertex),
                None => {
                    position.insert(label, acc.len());
                    acc.push(CommMeta {
                        comm_id: label,
                        vertices: vec![vertex],
                    });
                }
            }
            acc
        });
        Communities { communities }
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommMeta> {
        self.communities.iter()
    }

    /// The biggest community; the earliest one wins among equal sizes.
    pub fn largest(&self) -> Option<&CommMeta> {
        self.communities
            .iter()
            .rev()
            .max_by_key(|community| community.size())
    }

    /// Member identifiers of every community.
    pub fn named<'a>(&self, nodes: &'a NodeTable) -> Vec<Vec<&'a str>> {
        self.communities
            .iter()
            .map(|community| community.vertices.iter().map(|v| nodes.name(*v)).collect())
            .collect()
    }

    /// Community sizes in decreasing order, e.g. `"5, 3, 1"`.
    pub fn size_summary(&self) -> String {
        self.communities
            .iter()
            .map(CommMeta::size)
            .sorted_unstable_by(|a, b| b.cmp(a))
            .join(", ")
    }
}
