use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use log::{debug, info};

use crate::config::{DEFAULT_EDGE_WEIGHT, READ_BUFFER_SIZE};
use crate::error::{LoadError, ParseError};

/// Dense vertex index, assigned in first-seen order.
pub type VInt = u32;
pub type Weight = u64;

/// One line of the edge list: `src<TAB>dst[<TAB>weight]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub src: String,
    pub dst: String,
    pub weight: Weight,
}

impl EdgeRecord {
    pub fn new(src: impl Into<String>, dst: impl Into<String>, weight: Weight) -> Self {
        EdgeRecord {
            src: src.into(),
            dst: dst.into(),
            weight,
        }
    }

    pub fn unweighted(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self::new(src, dst, DEFAULT_EDGE_WEIGHT)
    }

    /// Parse a single record, `line_no` is only used for error reporting.
    /// The weight field is optional per line and defaults to 1. Only the line
    /// terminator is stripped, so an empty leading or trailing field is an error.
    pub fn parse(line_no: usize, line: &str) -> Result<Self, ParseError> {
        let text = line.trim_end_matches(['\r', '\n']);
        let tokens: Vec<&str> = text.split('\t').collect();
        let weight = match tokens.len() {
            2 => DEFAULT_EDGE_WEIGHT,
            3 => {
                let raw = tokens[2].trim();
                raw.parse::<Weight>()
                    .map_err(|source| ParseError::InvalidWeight {
                        line: line_no,
                        value: raw.to_owned(),
                        source,
                    })?
            }
            found => {
                return Err(ParseError::FieldCount {
                    line: line_no,
                    found,
                    text: text.to_owned(),
                })
            }
        };
        if tokens[0].is_empty() || tokens[1].is_empty() {
            return Err(ParseError::EmptyNode {
                line: line_no,
                text: text.to_owned(),
            });
        }
        Ok(EdgeRecord::new(tokens[0], tokens[1], weight))
    }
}

/// Maps node identifiers to dense indices and back.
#[derive(Debug, Default, Clone)]
pub struct NodeTable {
    names: Vec<String>,
    index: HashMap<String, VInt>,
}

impl NodeTable {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, vertex: VInt) -> &str {
        &self.names[vertex as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<VInt> {
        self.index.get(name).copied()
    }

    /// Return the index of `name`, registering it first if unseen.
    /// The flag tells whether the node is new.
    pub(crate) fn intern(&mut self, name: &str) -> (VInt, bool) {
        if let Some(vertex) = self.index.get(name) {
            return (*vertex, false);
        }
        let vertex = self.names.len() as VInt;
        self.names.push(name.to_owned());
        self.index.insert(name.to_owned(), vertex);
        (vertex, true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VInt, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(vertex, name)| (vertex as VInt, name.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjacencyEntry {
    pub neighbor: VInt,
    pub weight: Weight,
}

/// Per-vertex neighbor lists. Parallel edges and self-loops are kept as-is.
#[derive(Debug, Default, Clone)]
pub struct AdjacencyIndex {
    lists: Vec<Vec<AdjacencyEntry>>,
}

impl AdjacencyIndex {
    pub fn neighbors(&self, vertex: VInt) -> &[AdjacencyEntry] {
        &self.lists[vertex as usize]
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Total number of entries, i.e. twice the number of edges.
    pub fn entry_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    fn push_vertex(&mut self) {
        self.lists.push(Vec::new());
    }

    fn append(&mut self, vertex: VInt, neighbor: VInt, weight: Weight) {
        self.lists[vertex as usize].push(AdjacencyEntry { neighbor, weight });
    }
}

/// Current community of every vertex. A label is itself a vertex index,
/// so it shares the identifier space of the nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelAssignment {
    labels: Vec<VInt>,
}

impl LabelAssignment {
    /// Every vertex in its own community.
    pub fn singletons(graph: &Graph) -> Self {
        LabelAssignment {
            labels: graph.vertices().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of `vertex`; a vertex not covered yet is its own community.
    pub fn get(&self, vertex: VInt) -> VInt {
        self.labels.get(vertex as usize).copied().unwrap_or(vertex)
    }

    /// Overwrite the label of `vertex`, returning whether it changed.
    pub fn set(&mut self, vertex: VInt, label: VInt) -> bool {
        let slot = &mut self.labels[vertex as usize];
        let changed = *slot != label;
        *slot = label;
        changed
    }

    pub fn as_slice(&self) -> &[VInt] {
        &self.labels
    }

    /// (vertex, label) pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (VInt, VInt)> + '_ {
        self.labels
            .iter()
            .enumerate()
            .map(|(vertex, label)| (vertex as VInt, *label))
    }

    /// (node identifier, label identifier) pairs in enumeration order.
    pub fn to_named<'a>(&self, nodes: &'a NodeTable) -> Vec<(&'a str, &'a str)> {
        self.iter()
            .map(|(vertex, label)| (nodes.name(vertex), nodes.name(label)))
            .collect()
    }

    /// Give every vertex of `graph` without a label its own community.
    /// Returns how many labels were added.
    pub fn cover(&mut self, graph: &Graph) -> usize {
        let missing = graph.vertex_count().saturating_sub(self.labels.len());
        let start = self.labels.len() as VInt;
        self.labels.extend(start..graph.vertex_count() as VInt);
        missing
    }

    fn push(&mut self, label: VInt) {
        self.labels.push(label);
    }
}

/// Undirected weighted graph built from an edge list.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    nodes: NodeTable,
    adjacency: AdjacencyIndex,
    edge_count: usize,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn adjacency(&self) -> &AdjacencyIndex {
        &self.adjacency
    }

    pub fn neighbors(&self, vertex: VInt) -> &[AdjacencyEntry] {
        self.adjacency.neighbors(vertex)
    }

    pub fn vertex_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn vertices(&self) -> Range<VInt> {
        0..self.nodes.len() as VInt
    }

    /// Register a node without any edge.
    pub fn add_vertex(&mut self, name: &str) -> (VInt, bool) {
        let (vertex, is_new) = self.nodes.intern(name);
        if is_new {
            self.adjacency.push_vertex();
        }
        (vertex, is_new)
    }

    /// Insert both directions of an edge record. Callers outside the crate go
    /// through [`Graph::insert_edge`] so the label assignment keeps up.
    pub(crate) fn add_edge(&mut self, record: &EdgeRecord) {
        let (src, _) = self.add_vertex(&record.src);
        let (dst, _) = self.add_vertex(&record.dst);
        self.adjacency.append(src, dst, record.weight);
        self.adjacency.append(dst, src, record.weight);
        self.edge_count += 1;
    }

    /// Build the graph and its initial label assignment from edge records.
    pub fn build<I>(records: I) -> (Graph, LabelAssignment)
    where
        I: IntoIterator<Item = EdgeRecord>,
    {
        let mut graph = Graph::new();
        let mut labels = LabelAssignment { labels: Vec::new() };
        for record in records {
            graph.add_record(&record, &mut labels);
        }
        (graph, labels)
    }

    /// Like [`Graph::build`], but aborts on the first malformed record.
    pub fn try_build<I>(records: I) -> Result<(Graph, LabelAssignment), ParseError>
    where
        I: IntoIterator<Item = Result<EdgeRecord, ParseError>>,
    {
        let mut graph = Graph::new();
        let mut labels = LabelAssignment { labels: Vec::new() };
        for record in records {
            graph.add_record(&record?, &mut labels);
        }
        Ok((graph, labels))
    }

    /// Load a tab-separated edge list. Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<(Graph, LabelAssignment), LoadError> {
        let mut graph = Graph::new();
        let mut labels = LabelAssignment { labels: Vec::new() };
        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = EdgeRecord::parse(line_idx + 1, &line)?;
            graph.add_record(&record, &mut labels);
        }
        debug!(
            "Loaded {} vertices and {} edges",
            graph.vertex_count(),
            graph.edge_count()
        );
        Ok((graph, labels))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<(Graph, LabelAssignment), LoadError> {
        let path = path.as_ref();
        let graph_file = File::open(path)?;
        let graph_reader = BufReader::with_capacity(READ_BUFFER_SIZE, graph_file);
        let loaded = Graph::from_reader(graph_reader)?;
        info!(
            "Graph {} loaded: {} vertices, {} edges",
            path.display(),
            loaded.0.vertex_count(),
            loaded.0.edge_count()
        );
        Ok(loaded)
    }

    /// Add an edge to a built graph, giving any new endpoint its own label.
    pub fn insert_edge(&mut self, record: &EdgeRecord, labels: &mut LabelAssignment) {
        labels.cover(self);
        self.add_record(record, labels);
    }

    fn add_record(&mut self, record: &EdgeRecord, labels: &mut LabelAssignment) {
        for endpoint in [&record.src, &record.dst] {
            let (vertex, is_new) = self.add_vertex(endpoint);
            if is_new {
                // A fresh node starts in its own community.
                labels.push(vertex);
            }
        }
        self.add_edge(record);
    }
}
