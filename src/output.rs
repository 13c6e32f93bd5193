use std::io::{self, Write};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::community::Communities;
use crate::graph::{Graph, LabelAssignment};
use crate::propagation::PropagationStats;

/// node -> label pairs serialized as a map that keeps enumeration order.
struct OrderedLabels<'a>(Vec<(&'a str, &'a str)>);

impl Serialize for OrderedLabels<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (node, label) in &self.0 {
            map.serialize_entry(node, label)?;
        }
        map.end()
    }
}

/// Final result of a run, ready to be rendered.
#[derive(Serialize)]
pub struct Report<'a> {
    iterations: u64,
    converged: bool,
    labels: OrderedLabels<'a>,
    communities: Vec<Vec<&'a str>>,
}

impl<'a> Report<'a> {
    pub fn new(graph: &'a Graph, labels: &LabelAssignment, stats: &PropagationStats) -> Report<'a> {
        Report {
            iterations: stats.iterations,
            converged: stats.converged,
            labels: OrderedLabels(labels.to_named(graph.nodes())),
            communities: Communities::from_labels(labels).named(graph.nodes()),
        }
    }
}

pub fn write_json<W: Write>(mut writer: W, report: &Report<'_>) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()
}

/// One `node<TAB>label` line per vertex.
pub fn write_tsv<W: Write>(mut writer: W, graph: &Graph, labels: &LabelAssignment) -> io::Result<()> {
    for (node, label) in labels.to_named(graph.nodes()) {
        writeln!(writer, "{}\t{}", node, label)?;
    }
    writer.flush()
}
