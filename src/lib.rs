//! Community detection with the label propagation algorithm.
//!
//! Every node starts in its own community and repeatedly adopts the label
//! carrying the heaviest summed edge weight among its neighbors, until the
//! assignment is stable or the iteration cap is reached.
//!
//! ```no_run
//! use lpa_community::graph::Graph;
//! use lpa_community::propagation::LabelPropagation;
//!
//! let (graph, mut labels) = Graph::from_file("data/lpg.txt")?;
//! let stats = LabelPropagation::with_max_iterations(100).propagate(&graph, &mut labels);
//! println!("converged: {}", stats.converged);
//! # Ok::<(), lpa_community::error::LoadError>(())
//! ```

pub mod community;
pub mod config;
pub mod error;
pub mod graph;
pub mod logger;
pub mod output;
pub mod propagation;
