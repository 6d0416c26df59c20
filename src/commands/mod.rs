//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod load_graph;
pub mod serve;

pub use load_graph::{run as load_graph_run, LoadGraphConfig};
pub use serve::{run as serve_run, ServeConfig};
