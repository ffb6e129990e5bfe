use std::{path::Path, sync::Arc};

use tracing::info;

pub mod config;
pub mod errors;
pub mod graph;
pub mod para;
pub mod pipeline;
pub mod records;
pub mod similarity;
pub mod specialization;
pub mod stowage;
pub mod trends;

pub use config::PipelineConfig;
pub use errors::{DataIntegrityError, FieldmapError, Result};
pub use graph::{Edge, Graph, GraphScope, Node};
pub use records::{Entity, EntityKind, Snapshot};
pub use stowage::Stowage;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Graphs,
    Specialize,
    Summary,
    All,
}

pub fn runner(comm: Command, root: &Path, config: &PipelineConfig) -> Result<()> {
    let stowage = Stowage::new(root)?;
    let snapshot = Arc::new(stowage.load_snapshot()?);
    info!("running {:?} on {}", comm, root.display());

    if matches!(comm, Command::Graphs | Command::All) {
        let graphs = pipeline::build_graphs(&snapshot, config)?;
        stowage.write_graphs(&graphs, config.compress)?;
    }
    if matches!(comm, Command::Specialize | Command::All) {
        let reports = pipeline::build_reports(&snapshot, config)?;
        stowage.write_reports(&reports, config.compress)?;
    }
    if matches!(comm, Command::Summary | Command::All) {
        let summary = pipeline::build_summary(&snapshot, config)?;
        stowage.write_summary(&summary, config.compress)?;
    }
    Ok(())
}
