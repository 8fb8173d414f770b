//! Lowering of the analyzed model into kernel source text.

use crate::ast::{Declaration, Node};
use crate::check::Analysis;
use crate::error::CompileError;

pub mod cuda;

pub use cuda::Cuda;

/// The analyzed model: the node sequence coupled with every resolved fact
/// the emitter needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Network nodes, in state-slot order
    pub nodes: Vec<Node>,
    /// Resolved configuration facts
    pub analysis: Analysis,
}

impl Program {
    /// Analyzes the parsed documents and couples them for emission.
    pub fn build(nodes: Vec<Node>, declarations: &[Declaration]) -> Result<Self, CompileError> {
        let analysis = Analysis::run(&nodes, declarations)?;
        Ok(Self { nodes, analysis })
    }
}

/// The rendered output artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    /// Rate functions and the aggregation routine
    pub source: String,
    /// Compile-time simulation constants
    pub header: String,
}

/// An emission target.
pub trait Target {
    /// Renders both artifacts in memory. Nothing is written anywhere on
    /// failure, so a caller can create its output files only afterwards.
    fn render(program: &Program) -> Result<Artifacts, CompileError>;
}
