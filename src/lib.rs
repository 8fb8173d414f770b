//! A boolean network simulation kernel compiler.
//!
//! Takes a network description (one block per node, binding `rate_up` and
//! `rate_down` expressions) and a simulation configuration (`const`, `var`
//! and `node.attr` statements) and generates the CUDA rate functions plus
//! the header of compile-time constants consumed by the stochastic
//! simulation kernel.

#![deny(missing_docs)]

extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod ast;
pub mod backend;
pub mod check;
pub mod error;
pub mod parser;
pub(crate) mod utils;

use anyhow::Result;

use ast::{Declaration, Node};
use backend::{Cuda, Program, Target};

pub use backend::Artifacts;

/// Compiler context; holds the two parsed documents.
///
/// Both documents are parsed in full before any cross-document resolution,
/// so a failure is always attributed to the right phase.
#[derive(Default)]
pub struct Context {
    nodes: Vec<Node>,
    declarations: Vec<Declaration>,
}

impl Context {
    /// Creates an empty compiler context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the network description document.
    pub fn network(mut self, filename: &str, source: &str) -> Result<Self> {
        self.nodes = parser::parse_network(source, filename)?;
        Ok(self)
    }

    /// Parses the simulation configuration document.
    pub fn config(mut self, filename: &str, source: &str) -> Result<Self> {
        self.declarations = parser::parse_config(source, filename)?;
        Ok(self)
    }

    /// Resolves both documents and renders the kernel artifacts.
    pub fn compile(self) -> Result<Artifacts> {
        let program = Program::build(self.nodes, &self.declarations)?;
        Ok(Cuda::render(&program)?)
    }
}
