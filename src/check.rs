//! Semantic analysis over the two parsed documents.
//!
//! Everything here is a pure derivation over `(nodes, declarations)`; all of
//! it runs, and must succeed, before any emission starts.

use crate::ast::{Declaration, Env, Expr, Node, Value};
use crate::error::CompileError;

/// The simulation constants recognized in the configuration document, with
/// their defaults. `max_time` and `time_tick` keep the folded [`Value`] so
/// the header renders integer-valued constants the way they were written.
#[derive(Debug, Clone, PartialEq)]
pub struct Constants {
    /// Simulated time horizon (`max_time`)
    pub max_time: Value,
    /// Output sampling step (`time_tick`)
    pub time_tick: Value,
    /// Kernel RNG seed (`seed_pseudorandom`)
    pub seed: i64,
    /// True only when `discrete_time` is declared as exactly 1
    pub discrete_time: bool,
    /// Number of simulated trajectories (`sample_count`)
    pub sample_count: i64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            max_time: Value::Int(10),
            time_tick: Value::Int(1),
            seed: 0,
            discrete_time: false,
            sample_count: 1_000_000,
        }
    }
}

/// Result of the analysis: everything the back end needs besides the nodes
/// themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Indices of internal nodes, in node declaration order
    pub internals: Vec<usize>,
    /// `(index, initial state)` for configuration-pinned slots, in
    /// declaration order
    pub fixed: Vec<(usize, bool)>,
    /// Indices of unpinned slots, ascending
    pub free: Vec<usize>,
    /// Resolved simulation constants
    pub constants: Constants,
    /// Variable environment for emission substitution
    pub vars: Env,
}

impl Analysis {
    /// Runs every derivation and structural check.
    pub fn run(nodes: &[Node], declarations: &[Declaration]) -> Result<Self, CompileError> {
        resolve_references(nodes, declarations)?;
        required_attributes(nodes)?;
        let (fixed, free) = state_partition(nodes, declarations)?;
        Ok(Self {
            internals: internal_nodes(nodes, declarations)?,
            fixed,
            free,
            constants: constants(declarations)?,
            vars: variables(declarations)?,
        })
    }
}

/// Every attribute declaration must target a parsed node, whatever the
/// attribute key is.
fn resolve_references(nodes: &[Node], declarations: &[Declaration]) -> Result<(), CompileError> {
    for declaration in declarations {
        if let Declaration::Attr { node, .. } = declaration {
            node_index(nodes, node, declaration)?;
        }
    }
    Ok(())
}

/// Both rate attributes must be present on every node; checking here keeps
/// emission total.
fn required_attributes(nodes: &[Node]) -> Result<(), CompileError> {
    for node in nodes {
        for attr in ["rate_up", "rate_down"] {
            if node.attribute(attr).is_none() {
                return Err(CompileError::MissingAttribute {
                    node: node.name.clone(),
                    attr: attr.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Indices of the nodes declared internal, in node declaration order.
///
/// Any declaration folding truthy marks its node; a later `is_internal = 0`
/// does not unmark it.
pub fn internal_nodes(
    nodes: &[Node],
    declarations: &[Declaration],
) -> Result<Vec<usize>, CompileError> {
    let mut internal = vec![false; nodes.len()];
    for declaration in declarations {
        if let Declaration::Attr { node, attr, expr } = declaration {
            if attr == "is_internal" {
                let index = node_index(nodes, node, declaration)?;
                if fold(expr, declaration)?.truthy() {
                    internal[index] = true;
                }
            }
        }
    }
    Ok((0..nodes.len()).filter(|&i| internal[i]).collect())
}

/// Splits the state slots into configuration-pinned and free ones.
///
/// Pinned slots keep the order their `istate` declarations appear in; free
/// slots are ascending. Together they cover `0..nodes.len()` exactly once.
pub fn state_partition(
    nodes: &[Node],
    declarations: &[Declaration],
) -> Result<(Vec<(usize, bool)>, Vec<usize>), CompileError> {
    let mut fixed: Vec<(usize, bool)> = vec![];
    for declaration in declarations {
        if let Declaration::Attr { node, attr, expr } = declaration {
            if attr == "istate" {
                let index = node_index(nodes, node, declaration)?;
                if fixed.iter().any(|&(fixed_index, _)| fixed_index == index) {
                    return Err(CompileError::DuplicateStateAssignment(node.clone()));
                }
                let value = fold(expr, declaration)?;
                fixed.push((index, value.truthy()));
            }
        }
    }

    let free = (0..nodes.len())
        .filter(|index| !fixed.iter().any(|&(fixed_index, _)| fixed_index == *index))
        .collect();

    Ok((fixed, free))
}

/// Folds the first `const` declaration with the given name, if any.
pub fn constant(name: &str, declarations: &[Declaration]) -> Result<Option<Value>, CompileError> {
    for declaration in declarations {
        if let Declaration::Constant {
            name: declared,
            expr,
        } = declaration
        {
            if declared == name {
                return fold(expr, declaration).map(Some);
            }
        }
    }
    Ok(None)
}

/// Resolves the recognized simulation constants, falling back to defaults.
pub fn constants(declarations: &[Declaration]) -> Result<Constants, CompileError> {
    let defaults = Constants::default();
    Ok(Constants {
        max_time: constant("max_time", declarations)?.unwrap_or(defaults.max_time),
        time_tick: constant("time_tick", declarations)?.unwrap_or(defaults.time_tick),
        seed: constant("seed_pseudorandom", declarations)?
            .map_or(defaults.seed, Value::as_i64),
        discrete_time: constant("discrete_time", declarations)?
            .map_or(defaults.discrete_time, |value| value.as_f64() == 1.0),
        sample_count: constant("sample_count", declarations)?
            .map_or(defaults.sample_count, Value::as_i64),
    })
}

/// Folds `var` declarations left-to-right; each sees only earlier bindings.
pub fn variables(declarations: &[Declaration]) -> Result<Env, CompileError> {
    let mut env = Env::new();
    for declaration in declarations {
        if let Declaration::Var { name, expr } = declaration {
            let value = expr
                .evaluate(&env)
                .map_err(|source| CompileError::NonConstant {
                    context: declaration.to_string(),
                    source,
                })?;
            env.insert(name.clone(), value);
        }
    }
    Ok(env)
}

fn node_index(
    nodes: &[Node],
    name: &str,
    declaration: &Declaration,
) -> Result<usize, CompileError> {
    nodes
        .iter()
        .position(|node| node.name == name)
        .ok_or_else(|| CompileError::UnresolvedReference {
            node: name.to_string(),
            decl: declaration.to_string(),
        })
}

fn fold(expr: &Expr, declaration: &Declaration) -> Result<Value, CompileError> {
    expr.evaluate(&Env::new())
        .map_err(|source| CompileError::NonConstant {
            context: declaration.to_string(),
            source,
        })
}
