//! The CUDA kernel target.
//!
//! Output layout follows the downstream simulation kernel's expectations:
//! one `__device__` rate function per node, one aggregation routine filling
//! the transition-rate buffer, and a header of `constexpr` simulation
//! constants. Field names and ordering in the header are a compatibility
//! surface.

use crate::ast::{Env, Expr, Node};
use crate::error::CompileError;

use super::{Artifacts, Program, Target};

/// Emits CUDA source plus the constants header.
pub struct Cuda;

impl Target for Cuda {
    fn render(program: &Program) -> Result<Artifacts, CompileError> {
        Ok(Artifacts {
            source: render_source(program)?,
            header: render_header(program),
        })
    }
}

const HEADING: &str = "#include \"types.h\"\n";

fn render_source(program: &Program) -> Result<String, CompileError> {
    let mut source = String::from(HEADING);
    for node in &program.nodes {
        source.push_str(&rate_function(node, &program.analysis.vars, &program.nodes)?);
    }
    source.push_str(&aggregate_function(&program.nodes));
    Ok(source)
}

/// One rate function. A node that is up can only transition down and vice
/// versa, hence the branch on the node's own state, down branch first.
fn rate_function(node: &Node, vars: &Env, nodes: &[Node]) -> Result<String, CompileError> {
    let up = emit_attribute(node, "rate_up", vars, nodes)?;
    let down = emit_attribute(node, "rate_down", vars, nodes)?;
    let own_state = Expr::Ident(node.name.clone())
        .emit(vars, nodes)
        .map_err(|source| CompileError::Lower {
            context: format!("node `{}`", node.name),
            source,
        })?;

    Ok(format!(
        r#"
__device__ float {name}_rate(const state_t& state)
{{
    return {own_state} ?
        ({down}) :
        ({up});
}}
"#,
        name = node.name,
        own_state = own_state,
        down = down,
        up = up,
    ))
}

fn emit_attribute(
    node: &Node,
    attr: &str,
    vars: &Env,
    nodes: &[Node],
) -> Result<String, CompileError> {
    let expr = node
        .attribute(attr)
        .ok_or_else(|| CompileError::MissingAttribute {
            node: node.name.clone(),
            attr: attr.to_string(),
        })?;
    expr.emit(vars, nodes).map_err(|source| CompileError::Lower {
        context: format!("{} of node `{}`", attr, node.name),
        source,
    })
}

fn aggregate_function(nodes: &[Node]) -> String {
    let mut body = String::new();
    for (index, node) in nodes.iter().enumerate() {
        body.push_str(&format!(
            "\n    transition_rates[{}] = {}_rate(state);",
            index, node.name
        ));
    }

    format!(
        r#"
__device__ void compute_transition_rates(float* __restrict__ transition_rates, const state_t& state)
{{{body}
}}
"#,
        body = body
    )
}

fn render_header(program: &Program) -> String {
    let analysis = &program.analysis;
    let constants = &analysis.constants;

    let internals = index_list(&analysis.internals);
    let fixed = pair_list(&analysis.fixed);
    let free = index_list(&analysis.free);

    format!(
        r#"#pragma once
#include <utility>

constexpr int states_count = {states_count};

constexpr int internals_count = {internals_count};
constexpr int internals[{internals_cap}] = {{ {internals} }};

constexpr int fixed_vars_count = {fixed_count};
constexpr std::pair<int, bool> fixed_vars[{fixed_cap}] = {{ {fixed} }};

constexpr int free_vars_count = {free_count};
constexpr int free_vars[{free_cap}] = {{ {free} }};

constexpr float max_time = (float){max_time};
constexpr float time_tick = (float){time_tick};
constexpr unsigned long long seed = {seed};
constexpr bool discrete_time = {discrete_time};
constexpr int sample_count = {sample_count};
"#,
        states_count = program.nodes.len(),
        internals_count = analysis.internals.len(),
        internals_cap = capacity(analysis.internals.len()),
        internals = internals,
        fixed_count = analysis.fixed.len(),
        fixed_cap = capacity(analysis.fixed.len()),
        fixed = fixed,
        free_count = analysis.free.len(),
        free_cap = capacity(analysis.free.len()),
        free = free,
        max_time = constants.max_time,
        time_tick = constants.time_tick,
        seed = constants.seed,
        discrete_time = constants.discrete_time,
        sample_count = constants.sample_count,
    )
}

// Zero-length arrays are not valid C++, so empty ones still get a single
// placeholder element.
fn capacity(len: usize) -> usize {
    len.max(1)
}

fn index_list(indices: &[usize]) -> String {
    if indices.is_empty() {
        return "0".to_string();
    }
    indices
        .iter()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn pair_list(pairs: &[(usize, bool)]) -> String {
    if pairs.is_empty() {
        return "0".to_string();
    }
    pairs
        .iter()
        .map(|(index, state)| format!("{{{}, {}}}", index, state))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_config, parse_network};

    const NETWORK: &str = r#"
        node A {
            rate_up = 1;
            rate_down = 0;
        }
        node B {
            rate_up = A;
            rate_down = 0.5;
        }
    "#;

    fn program(config: &str) -> Program {
        let nodes = parse_network(NETWORK, "net.bnd").unwrap();
        let declarations = parse_config(config, "sim.cfg").unwrap();
        Program::build(nodes, &declarations).unwrap()
    }

    #[test]
    fn worked_example() {
        let artifacts = Cuda::render(&program("const max_time = 5; A.istate = 1;")).unwrap();

        assert!(artifacts.header.contains("constexpr int states_count = 2;"));
        assert!(artifacts
            .header
            .contains("constexpr std::pair<int, bool> fixed_vars[1] = { {0, true} };"));
        assert!(artifacts
            .header
            .contains("constexpr int free_vars[1] = { 1 };"));
        assert!(artifacts
            .header
            .contains("constexpr float max_time = (float)5;"));

        // B's up branch reads A's slot
        assert!(artifacts.source.contains(
            "__device__ float B_rate(const state_t& state)\n{\n    return state.is_set(1) ?\n        (0.5) :\n        (state.is_set(0));\n}"
        ));
    }

    #[test]
    fn down_branch_comes_first() {
        let artifacts = Cuda::render(&program("")).unwrap();
        let down = artifacts.source.find("(0) :").unwrap();
        let up = artifacts.source.find("(1);").unwrap();
        assert!(down < up, "rate_down must fill the taken-when-up branch");
    }

    #[test]
    fn aggregation_fills_every_slot_in_order() {
        let artifacts = Cuda::render(&program("")).unwrap();
        let a = artifacts
            .source
            .find("transition_rates[0] = A_rate(state);")
            .unwrap();
        let b = artifacts
            .source
            .find("transition_rates[1] = B_rate(state);")
            .unwrap();
        assert!(a < b);
    }

    #[test]
    fn empty_arrays_keep_a_placeholder_element() {
        let artifacts = Cuda::render(&program("")).unwrap();
        assert!(artifacts
            .header
            .contains("constexpr int internals_count = 0;"));
        assert!(artifacts
            .header
            .contains("constexpr int internals[1] = { 0 };"));
        assert!(artifacts
            .header
            .contains("constexpr int fixed_vars_count = 0;"));
        assert!(artifacts
            .header
            .contains("constexpr std::pair<int, bool> fixed_vars[1] = { 0 };"));
    }

    #[test]
    fn default_constants_render() {
        let artifacts = Cuda::render(&program("")).unwrap();
        assert!(artifacts
            .header
            .contains("constexpr float max_time = (float)10;"));
        assert!(artifacts
            .header
            .contains("constexpr float time_tick = (float)1;"));
        assert!(artifacts
            .header
            .contains("constexpr unsigned long long seed = 0;"));
        assert!(artifacts
            .header
            .contains("constexpr bool discrete_time = false;"));
        assert!(artifacts
            .header
            .contains("constexpr int sample_count = 1000000;"));
    }

    #[test]
    fn internal_nodes_render_their_indices() {
        let artifacts = Cuda::render(&program("B.is_internal = 1;")).unwrap();
        assert!(artifacts
            .header
            .contains("constexpr int internals_count = 1;"));
        assert!(artifacts
            .header
            .contains("constexpr int internals[1] = { 1 };"));
    }

    #[test]
    fn variables_substitute_into_rates() {
        let nodes = parse_network(
            "node A { rate_up = k * 2; rate_down = 1; }",
            "net.bnd",
        )
        .unwrap();
        let declarations = parse_config("var k = 3 + 1;", "sim.cfg").unwrap();
        let program = Program::build(nodes, &declarations).unwrap();
        let artifacts = Cuda::render(&program).unwrap();
        assert!(artifacts.source.contains("(4 * 2)"));
    }

    #[test]
    fn unknown_identifier_in_a_rate_fails() {
        let nodes = parse_network(
            "node A { rate_up = ghost; rate_down = 0; }",
            "net.bnd",
        )
        .unwrap();
        let program = Program::build(nodes, &[]).unwrap();
        let err = Cuda::render(&program).unwrap_err();
        assert!(matches!(err, CompileError::Lower { .. }));
    }

    #[test]
    fn rendering_is_deterministic() {
        let config = "const max_time = 5; A.istate = 1; var k = 2;";
        let first = Cuda::render(&program(config)).unwrap();
        let second = Cuda::render(&program(config)).unwrap();
        assert_eq!(first, second);
    }
}
