//! Parsers for the network description and the simulation configuration.
//!
//! Both documents are parsed fully and independently; cross-document name
//! resolution happens later, in [`crate::check`].

use annotate_snippets::{
    display_list::{DisplayList, FormatOptions},
    snippet::{Annotation, AnnotationType, Snippet},
};
use pest::{iterators::Pair, Parser};

use crate::ast::{BinaryOp, Declaration, Expr, Node, UnaryOp, Value};
use crate::error::CompileError;
use crate::utils::Span;

mod grammar {
    #[derive(Parser)]
    #[grammar = "grammar.pest"]
    pub struct ModelParser;
}

use grammar::{ModelParser, Rule};

/// Parses a network description into its ordered node sequence.
///
/// The position of a node in the result is its state slot index. Node names
/// must be unique.
pub fn parse_network(source: &str, filename: &str) -> Result<Vec<Node>, CompileError> {
    let mut parsed = ModelParser::parse(Rule::Network, source)
        .map_err(|err| syntax_error(err, source, filename))?;
    let pairs = parsed.next().unwrap().into_inner();

    let mut nodes: Vec<Node> = vec![];
    for pair in pairs {
        match pair.as_rule() {
            Rule::NodeBlock => {
                let node = parse_node(pair);
                if nodes.iter().any(|n| n.name == node.name) {
                    return Err(CompileError::DuplicateNode(node.name));
                }
                nodes.push(node);
            }
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }

    Ok(nodes)
}

/// Parses a simulation configuration into its ordered declaration sequence.
pub fn parse_config(source: &str, filename: &str) -> Result<Vec<Declaration>, CompileError> {
    let mut parsed = ModelParser::parse(Rule::Config, source)
        .map_err(|err| syntax_error(err, source, filename))?;
    let pairs = parsed.next().unwrap().into_inner();

    let mut declarations = vec![];
    for pair in pairs {
        match pair.as_rule() {
            Rule::Statement => declarations.push(parse_statement(pair)),
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }

    Ok(declarations)
}

// NodeBlock = { "node" ~ Ident ~ "{" ~ Attribute* ~ "}" }
fn parse_node(block: Pair<Rule>) -> Node {
    let mut inner = block.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let attributes = inner.map(parse_attribute).collect();
    Node { name, attributes }
}

// Attribute = { Ident ~ ("=" | ":") ~ Expression ~ ";" }
fn parse_attribute(attribute: Pair<Rule>) -> (String, Expr) {
    let mut inner = attribute.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let expr = parse_expression(inner.next().unwrap());
    (name, expr)
}

// Statement = { ConstDecl | VarDecl | AttrDecl }
fn parse_statement(statement: Pair<Rule>) -> Declaration {
    let statement = statement.into_inner().next().unwrap();
    let rule = statement.as_rule();
    let mut inner = statement.into_inner();

    match rule {
        // ConstDecl = { "const" ~ Ident ~ "=" ~ Expression ~ ";" }
        Rule::ConstDecl => Declaration::Constant {
            name: inner.next().unwrap().as_str().to_string(),
            expr: parse_expression(inner.next().unwrap()),
        },
        // VarDecl = { "var" ~ Ident ~ "=" ~ Expression ~ ";" }
        Rule::VarDecl => Declaration::Var {
            name: inner.next().unwrap().as_str().to_string(),
            expr: parse_expression(inner.next().unwrap()),
        },
        // AttrDecl = { Ident ~ "." ~ Ident ~ "=" ~ Expression ~ ";" }
        Rule::AttrDecl => Declaration::Attr {
            node: inner.next().unwrap().as_str().to_string(),
            attr: inner.next().unwrap().as_str().to_string(),
            expr: parse_expression(inner.next().unwrap()),
        },
        _ => unreachable!(),
    }
}

fn parse_expression(pair: Pair<Rule>) -> Expr {
    match pair.as_rule() {
        // Expression = { Conditional }
        // Atom       = { Boolean | Float | Integer | Ident | "(" ~ Expression ~ ")" }
        Rule::Expression | Rule::Atom => parse_expression(pair.into_inner().next().unwrap()),

        // Conditional = { Or ~ ("?" ~ Expression ~ ":" ~ Expression)? }
        Rule::Conditional => {
            let mut inner = pair.into_inner();
            let condition = parse_expression(inner.next().unwrap());
            match inner.next() {
                Some(then) => Expr::Conditional {
                    condition: Box::new(condition),
                    then: Box::new(parse_expression(then)),
                    otherwise: Box::new(parse_expression(inner.next().unwrap())),
                },
                None => condition,
            }
        }

        // Or / And / Comparison / Sum / Product = { X ~ (Op ~ X)* }
        Rule::Or | Rule::And | Rule::Comparison | Rule::Sum | Rule::Product => {
            let mut inner = pair.into_inner();
            let mut expr = parse_expression(inner.next().unwrap());
            while let Some(op) = inner.next() {
                let right = parse_expression(inner.next().unwrap());
                expr = Expr::Binary {
                    op: parse_binary_op(op),
                    left: Box::new(expr),
                    right: Box::new(right),
                };
            }
            expr
        }

        // Unary = { UnaryOp* ~ Atom }
        Rule::Unary => {
            let mut inner = pair.into_inner().rev();
            let mut expr = parse_expression(inner.next().unwrap());
            for op in inner {
                expr = Expr::Unary {
                    op: parse_unary_op(op),
                    operand: Box::new(expr),
                };
            }
            expr
        }

        Rule::Boolean => Expr::Number(Value::Int((pair.as_str() == "true") as i64)),
        Rule::Float => Expr::Number(Value::Float(pair.as_str().parse().unwrap())),
        Rule::Integer => Expr::Number(Value::Int(pair.as_str().parse().unwrap())),
        Rule::Ident => Expr::Ident(pair.as_str().to_string()),

        _ => unreachable!(),
    }
}

fn parse_binary_op(op: Pair<Rule>) -> BinaryOp {
    match op.as_str() {
        "||" => BinaryOp::Or,
        "&&" => BinaryOp::And,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        _ => unreachable!(),
    }
}

fn parse_unary_op(op: Pair<Rule>) -> UnaryOp {
    match op.as_str() {
        "!" => UnaryOp::Not,
        "-" => UnaryOp::Neg,
        _ => unreachable!(),
    }
}

fn syntax_error(err: pest::error::Error<Rule>, source: &str, filename: &str) -> CompileError {
    let (start, end) = match err.location {
        pest::error::InputLocation::Pos(pos) => (pos, pos),
        pest::error::InputLocation::Span(span) => span,
    };
    // an end-of-input location still points at the last line
    let start = start.min(source.len().saturating_sub(1));
    let end = end.clamp(start, source.len());
    let lines = Span::new(filename, source, start, end)
        .lines()
        .unwrap_or_default();
    let message = err.variant.message();

    let snippet = Snippet {
        title: Some(Annotation {
            id: None,
            label: Some("syntax error"),
            annotation_type: AnnotationType::Error,
        }),
        footer: vec![],
        slices: vec![lines.as_annotation(&message, AnnotationType::Error)],
        opt: FormatOptions {
            color: true,
            ..Default::default()
        },
    };

    CompileError::Syntax(DisplayList::from(snippet).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Env;

    #[test]
    fn network_with_two_nodes() {
        let source = r#"
            // a two-node toggle
            node A {
                rate_up = 1;
                rate_down = 0;
            }
            node B {
                rate_up: A;
                rate_down: 0.5;
            }
        "#;
        let nodes = parse_network(source, "net.bnd").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "A");
        assert_eq!(nodes[1].name, "B");
        assert_eq!(
            nodes[1].attribute("rate_up"),
            Some(&Expr::Ident("A".to_string()))
        );
        assert_eq!(
            nodes[1].attribute("rate_down"),
            Some(&Expr::Number(Value::Float(0.5)))
        );
    }

    #[test]
    fn attribute_set_is_open() {
        let source = "node A { rate_up = 1; rate_down = 0; logic = A && A; }";
        let nodes = parse_network(source, "net.bnd").unwrap();
        assert!(nodes[0].attribute("logic").is_some());
    }

    #[test]
    fn duplicate_node_name_is_rejected() {
        let source = "node A { rate_up = 1; } node A { rate_down = 0; }";
        let err = parse_network(source, "net.bnd").unwrap_err();
        assert!(matches!(err, CompileError::DuplicateNode(name) if name == "A"));
    }

    #[test]
    fn unbalanced_block_is_a_syntax_error() {
        let source = "node A { rate_up = 1;";
        let err = parse_network(source, "net.bnd").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
    }

    #[test]
    fn unknown_token_is_a_syntax_error() {
        let err = parse_config("const max_time = 5 @;", "sim.cfg").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
    }

    #[test]
    fn config_statement_kinds() {
        let source = r#"
            const max_time = 5;
            var k = 2 * 3;
            A.istate = 1;
        "#;
        let declarations = parse_config(source, "sim.cfg").unwrap();
        assert_eq!(declarations.len(), 3);
        assert!(matches!(
            &declarations[0],
            Declaration::Constant { name, .. } if name == "max_time"
        ));
        assert!(matches!(
            &declarations[1],
            Declaration::Var { name, .. } if name == "k"
        ));
        assert!(matches!(
            &declarations[2],
            Declaration::Attr { node, attr, .. } if node == "A" && attr == "istate"
        ));
    }

    #[test]
    fn product_binds_tighter_than_sum() {
        let declarations = parse_config("var x = 1 + 2 * 3;", "sim.cfg").unwrap();
        let Declaration::Var { expr, .. } = &declarations[0] else {
            panic!("not a var");
        };
        assert_eq!(expr.evaluate(&Env::new()), Ok(Value::Int(7)));
        assert_eq!(expr.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn comparison_binds_tighter_than_logic() {
        let declarations = parse_config("var x = 1 < 2 && 3 > 2;", "sim.cfg").unwrap();
        let Declaration::Var { expr, .. } = &declarations[0] else {
            panic!("not a var");
        };
        assert_eq!(expr.evaluate(&Env::new()), Ok(Value::Int(1)));
    }

    #[test]
    fn conditional_nests_to_the_right() {
        let declarations = parse_config("var x = 0 ? 1 : 0 ? 2 : 3;", "sim.cfg").unwrap();
        let Declaration::Var { expr, .. } = &declarations[0] else {
            panic!("not a var");
        };
        assert_eq!(expr.evaluate(&Env::new()), Ok(Value::Int(3)));
    }

    #[test]
    fn unary_operators_stack() {
        let declarations = parse_config("var x = !-1;", "sim.cfg").unwrap();
        let Declaration::Var { expr, .. } = &declarations[0] else {
            panic!("not a var");
        };
        assert_eq!(expr.evaluate(&Env::new()), Ok(Value::Int(0)));
    }

    #[test]
    fn booleans_are_numeric() {
        let declarations = parse_config("var x = true + true;", "sim.cfg").unwrap();
        let Declaration::Var { expr, .. } = &declarations[0] else {
            panic!("not a var");
        };
        assert_eq!(expr.evaluate(&Env::new()), Ok(Value::Int(2)));
    }

    #[test]
    fn keywords_do_not_swallow_identifiers() {
        // a node name starting with a keyword prefix parses as an identifier
        let declarations = parse_config("constant.istate = 0;", "sim.cfg").unwrap();
        assert!(matches!(
            &declarations[0],
            Declaration::Attr { node, .. } if node == "constant"
        ));
    }

    #[test]
    fn scientific_notation_parses_as_float() {
        let declarations = parse_config("const max_time = 1e3;", "sim.cfg").unwrap();
        let Declaration::Constant { expr, .. } = &declarations[0] else {
            panic!("not a const");
        };
        assert_eq!(expr.evaluate(&Env::new()), Ok(Value::Float(1000.0)));
    }
}
