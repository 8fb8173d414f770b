//! Abstract syntax shared by the two input documents.
//!
//! Expressions carry two interpretations: [`Expr::evaluate`] folds an
//! expression to a constant, [`Expr::emit`] lowers it to kernel source text.
//! Adding a variant without defining both does not compile.

use std::collections::HashMap;
use std::fmt::Display;

use crate::error::EvalError;

/// A constant value produced by folding an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Integer constant
    Int(i64),
    /// Floating-point constant
    Float(f64),
}

impl Value {
    /// Nonzero means true.
    pub fn truthy(self) -> bool {
        match self {
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0,
        }
    }

    /// The value as a float.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }

    /// The value truncated to an integer.
    pub fn as_i64(self) -> i64 {
        match self {
            Value::Int(i) => i,
            Value::Float(f) => f as i64,
        }
    }

    fn from_bool(b: bool) -> Self {
        Value::Int(b as i64)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            // {:?} keeps the decimal point on round floats
            Value::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// Constant environment for folding.
pub type Env = HashMap<String, Value>;

/// Unary operator.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}

/// Binary operator.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn apply(self, left: Value, right: Value) -> Result<Value, EvalError> {
        use Value::{Float, Int};
        Ok(match self {
            BinaryOp::Or => Value::from_bool(left.truthy() || right.truthy()),
            BinaryOp::And => Value::from_bool(left.truthy() && right.truthy()),
            BinaryOp::Eq => Value::from_bool(left.as_f64() == right.as_f64()),
            BinaryOp::Ne => Value::from_bool(left.as_f64() != right.as_f64()),
            BinaryOp::Lt => Value::from_bool(left.as_f64() < right.as_f64()),
            BinaryOp::Le => Value::from_bool(left.as_f64() <= right.as_f64()),
            BinaryOp::Gt => Value::from_bool(left.as_f64() > right.as_f64()),
            BinaryOp::Ge => Value::from_bool(left.as_f64() >= right.as_f64()),
            BinaryOp::Add => match (left, right) {
                (Int(a), Int(b)) => Int(a + b),
                (a, b) => Float(a.as_f64() + b.as_f64()),
            },
            BinaryOp::Sub => match (left, right) {
                (Int(a), Int(b)) => Int(a - b),
                (a, b) => Float(a.as_f64() - b.as_f64()),
            },
            BinaryOp::Mul => match (left, right) {
                (Int(a), Int(b)) => Int(a * b),
                (a, b) => Float(a.as_f64() * b.as_f64()),
            },
            BinaryOp::Div => {
                if right.as_f64() == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Float(left.as_f64() / right.as_f64())
            }
        })
    }
}

/// An expression of the shared sub-language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(Value),
    /// Reference to a node or a configuration variable; which one is decided
    /// at resolution, not in the grammar
    Ident(String),
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `condition ? then : otherwise`
    Conditional {
        /// Condition
        condition: Box<Expr>,
        /// Value when the condition is truthy
        then: Box<Expr>,
        /// Value otherwise
        otherwise: Box<Expr>,
    },
}

impl Expr {
    /// Folds the expression to a constant.
    ///
    /// Every free identifier must resolve within `env`; an unresolved one is
    /// an error, never a silent default.
    pub fn evaluate(&self, env: &Env) -> Result<Value, EvalError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Ident(name) => env
                .get(name)
                .copied()
                .ok_or_else(|| EvalError::Unresolved(name.clone())),
            Expr::Unary { op, operand } => {
                let value = operand.evaluate(env)?;
                Ok(match op {
                    UnaryOp::Not => Value::from_bool(!value.truthy()),
                    UnaryOp::Neg => match value {
                        Value::Int(i) => Value::Int(-i),
                        Value::Float(f) => Value::Float(-f),
                    },
                })
            }
            Expr::Binary { op, left, right } => {
                op.apply(left.evaluate(env)?, right.evaluate(env)?)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if condition.evaluate(env)?.truthy() {
                    then.evaluate(env)
                } else {
                    otherwise.evaluate(env)
                }
            }
        }
    }

    /// Lowers the expression to kernel source text.
    ///
    /// An identifier naming a node renders as that node's state slot; node
    /// names win over configuration variables. Otherwise a variable from
    /// `vars` is substituted by its folded value, not by name. Anything else
    /// is unresolved. Sub-expressions are parenthesized so precedence
    /// survives textual substitution.
    pub fn emit(&self, vars: &Env, nodes: &[Node]) -> Result<String, EvalError> {
        match self {
            Expr::Number(value) => Ok(value.to_string()),
            Expr::Ident(name) => {
                if let Some(index) = nodes.iter().position(|node| &node.name == name) {
                    Ok(Node::state_access(index))
                } else if let Some(value) = vars.get(name) {
                    Ok(value.to_string())
                } else {
                    Err(EvalError::Unresolved(name.clone()))
                }
            }
            Expr::Unary { op, operand } => {
                Ok(format!("{}({})", op.symbol(), operand.emit(vars, nodes)?))
            }
            Expr::Binary { op, left, right } => Ok(format!(
                "({} {} {})",
                left.emit(vars, nodes)?,
                op.symbol(),
                right.emit(vars, nodes)?
            )),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => Ok(format!(
                "({} ? {} : {})",
                condition.emit(vars, nodes)?,
                then.emit(vars, nodes)?,
                otherwise.emit(vars, nodes)?
            )),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Unary { op, operand } => write!(f, "{}({})", op.symbol(), operand),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", condition, then, otherwise),
        }
    }
}

/// One entity of the network. Its position in the parsed sequence is its
/// state slot index; the parser guarantees names are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node name
    pub name: String,
    /// Named attribute expressions, in source order
    pub attributes: Vec<(String, Expr)>,
}

impl Node {
    /// Looks up an attribute expression by name.
    pub fn attribute(&self, name: &str) -> Option<&Expr> {
        self.attributes
            .iter()
            .find_map(|(attr, expr)| (attr == name).then_some(expr))
    }

    /// The generated access to a node's state slot.
    pub fn state_access(index: usize) -> String {
        format!("state.is_set({})", index)
    }
}

/// One statement of the configuration document.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// A named simulation constant: `const name = expr;`
    Constant {
        /// Constant name
        name: String,
        /// Defining expression
        expr: Expr,
    },
    /// A value substituted into rate expressions: `var name = expr;`
    Var {
        /// Variable name
        name: String,
        /// Defining expression
        expr: Expr,
    },
    /// A property attached to a network node: `node.attr = expr;`
    Attr {
        /// Target node name
        node: String,
        /// Attribute key
        attr: String,
        /// Assigned expression
        expr: Expr,
    },
}

impl Display for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Declaration::Constant { name, expr } => write!(f, "const {} = {};", name, expr),
            Declaration::Var { name, expr } => write!(f, "var {} = {};", name, expr),
            Declaration::Attr { node, attr, expr } => {
                write!(f, "{}.{} = {};", node, attr, expr)
            }
        }
    }
}
