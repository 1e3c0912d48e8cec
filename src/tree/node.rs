use serde::{Deserialize, Serialize};

/// Epsilon guard used by the protected operators.
pub const DOMAIN_EPS: f32 = 1e-9;

/// Function set available to generated programs.
///
/// Serialized names match the config-file spelling (`"+"`, `"sin"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Func {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "pow")]
    Pow,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "sin")]
    Sin,
    #[serde(rename = "cos")]
    Cos,
    #[serde(rename = "tan")]
    Tan,
    #[serde(rename = "sinh")]
    Sinh,
    #[serde(rename = "cosh")]
    Cosh,
    #[serde(rename = "tanh")]
    Tanh,
    #[serde(rename = "exp")]
    Exp,
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "inv")]
    Inv,
    #[serde(rename = "neg")]
    Neg,
    #[serde(rename = "abs")]
    Abs,
    #[serde(rename = "sqrt")]
    Sqrt,
    #[serde(rename = "if")]
    If,
}

impl Func {
    pub const ALL: [Func; 20] = [
        Func::Add,
        Func::Sub,
        Func::Mul,
        Func::Div,
        Func::Pow,
        Func::Max,
        Func::Min,
        Func::Sin,
        Func::Cos,
        Func::Tan,
        Func::Sinh,
        Func::Cosh,
        Func::Tanh,
        Func::Exp,
        Func::Log,
        Func::Inv,
        Func::Neg,
        Func::Abs,
        Func::Sqrt,
        Func::If,
    ];

    pub fn arity(self) -> usize {
        match self {
            Func::Add | Func::Sub | Func::Mul | Func::Div | Func::Pow | Func::Max | Func::Min => 2,
            Func::Sin
            | Func::Cos
            | Func::Tan
            | Func::Sinh
            | Func::Cosh
            | Func::Tanh
            | Func::Exp
            | Func::Log
            | Func::Inv
            | Func::Neg
            | Func::Abs
            | Func::Sqrt => 1,
            Func::If => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Add => "+",
            Func::Sub => "-",
            Func::Mul => "*",
            Func::Div => "/",
            Func::Pow => "pow",
            Func::Max => "max",
            Func::Min => "min",
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Inv => "inv",
            Func::Neg => "neg",
            Func::Abs => "abs",
            Func::Sqrt => "sqrt",
            Func::If => "if",
        }
    }

    pub fn from_name(name: &str) -> Option<Func> {
        Func::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Apply the function with protected semantics: domain violations return
    /// a defined sentinel instead of NaN/panic, so batched evaluation of an
    /// entire population stays total.
    ///
    /// `args` are in child order and must have length `self.arity()`.
    pub fn apply(self, args: &[f32]) -> f32 {
        debug_assert_eq!(args.len(), self.arity());
        match self {
            Func::Add => args[0] + args[1],
            Func::Sub => args[0] - args[1],
            Func::Mul => args[0] * args[1],
            // Protected division: a near-zero denominator yields the numerator
            Func::Div => {
                if args[1].abs() < DOMAIN_EPS {
                    args[0]
                } else {
                    args[0] / args[1]
                }
            }
            Func::Pow => {
                let r = args[0].abs().powf(args[1]);
                if r.is_finite() {
                    r
                } else {
                    0.0
                }
            }
            Func::Max => args[0].max(args[1]),
            Func::Min => args[0].min(args[1]),
            Func::Sin => args[0].sin(),
            Func::Cos => args[0].cos(),
            Func::Tan => args[0].tan(),
            Func::Sinh => args[0].sinh(),
            Func::Cosh => args[0].cosh(),
            Func::Tanh => args[0].tanh(),
            Func::Exp => args[0].exp(),
            Func::Log => {
                if args[0].abs() < DOMAIN_EPS {
                    0.0
                } else {
                    args[0].abs().ln()
                }
            }
            Func::Inv => {
                if args[0].abs() < DOMAIN_EPS {
                    0.0
                } else {
                    1.0 / args[0]
                }
            }
            Func::Neg => -args[0],
            Func::Abs => args[0].abs(),
            Func::Sqrt => args[0].abs().sqrt(),
            Func::If => {
                if args[0] > 0.0 {
                    args[1]
                } else {
                    args[2]
                }
            }
        }
    }
}

/// A single tree node. Trees store nodes in prefix (pre-order) sequence with
/// a parallel subtree-size array; `Out(slot)` routes its single operand's
/// value to an output slot and passes the value through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node {
    Func(Func),
    Var(u16),
    Const(f32),
    Out(u16),
}

impl Node {
    /// Number of immediate children this node consumes in the prefix encoding.
    pub fn arity(self) -> usize {
        match self {
            Node::Func(f) => f.arity(),
            Node::Out(_) => 1,
            Node::Var(_) | Node::Const(_) => 0,
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, Node::Var(_) | Node::Const(_))
    }
}
