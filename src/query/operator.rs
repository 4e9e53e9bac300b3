//! Condition operators and loosely-typed operands

use std::fmt;

/// Operator of a field condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Int family
    Equals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    // Float family
    FloatEquals,
    FloatGreaterThan,
    FloatGreaterThanOrEqual,
    FloatLessThan,
    FloatLessThanOrEqual,
    // String family
    SameAs,
    Contains,
    StartsWith,
    EndsWith,
    In,
    Matches,
    // Bool
    Is,
    // Any
    Exists,
}

/// Type family an operator compares in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    Int,
    Float,
    String,
    StringSlice,
    Regex,
    Bool,
    Any,
}

impl Operator {
    /// All operators, in declaration order
    pub const ALL: [Operator; 18] = [
        Operator::Equals,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::FloatEquals,
        Operator::FloatGreaterThan,
        Operator::FloatGreaterThanOrEqual,
        Operator::FloatLessThan,
        Operator::FloatLessThanOrEqual,
        Operator::SameAs,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::In,
        Operator::Matches,
        Operator::Is,
        Operator::Exists,
    ];

    /// Look up an operator by its textual name or alias
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "==" => Operator::Equals,
            ">" => Operator::GreaterThan,
            ">=" => Operator::GreaterThanOrEqual,
            "<" => Operator::LessThan,
            "<=" => Operator::LessThanOrEqual,
            "f==" => Operator::FloatEquals,
            "f>" => Operator::FloatGreaterThan,
            "f>=" => Operator::FloatGreaterThanOrEqual,
            "f<" => Operator::FloatLessThan,
            "f<=" => Operator::FloatLessThanOrEqual,
            "sameas" | "s==" => Operator::SameAs,
            "contains" | "co" => Operator::Contains,
            "startswith" | "sw" => Operator::StartsWith,
            "endswith" | "ew" => Operator::EndsWith,
            "in" => Operator::In,
            "matches" | "re" => Operator::Matches,
            "is" => Operator::Is,
            "exists" | "ex" => Operator::Exists,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical textual name
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::FloatEquals => "f==",
            Operator::FloatGreaterThan => "f>",
            Operator::FloatGreaterThanOrEqual => "f>=",
            Operator::FloatLessThan => "f<",
            Operator::FloatLessThanOrEqual => "f<=",
            Operator::SameAs => "sameas",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
            Operator::In => "in",
            Operator::Matches => "matches",
            Operator::Is => "is",
            Operator::Exists => "exists",
        }
    }

    /// Operand family of this operator
    pub fn family(&self) -> OperatorFamily {
        match self {
            Operator::Equals
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual
            | Operator::LessThan
            | Operator::LessThanOrEqual => OperatorFamily::Int,
            Operator::FloatEquals
            | Operator::FloatGreaterThan
            | Operator::FloatGreaterThanOrEqual
            | Operator::FloatLessThan
            | Operator::FloatLessThanOrEqual => OperatorFamily::Float,
            Operator::SameAs | Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                OperatorFamily::String
            }
            Operator::In => OperatorFamily::StringSlice,
            Operator::Matches => OperatorFamily::Regex,
            Operator::Is => OperatorFamily::Bool,
            Operator::Exists => OperatorFamily::Any,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Loosely-typed operand, normalized per operator family at construction
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<String>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => write!(f, "<none>"),
            Operand::Int(v) => write!(f, "{}", v),
            Operand::Uint(v) => write!(f, "{}", v),
            Operand::Float(v) => write!(f, "{}", v),
            Operand::Str(v) => write!(f, "{}", v),
            Operand::Bool(v) => write!(f, "{}", v),
            Operand::List(v) => write!(f, "{}", v.join(",")),
        }
    }
}

macro_rules! operand_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::$variant(v as $target)
                }
            }
        )*
    };
}

operand_from!(Int as i64: i8, i16, i32, i64, isize);
operand_from!(Uint as u64: u8, u16, u32, u64, usize);
operand_from!(Float as f64: f32, f64);

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Bool(v)
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Str(v.to_string())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Str(v)
    }
}

impl From<Vec<String>> for Operand {
    fn from(v: Vec<String>) -> Self {
        Operand::List(v)
    }
}

impl From<Vec<&str>> for Operand {
    fn from(v: Vec<&str>) -> Self {
        Operand::List(v.into_iter().map(str::to_string).collect())
    }
}

impl From<()> for Operand {
    fn from(_: ()) -> Self {
        Operand::None
    }
}
