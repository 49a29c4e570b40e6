//! Predicate expression tree and its fluent builder.

use serde_json::Value;

/// Binary operator.
///
/// Arithmetic operators can be represented but the store compiler only
/// accepts comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le
        )
    }
}

/// Logical connective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Property of the queried document, dotted for nesting (`Profile.Name`)
    Field(String),
    /// Constant value supplied by the caller
    Literal(Value),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    /// Method call on a value, e.g. `Title.Contains("x")`
    Call {
        method: String,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn field(name: impl Into<String>) -> Self {
        Expr::Field(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Self {
        Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(target: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            method: method.into(),
            target: Box::new(target),
            args,
        }
    }
}

/// A predicate over documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter(Expr);

impl Filter {
    pub fn from_expr(expr: Expr) -> Self {
        Self(expr)
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }

    pub fn and(self, other: Filter) -> Filter {
        Filter(Expr::logical(LogicalOp::And, self.0, other.0))
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter(Expr::logical(LogicalOp::Or, self.0, other.0))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Filter {
        Filter(Expr::Not(Box::new(self.0)))
    }
}

/// Start a predicate on a document property.
///
/// Names use the in-language (PascalCase) spelling; the compiler converts
/// them to the stored camelCase form.
pub fn field(name: impl Into<String>) -> FieldRef {
    FieldRef(name.into())
}

/// Reference to a document property, the left side of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef(String);

impl FieldRef {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn compare(self, op: BinaryOp, value: impl Into<Value>) -> Filter {
        Filter(Expr::binary(op, Expr::Field(self.0), Expr::literal(value)))
    }

    pub fn eq(self, value: impl Into<Value>) -> Filter {
        self.compare(BinaryOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Filter {
        self.compare(BinaryOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Filter {
        self.compare(BinaryOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Filter {
        self.compare(BinaryOp::Ge, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Filter {
        self.compare(BinaryOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Filter {
        self.compare(BinaryOp::Le, value)
    }

    pub fn contains(self, value: impl Into<Value>) -> Filter {
        self.call("Contains", vec![Expr::literal(value)])
    }

    pub fn starts_with(self, value: impl Into<Value>) -> Filter {
        self.call("StartsWith", vec![Expr::literal(value)])
    }

    pub fn ends_with(self, value: impl Into<Value>) -> Filter {
        self.call("EndsWith", vec![Expr::literal(value)])
    }

    /// Arbitrary method call; the compiler decides whether it is supported.
    pub fn call(self, method: impl Into<String>, args: Vec<Expr>) -> Filter {
        Filter(Expr::call(Expr::Field(self.0), method, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_tree() {
        let filter = field("Age").ge(18).and(field("Name").starts_with("A"));

        let expected = Expr::logical(
            LogicalOp::And,
            Expr::binary(BinaryOp::Ge, Expr::field("Age"), Expr::literal(18)),
            Expr::call(Expr::field("Name"), "StartsWith", vec![Expr::literal("A")]),
        );
        assert_eq!(filter.into_expr(), expected);
    }

    #[test]
    fn test_not_wraps_expression() {
        let filter = field("Done").eq(true).not();
        assert!(matches!(filter.expr(), Expr::Not(_)));
    }

    #[test]
    fn test_comparison_classification() {
        assert!(BinaryOp::Le.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
    }
}
