//! Renders expression trees as store query text.

use common::{AppError, AppResult};
use serde_json::Value;

use crate::query::builder::{DocumentQuery, OrderBy};
use crate::query::expr::{BinaryOp, Expr, Filter, LogicalOp};
use crate::store::{QueryParameter, QuerySpec};

/// Alias of the queried document in generated queries.
pub const QUERY_ALIAS: &str = "c";

/// Compiles query plans into `(query text, parameters)`.
///
/// Output is deterministic for a given tree: parameters are numbered in
/// visiting order (left operand before right).
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    default_page_size: u32,
}

impl QueryCompiler {
    pub fn new(default_page_size: u32) -> Self {
        Self { default_page_size }
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    /// Full compilation with ordering and `OFFSET`/`LIMIT` paging.
    ///
    /// A missing skip is rendered as `OFFSET 0`; a missing take falls back to
    /// the default page size.
    pub fn compile(&self, query: &DocumentQuery) -> AppResult<QuerySpec> {
        let mut visitor = Visitor::default();
        let mut text = format!("SELECT * FROM {}", QUERY_ALIAS);

        if let Some(filter) = query.filter_ref() {
            text.push_str(" WHERE ");
            text.push_str(&visitor.visit(filter.expr())?);
        }

        if let Some(order) = query.order() {
            text.push_str(&render_order(order)?);
        }

        let offset = query.skip_count().unwrap_or(0);
        let limit = query.take_count().unwrap_or(self.default_page_size);
        text.push_str(&format!(" OFFSET {} LIMIT {}", offset, limit));

        Ok(visitor.finish(text))
    }

    /// Filter-only compilation; paging is left to the store's continuation
    /// mechanism.
    pub fn compile_filter(&self, filter: Option<&Filter>) -> AppResult<QuerySpec> {
        self.compile_projection("*", filter)
    }

    /// `SELECT VALUE COUNT(1)` over the filter.
    pub fn compile_count(&self, filter: Option<&Filter>) -> AppResult<QuerySpec> {
        self.compile_projection("VALUE COUNT(1)", filter)
    }

    fn compile_projection(&self, projection: &str, filter: Option<&Filter>) -> AppResult<QuerySpec> {
        let mut visitor = Visitor::default();
        let mut text = format!("SELECT {} FROM {}", projection, QUERY_ALIAS);

        if let Some(filter) = filter {
            text.push_str(" WHERE ");
            text.push_str(&visitor.visit(filter.expr())?);
        }

        Ok(visitor.finish(text))
    }
}

fn render_order(order: &OrderBy) -> AppResult<String> {
    Ok(format!(
        " ORDER BY {} {}",
        render_field(&order.field)?,
        order.direction.keyword()
    ))
}

#[derive(Default)]
struct Visitor {
    parameters: Vec<QueryParameter>,
}

impl Visitor {
    fn finish(self, query: String) -> QuerySpec {
        QuerySpec {
            query,
            parameters: self.parameters,
        }
    }

    fn bind(&mut self, value: &Value) -> String {
        let name = format!("@param{}", self.parameters.len());
        self.parameters.push(QueryParameter::new(name.clone(), value.clone()));
        name
    }

    fn visit(&mut self, expr: &Expr) -> AppResult<String> {
        match expr {
            Expr::Field(name) => render_field(name),
            Expr::Literal(value) => Ok(self.bind(value)),
            Expr::Binary { op, left, right } => self.visit_binary(*op, left, right),
            Expr::Logical { op, left, right } => self.visit_logical(*op, left, right),
            Expr::Not(inner) => {
                let rendered = self.visit(inner)?;
                if matches!(**inner, Expr::Logical { .. }) {
                    Ok(format!("NOT {}", rendered))
                } else {
                    Ok(format!("NOT ({})", rendered))
                }
            }
            Expr::Call {
                method,
                target,
                args,
            } => self.visit_call(method, target, args),
        }
    }

    fn visit_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> AppResult<String> {
        if !op.is_comparison() {
            return Err(AppError::compilation(format!(
                "binary operator '{}' is not supported",
                op.symbol()
            )));
        }

        let left = self.visit_operand(left)?;
        let right = self.visit_operand(right)?;
        Ok(format!("{} {} {}", left, op.symbol(), right))
    }

    // Nested comparisons need explicit grouping to keep their meaning.
    fn visit_operand(&mut self, expr: &Expr) -> AppResult<String> {
        let rendered = self.visit(expr)?;
        match expr {
            Expr::Binary { .. } | Expr::Not(_) => Ok(format!("({})", rendered)),
            _ => Ok(rendered),
        }
    }

    fn visit_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> AppResult<String> {
        let left = self.visit(left)?;
        let right = self.visit(right)?;
        Ok(format!("({} {} {})", left, op.keyword(), right))
    }

    fn visit_call(&mut self, method: &str, target: &Expr, args: &[Expr]) -> AppResult<String> {
        let function = match method {
            "Contains" => "CONTAINS",
            "StartsWith" => "STARTSWITH",
            "EndsWith" => "ENDSWITH",
            other => {
                return Err(AppError::compilation(format!(
                    "method '{}' is not supported",
                    other
                )))
            }
        };

        let [argument] = args else {
            return Err(AppError::compilation(format!(
                "method '{}' expects exactly one argument, got {}",
                method,
                args.len()
            )));
        };

        let target = self.visit(target)?;
        let argument = self.visit(argument)?;
        Ok(format!("{}({}, {})", function, target, argument))
    }
}

fn render_field(name: &str) -> AppResult<String> {
    let mut rendered = String::from(QUERY_ALIAS);

    for segment in name.split('.') {
        let valid = !segment.is_empty()
            && segment.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            && !segment.starts_with(|ch: char| ch.is_ascii_digit());
        if !valid {
            return Err(AppError::compilation(format!(
                "field reference '{}' is not a valid property path",
                name
            )));
        }
        rendered.push('.');
        rendered.push_str(&to_camel_case(segment));
    }

    Ok(rendered)
}

/// Convert an in-language property name to the stored camelCase spelling.
///
/// A leading run of capitals is lowered as a unit, keeping the capital that
/// starts the next word: `UserId` -> `userId`, `IDValue` -> `idValue`,
/// `ID` -> `id`.
pub fn to_camel_case(name: &str) -> String {
    let mut chars: Vec<char> = name.chars().collect();

    for i in 0..chars.len() {
        if !chars[i].is_uppercase() {
            break;
        }
        let next_is_lower = chars.get(i + 1).is_some_and(|next| !next.is_uppercase());
        if i > 0 && next_is_lower {
            break;
        }
        chars[i] = chars[i].to_ascii_lowercase();
    }

    chars.into_iter().collect()
}
