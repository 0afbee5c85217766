/// Predicate Builder Module
///
/// This module accumulates comparison terms plus an ordering/limit spec
/// and renders them into a parameterized SQL fragment. Comparison values
/// are always emitted as bound parameters; only validated identifiers
/// ever reach the SQL text. Terms join left-to-right with no implicit
/// precedence grouping, matching naive SQL concatenation. Callers who
/// need explicit grouping use the raw-fragment escape hatch, which
/// disables structured rendering entirely.
use crate::core::Result;
use crate::value::{validate_identifier, StorageValue};

/// Comparison operator between a column and a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// `LIKE` with a caller-supplied pattern
    Like,
    /// `LIKE` with the bound value wrapped in `%…%` at bind time
    Contains,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Like | CompareOp::Contains => "LIKE",
        }
    }
}

/// Sort direction for the ordering spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    fn keyword(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    And,
    Or,
}

impl Joiner {
    fn keyword(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }
}

#[derive(Debug, Clone)]
struct Term {
    column: String,
    op: CompareOp,
    value: StorageValue,
    // Joins this term to the one before it; ignored on the first term
    joiner: Joiner,
}

/// A structured, composable filter/ordering/limit specification.
///
/// An empty predicate matches all rows. Setting a raw fragment via
/// [`Predicate::raw`] makes `render` return that fragment verbatim with
/// no bound parameters, ignoring every term, ordering, and limit set
/// through the fluent methods. The two styles are mutually exclusive by
/// design; the raw fragment is the escape hatch for precedence grouping
/// the structured builder does not express.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    terms: Vec<Term>,
    order: Option<(String, OrderDirection)>,
    limit: u32,
    raw: Option<String>,
}

/// A rendered predicate: SQL fragment plus bound values in placeholder
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<StorageValue>,
}

impl Predicate {
    /// Creates an empty predicate, matching all rows.
    #[must_use]
    pub fn new() -> Self {
        Predicate::default()
    }

    /// Appends a term joined with `AND` to the preceding term.
    #[must_use]
    pub fn and_where(mut self, column: &str, value: impl Into<StorageValue>, op: CompareOp) -> Self {
        self.terms.push(Term {
            column: column.to_string(),
            op,
            value: value.into(),
            joiner: Joiner::And,
        });
        self
    }

    /// Appends a term joined with `OR` to the preceding term.
    #[must_use]
    pub fn or_where(mut self, column: &str, value: impl Into<StorageValue>, op: CompareOp) -> Self {
        self.terms.push(Term {
            column: column.to_string(),
            op,
            value: value.into(),
            joiner: Joiner::Or,
        });
        self
    }

    /// Sets the ordering column and direction. Last call wins.
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    /// Caps the number of returned rows. 0 (the default) means unlimited.
    #[must_use]
    pub fn limit(mut self, count: u32) -> Self {
        self.limit = count;
        self
    }

    /// Sets a raw SQL fragment that replaces structured rendering
    /// entirely. The fragment is returned verbatim by `render`, with no
    /// bound parameters; the caller owns its safety.
    #[must_use]
    pub fn raw(mut self, fragment: &str) -> Self {
        self.raw = Some(fragment.to_string());
        self
    }

    /// Whether no terms and no raw fragment were supplied.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.raw.is_none()
    }

    /// Renders the WHERE portion only, for statements where SQLite does
    /// not accept ORDER BY/LIMIT (UPDATE, DELETE, aggregates).
    pub fn render_where(&self) -> Result<Rendered> {
        if let Some(raw) = &self.raw {
            return Ok(Rendered {
                sql: raw.clone(),
                params: Vec::new(),
            });
        }

        let mut sql = String::new();
        let mut params = Vec::new();
        for (i, term) in self.terms.iter().enumerate() {
            validate_identifier("column name", &term.column)?;
            if i == 0 {
                sql.push_str("WHERE ");
            } else {
                sql.push(' ');
                sql.push_str(term.joiner.keyword());
                sql.push(' ');
            }
            sql.push_str(&term.column);
            sql.push(' ');
            sql.push_str(term.op.symbol());
            sql.push_str(" ?");

            // Contains builds its pattern at bind time, never by
            // concatenating into the column reference
            match term.op {
                CompareOp::Contains => {
                    params.push(StorageValue::Text(format!("%{}%", term.value.text_form()?)));
                }
                _ => params.push(term.value.clone()),
            }
        }
        Ok(Rendered { sql, params })
    }

    /// Renders the full WHERE/ORDER BY/LIMIT fragment.
    pub fn render(&self) -> Result<Rendered> {
        if let Some(raw) = &self.raw {
            return Ok(Rendered {
                sql: raw.clone(),
                params: Vec::new(),
            });
        }

        let Rendered { mut sql, params } = self.render_where()?;

        if let Some((column, direction)) = &self.order {
            validate_identifier("column name", column)?;
            if !sql.is_empty() {
                sql.push(' ');
            }
            sql.push_str("ORDER BY ");
            sql.push_str(column);
            sql.push(' ');
            sql.push_str(direction.keyword());
        }

        if self.limit > 0 {
            if !sql.is_empty() {
                sql.push(' ');
            }
            sql.push_str(&format!("LIMIT {}", self.limit));
        }

        Ok(Rendered { sql, params })
    }
}
