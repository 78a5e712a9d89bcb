// src/common/query.rs
//
// Everything a caller can put into a list/search query string ends up here
// before it gets anywhere near SQL. Column names and sort directions are only
// accepted from the allow-lists below, and only the `&'static str` fragments
// they map to are ever pushed into a query.

use std::fmt;

use crate::common::error::AppError;

pub const DEFAULT_LIMIT: i64 = 10;

// ---
// Pagination
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub page: i64,
}

impl PageRequest {
    /// `limit <= 0` falls back to 10 and `page` is clamped to at least 1,
    /// so the offset can never go negative.
    pub fn new(limit: Option<i64>, page: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l,
            _ => DEFAULT_LIMIT,
        };
        let page = page.unwrap_or(1).max(1);
        Self { limit, page }
    }

    pub fn offset(&self) -> i64 {
        self.limit.saturating_mul(self.page - 1)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ---
// Columns
// ---

/// A closed set of columns for one table.
pub trait ColumnSet: Sized + Copy + Eq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    /// Name accepted from the query string.
    fn name(self) -> &'static str;

    /// SQL expression used in ORDER BY.
    fn sort_expr(self) -> &'static str;

    /// SQL expression compared with ILIKE, `None` when the column is not searchable.
    fn search_expr(self) -> Option<&'static str>;

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.iter().copied().find(|c| c.name().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

// ---
// ORDER BY
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy<C: ColumnSet> {
    pub column: C,
    pub direction: Direction,
}

impl<C: ColumnSet> OrderBy<C> {
    pub fn new(column: C, direction: Direction) -> Self {
        Self { column, direction }
    }

    /// Parses `<column> [asc|desc]`. Empty or missing input yields `default`.
    pub fn parse(raw: Option<&str>, default: Self) -> Result<Self, AppError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(default),
            Some(r) => r,
        };

        let mut parts = raw.split_whitespace();
        let column_name = parts.next().unwrap_or_default();
        let column = C::parse(column_name)
            .ok_or_else(|| AppError::InvalidInput(format!("cannot order by '{column_name}'")))?;

        let direction = match parts.next() {
            None => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
            Some(d) => {
                return Err(AppError::InvalidInput(format!("unknown order direction '{d}'")));
            }
        };

        if parts.next().is_some() {
            return Err(AppError::InvalidInput(format!("malformed order clause '{raw}'")));
        }

        Ok(Self { column, direction })
    }

    pub fn sql(&self) -> String {
        format!("{} {}", self.column.sort_expr(), self.direction.sql())
    }
}

// ---
// Search
// ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter<C: ColumnSet> {
    pub column: C,
    pub term: String,
}

impl<C: ColumnSet> SearchFilter<C> {
    pub fn parse(column: Option<&str>, term: Option<&str>) -> Result<Self, AppError> {
        let name = column.map(str::trim).unwrap_or_default();
        let column = C::parse(name)
            .filter(|c| c.search_expr().is_some())
            .ok_or_else(|| AppError::InvalidInput(format!("cannot search by column '{name}'")))?;

        Ok(Self { column, term: term.unwrap_or_default().to_string() })
    }

    pub fn search_expr(&self) -> &'static str {
        // parse() only lets searchable columns through
        self.column.search_expr().unwrap_or("NULL")
    }

    /// ILIKE pattern matching the term literally anywhere in the column.
    pub fn like_pattern(&self) -> String {
        let mut escaped = String::with_capacity(self.term.len() + 2);
        escaped.push('%');
        for ch in self.term.chars() {
            if matches!(ch, '\\' | '%' | '_') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped.push('%');
        escaped
    }

    /// Case-insensitive containment, the in-process equivalent of `like_pattern`.
    pub fn matches(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.term.to_lowercase())
    }
}
