//! Turns a [`DrinkFilter`] into a single bounded `SELECT`.
//!
//! A filter is a conjunction of [`DrinkPredicate`]s plus a [`Page`]. The raw
//! `{id, name}` request fields are converted into predicates once, by
//! [`DrinkFilter::from_fields`]; nothing downstream parses strings.

use std::collections::BTreeSet;

use postgres::types::ToSql;
use serde::{Deserialize, Serialize};

use infra::ids::Id;

use super::assembly::{DRINK_COLUMNS, DRINK_JOINS};
use super::models::Drink;

pub const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrinkPredicate {
    ExactId(Id<Drink>),
    ExactName(String),
    NameIn(BTreeSet<String>),
}

/// `limit <= 0` means unbounded, `skip <= 0` means from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Page {
    pub limit: i64,
    pub skip: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrinkFilter {
    predicates: Vec<DrinkPredicate>,
    page: Page,
}

/// Filter fields as they arrive in a request body.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterFields {
    #[serde(default)]
    pub id: Option<Id<Drink>>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Param {
    Id(i32),
    Name(String),
    Names(Vec<String>),
    Count(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub(crate) sql: String,
    pub(crate) params: Vec<Param>,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: DEFAULT_LIMIT,
            skip: 0,
        }
    }
}

impl Page {
    pub fn new(limit: Option<i64>, skip: Option<i64>) -> Self {
        let default = Page::default();
        Page {
            limit: limit.unwrap_or(default.limit),
            skip: skip.unwrap_or(default.skip),
        }
    }

    fn limit(&self) -> Option<i64> {
        Some(self.limit).filter(|n| *n > 0)
    }

    fn offset(&self) -> Option<i64> {
        Some(self.skip).filter(|n| *n > 0)
    }
}

impl DrinkPredicate {
    /// A name field holding one token is an equality test; a comma
    /// separated list is a membership test. Tokens are kept verbatim.
    pub fn from_names(names: &str) -> Self {
        let tokens = names.split(',').collect::<Vec<_>>();
        if tokens.len() == 1 {
            DrinkPredicate::ExactName(names.to_string())
        } else {
            DrinkPredicate::NameIn(tokens.into_iter().map(String::from).collect())
        }
    }

    fn render(&self, params: &mut Vec<Param>) -> String {
        match self {
            DrinkPredicate::ExactId(id) => {
                params.push(Param::Id(id.raw()));
                format!("d.id = ${}", params.len())
            }
            DrinkPredicate::ExactName(name) => {
                params.push(Param::Name(name.clone()));
                format!("d.name = ${}", params.len())
            }
            DrinkPredicate::NameIn(names) => {
                params.push(Param::Names(names.iter().cloned().collect()));
                format!("d.name = ANY(${})", params.len())
            }
        }
    }
}

impl DrinkFilter {
    /// Every drink, first page.
    pub fn all() -> Self {
        DrinkFilter::default()
    }

    pub fn from_fields(fields: &FilterFields, page: Page) -> Self {
        let mut filter = DrinkFilter::all().with_page(page);
        if let Some(id) = fields.id {
            filter = filter.and(DrinkPredicate::ExactId(id));
        }
        if let Some(name) = fields.name.as_ref() {
            filter = filter.and(DrinkPredicate::from_names(name));
        }
        filter
    }

    pub fn and(mut self, predicate: DrinkPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn predicates(&self) -> &[DrinkPredicate] {
        &self.predicates
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub(crate) fn to_statement(&self) -> Statement {
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} {}", DRINK_COLUMNS, DRINK_JOINS);

        let clauses = self
            .predicates
            .iter()
            .map(|p| p.render(&mut params))
            .collect::<Vec<_>>();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(" GROUP BY d.id ORDER BY d.name COLLATE \"C\", d.id");

        if let Some(limit) = self.page.limit() {
            params.push(Param::Count(limit));
            sql.push_str(&format!(" LIMIT ${}", params.len()));
        }
        if let Some(offset) = self.page.offset() {
            params.push(Param::Count(offset));
            sql.push_str(&format!(" OFFSET ${}", params.len()));
        }

        Statement { sql, params }
    }
}

impl Param {
    fn as_sql(&self) -> &dyn ToSql {
        match self {
            Param::Id(id) => id,
            Param::Name(name) => name,
            Param::Names(names) => names,
            Param::Count(n) => n,
        }
    }
}

impl Statement {
    pub(crate) fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(Param::as_sql).collect()
    }
}
