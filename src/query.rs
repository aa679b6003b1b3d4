//! Entity-scoped query builder.
//!
//! A [`Query`] names the table it selects from and carries a tree of
//! predicates. The same tree is rendered to Postgres through
//! [`sqlx::QueryBuilder`] (values are always bound, never interpolated) and
//! evaluated in memory by [`Query::matches`]; both follow SQL precedence, so
//! `a OR b AND c` means `a OR (b AND c)`.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use crate::error::{Error, Result};
use crate::models::{Album, AlbumId, Photo};

// --- Schema ---

/// The tables a query can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Photo,
    Album,
}

impl Entity {
    pub fn table(self) -> &'static str {
        match self {
            Entity::Photo => "photos",
            Entity::Album => "albums",
        }
    }
}

/// Columns that predicates and orderings may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    PhotoId,
    PhotoOwnerId,
    PhotoAlbumId,
    PhotoIsPublic,
    PhotoCreatedAt,
    AlbumId,
    AlbumOwnerId,
    AlbumIsPublic,
}

impl Column {
    pub fn entity(self) -> Entity {
        match self {
            Column::PhotoId
            | Column::PhotoOwnerId
            | Column::PhotoAlbumId
            | Column::PhotoIsPublic
            | Column::PhotoCreatedAt => Entity::Photo,
            Column::AlbumId | Column::AlbumOwnerId | Column::AlbumIsPublic => Entity::Album,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Column::PhotoId | Column::AlbumId => "id",
            Column::PhotoOwnerId | Column::AlbumOwnerId => "owner_id",
            Column::PhotoAlbumId => "album_id",
            Column::PhotoIsPublic | Column::AlbumIsPublic => "is_public",
            Column::PhotoCreatedAt => "created_at",
        }
    }

    /// `table.column`, so nested sub-queries never pick up an outer column by
    /// accident.
    pub fn qualified(self) -> String {
        format!("{}.{}", self.entity().table(), self.name())
    }
}

/// Relations a query can follow with an existence sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `photos.album_id -> albums.id`
    Album,
}

impl Link {
    pub fn source(self) -> Entity {
        match self {
            Link::Album => Entity::Photo,
        }
    }

    pub fn target(self) -> Entity {
        match self {
            Link::Album => Entity::Album,
        }
    }

    fn join_condition(self) -> &'static str {
        match self {
            Link::Album => "albums.id = photos.album_id",
        }
    }
}

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

impl Value {
    fn push_bind(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Value::Int(v) => builder.push_bind(*v),
            Value::Bool(v) => builder.push_bind(*v),
            Value::Time(v) => builder.push_bind(*v),
        };
    }
}

// --- Predicates ---

/// How a clause attaches to the clauses before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Column, Value),
    IsNull(Column),
    /// Matches nothing when the list is empty.
    In(Column, Vec<Value>),
    /// A parenthesised sub-expression.
    Group(Group),
    /// At least one related row matches the inner query.
    Has(Link, Box<Query>),
}

/// An ordered list of clauses, each joined to its predecessor by its
/// connector. The connector of the first clause is ignored. An empty group
/// matches everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    clauses: Vec<(Connector, Predicate)>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(Connector, Predicate)] {
        &self.clauses
    }
}

/// Conditions
///
/// The builder methods shared by a [`Query`] and the nested [`Group`]s
/// handed to `where_group` closures.
pub trait Conditions: Sized {
    fn push(self, connector: Connector, predicate: Predicate) -> Self;

    fn where_eq(self, column: Column, value: impl Into<Value>) -> Self {
        self.push(Connector::And, Predicate::Eq(column, value.into()))
    }

    fn or_where_eq(self, column: Column, value: impl Into<Value>) -> Self {
        self.push(Connector::Or, Predicate::Eq(column, value.into()))
    }

    fn where_null(self, column: Column) -> Self {
        self.push(Connector::And, Predicate::IsNull(column))
    }

    fn or_where_null(self, column: Column) -> Self {
        self.push(Connector::Or, Predicate::IsNull(column))
    }

    fn where_in<V: Into<Value>>(self, column: Column, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(Connector::And, Predicate::In(column, values))
    }

    /// ANDs a nested, parenthesised group built by `build`.
    fn where_group(self, build: impl FnOnce(Group) -> Group) -> Self {
        self.push(Connector::And, Predicate::Group(build(Group::new())))
    }

    fn or_where_group(self, build: impl FnOnce(Group) -> Group) -> Self {
        self.push(Connector::Or, Predicate::Group(build(Group::new())))
    }

    fn where_has(self, link: Link, related: Query) -> Self {
        self.push(Connector::And, Predicate::Has(link, Box::new(related)))
    }

    fn or_where_has(self, link: Link, related: Query) -> Self {
        self.push(Connector::Or, Predicate::Has(link, Box::new(related)))
    }
}

impl Conditions for Group {
    fn push(mut self, connector: Connector, predicate: Predicate) -> Self {
        self.clauses.push((connector, predicate));
        self
    }
}

// --- Queries ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Query
///
/// A selection from one table: its filter, ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity: Entity,
    filter: Group,
    order_by: Vec<(Column, Order)>,
    limit: Option<i64>,
}

impl Conditions for Query {
    fn push(mut self, connector: Connector, predicate: Predicate) -> Self {
        self.filter = self.filter.push(connector, predicate);
        self
    }
}

impl Query {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            filter: Group::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn photos() -> Self {
        Self::new(Entity::Photo)
    }

    pub fn albums() -> Self {
        Self::new(Entity::Album)
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn filter(&self) -> &Group {
        &self.filter
    }

    /// ANDs a nested group onto the filter as a whole.
    ///
    /// Unlike `where_group`, a top-level `OR` already on the query is
    /// parenthesised first, so `a OR b` becomes `(a OR b) AND (...)` rather
    /// than `a OR b AND (...)`.
    pub fn restrict(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        let has_top_level_or = self
            .filter
            .clauses
            .iter()
            .skip(1)
            .any(|(connector, _)| *connector == Connector::Or);
        if has_top_level_or {
            let existing = std::mem::take(&mut self.filter);
            self.filter = Group::new().push(Connector::And, Predicate::Group(existing));
        }
        self.where_group(build)
    }

    pub fn order_by(mut self, column: Column, order: Order) -> Self {
        self.order_by.push((column, order));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    /// Fails with [`Error::InvalidInput`] unless the query selects from `entity`.
    pub fn ensure_entity(&self, entity: Entity) -> Result<()> {
        if self.entity == entity {
            Ok(())
        } else {
            Err(Error::invalid_input(format!(
                "expected a query on {}, got one on {}",
                entity.table(),
                self.entity.table()
            )))
        }
    }

    /// Checks that every column and relation belongs to the table it is used
    /// against, including inside sub-queries.
    pub fn validate(&self) -> Result<()> {
        validate_group(self.entity, &self.filter)?;
        for (column, _) in &self.order_by {
            validate_column(self.entity, *column)?;
        }
        Ok(())
    }

    // --- Rendering ---

    /// Appends ` WHERE ...` (if there is any filter).
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if !self.filter.is_empty() {
            builder.push(" WHERE ");
            push_group(&self.filter, builder);
        }
    }

    /// Appends ` ORDER BY ...` and ` LIMIT ...` (if set).
    pub fn push_tail(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        for (i, (column, order)) in self.order_by.iter().enumerate() {
            builder.push(if i == 0 { " ORDER BY " } else { ", " });
            builder.push(column.qualified());
            builder.push(match order {
                Order::Asc => " ASC",
                Order::Desc => " DESC",
            });
        }
        if let Some(limit) = self.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }
    }

    /// The rendered `WHERE` clause, for logging and inspection.
    pub fn where_sql(&self) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("");
        self.push_where(&mut builder);
        builder.sql().trim_start().to_string()
    }

    // --- In-memory evaluation ---

    /// Whether `row` satisfies the filter. Rows of another table never match.
    pub fn matches(&self, row: Row<'_>, related: &dyn Related) -> bool {
        row.entity() == self.entity && group_matches(&self.filter, row, related)
    }

    /// Compares two rows by this query's ordering, with Postgres NULL
    /// placement (last when ascending, first when descending).
    pub fn compare(&self, a: Row<'_>, b: Row<'_>) -> Ordering {
        for (column, order) in &self.order_by {
            let ordering = match (a.value(*column), b.value(*column)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            };
            let ordering = match order {
                Order::Asc => ordering,
                Order::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn validate_column(entity: Entity, column: Column) -> Result<()> {
    if column.entity() == entity {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "column {} used in a query on {}",
            column.qualified(),
            entity.table()
        )))
    }
}

fn validate_group(entity: Entity, group: &Group) -> Result<()> {
    for (_, predicate) in &group.clauses {
        match predicate {
            Predicate::Eq(column, _) | Predicate::IsNull(column) | Predicate::In(column, _) => {
                validate_column(entity, *column)?
            }
            Predicate::Group(inner) => validate_group(entity, inner)?,
            Predicate::Has(link, related) => {
                if link.source() != entity || link.target() != related.entity {
                    return Err(Error::invalid_input(format!(
                        "relation {:?} cannot join {} to {}",
                        link,
                        entity.table(),
                        related.entity.table()
                    )));
                }
                related.validate()?;
            }
        }
    }
    Ok(())
}

fn push_group(group: &Group, builder: &mut QueryBuilder<'_, Postgres>) {
    for (i, (connector, predicate)) in group.clauses.iter().enumerate() {
        if i > 0 {
            builder.push(match connector {
                Connector::And => " AND ",
                Connector::Or => " OR ",
            });
        }
        push_predicate(predicate, builder);
    }
}

fn push_predicate(predicate: &Predicate, builder: &mut QueryBuilder<'_, Postgres>) {
    match predicate {
        Predicate::Eq(column, value) => {
            builder.push(column.qualified());
            builder.push(" = ");
            value.push_bind(builder);
        }
        Predicate::IsNull(column) => {
            builder.push(column.qualified());
            builder.push(" IS NULL");
        }
        Predicate::In(_, values) if values.is_empty() => {
            builder.push("FALSE");
        }
        Predicate::In(column, values) => {
            builder.push(column.qualified());
            builder.push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                value.push_bind(builder);
            }
            builder.push(")");
        }
        Predicate::Group(inner) if inner.is_empty() => {
            builder.push("TRUE");
        }
        Predicate::Group(inner) => {
            builder.push("(");
            push_group(inner, builder);
            builder.push(")");
        }
        Predicate::Has(link, related) => {
            builder.push("EXISTS (SELECT 1 FROM ");
            builder.push(related.entity.table());
            builder.push(" WHERE ");
            builder.push(link.join_condition());
            if !related.filter.is_empty() {
                builder.push(" AND (");
                push_group(&related.filter, builder);
                builder.push(")");
            }
            builder.push(")");
        }
    }
}

// --- Rows ---

/// A borrowed row of either table.
#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    Photo(&'a Photo),
    Album(&'a Album),
}

impl Row<'_> {
    pub fn entity(&self) -> Entity {
        match self {
            Row::Photo(_) => Entity::Photo,
            Row::Album(_) => Entity::Album,
        }
    }

    /// The column's value, `None` for SQL NULL or a column of another table.
    pub fn value(&self, column: Column) -> Option<Value> {
        match (self, column) {
            (Row::Photo(p), Column::PhotoId) => Some(p.id.into()),
            (Row::Photo(p), Column::PhotoOwnerId) => p.owner_id.map(Value::from),
            (Row::Photo(p), Column::PhotoAlbumId) => p.album_id.map(Value::from),
            (Row::Photo(p), Column::PhotoIsPublic) => Some(p.is_public.into()),
            (Row::Photo(p), Column::PhotoCreatedAt) => Some(p.created_at.into()),
            (Row::Album(a), Column::AlbumId) => Some(a.id.into()),
            (Row::Album(a), Column::AlbumOwnerId) => a.owner_id.map(Value::from),
            (Row::Album(a), Column::AlbumIsPublic) => Some(a.is_public.into()),
            _ => None,
        }
    }
}

/// Related
///
/// Resolves relations while evaluating `Has` predicates in memory.
pub trait Related {
    fn album(&self, id: AlbumId) -> Option<&Album>;
}

fn group_matches(group: &Group, row: Row<'_>, related: &dyn Related) -> bool {
    // OR of AND-chains: each OR connector starts a new chain.
    let mut any = false;
    let mut chain = true;
    for (i, (connector, predicate)) in group.clauses.iter().enumerate() {
        if i > 0 && *connector == Connector::Or {
            any |= chain;
            chain = true;
        }
        chain = chain && predicate_matches(predicate, row, related);
    }
    group.is_empty() || any || chain
}

fn predicate_matches(predicate: &Predicate, row: Row<'_>, related: &dyn Related) -> bool {
    match predicate {
        Predicate::Eq(column, value) => row.value(*column).as_ref() == Some(value),
        Predicate::IsNull(column) => row.entity() == column.entity() && row.value(*column).is_none(),
        Predicate::In(column, values) => row
            .value(*column)
            .is_some_and(|value| values.contains(&value)),
        Predicate::Group(inner) => group_matches(inner, row, related),
        Predicate::Has(link, query) => match (link, row) {
            (Link::Album, Row::Photo(photo)) => photo
                .album_id
                .and_then(|id| related.album(id))
                .is_some_and(|album| query.matches(Row::Album(album), related)),
            _ => false,
        },
    }
}
