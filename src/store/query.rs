//! Structured SELECT builder.
//!
//! Identifiers (tables, columns, join conditions) are `&'static str` and come
//! from this crate only. Every caller supplied value travels as a bound
//! parameter, numbered in the order it appears in the rendered SQL.

use rusqlite::types::Value;

use crate::models::{FriendListFilter, FriendSortBy, PostListFilter, SortOrder};

/// A single typed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(&'static str, Value),
    NotEq(&'static str, Value),
    /// Case-sensitive substring match.
    Contains(&'static str, String),
    /// The JSON array stored in the column shares at least one element with
    /// the given values.
    JsonArrayOverlaps(&'static str, Vec<String>),
}

impl Predicate {
    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Predicate::Eq(column, value) => {
                format!("{} = {}", column, bind(params, value.clone()))
            }
            Predicate::NotEq(column, value) => {
                format!("{} <> {}", column, bind(params, value.clone()))
            }
            Predicate::Contains(column, term) => {
                format!("instr({}, {}) > 0", column, bind(params, Value::Text(term.clone())))
            }
            Predicate::JsonArrayOverlaps(column, values) => {
                if values.is_empty() {
                    return "0".to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| bind(params, Value::Text(v.clone())))
                    .collect();
                format!(
                    "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value IN ({}))",
                    column,
                    placeholders.join(", ")
                )
            }
        }
    }
}

fn bind(params: &mut Vec<Value>, value: Value) -> String {
    params.push(value);
    format!("?{}", params.len())
}

#[derive(Debug, Clone)]
struct Join {
    table: &'static str,
    on: &'static str,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone)]
pub struct SelectQuery {
    columns: Vec<&'static str>,
    from: &'static str,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    order: Vec<(&'static str, SortOrder)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    pub fn table(table: &'static str) -> Self {
        Self {
            columns: Vec::new(),
            from: table,
            joins: Vec::new(),
            predicates: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns.extend_from_slice(columns);
        self
    }

    /// `INNER JOIN table ON on [AND predicates...]`
    pub fn inner_join(
        mut self,
        table: &'static str,
        on: &'static str,
        predicates: Vec<Predicate>,
    ) -> Self {
        self.joins.push(Join { table, on, predicates });
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filter_if(self, condition: bool, predicate: impl FnOnce() -> Predicate) -> Self {
        if condition {
            self.filter(predicate())
        } else {
            self
        }
    }

    pub fn order_by(mut self, column: &'static str, order: SortOrder) -> Self {
        self.order.push((column, order));
        self
    }

    pub fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Render SQL text and its parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.from);

        for join in &self.joins {
            sql.push_str(&format!(" INNER JOIN {} ON {}", join.table, join.on));
            for predicate in &join.predicates {
                sql.push_str(" AND ");
                sql.push_str(&predicate.render(&mut params));
            }
        }

        if !self.predicates.is_empty() {
            let rendered: Vec<String> = self
                .predicates
                .iter()
                .map(|p| p.render(&mut params))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&rendered.join(" AND "));
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, dir)| format!("{} {}", column, dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", bind(&mut params, Value::Integer(limit))));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", bind(&mut params, Value::Integer(offset))));
        }

        (sql, params)
    }
}

/// Column order of the friend listing: id, name, image_url, friend_count,
/// created_at.
pub fn friend_list_query(filter: &FriendListFilter) -> SelectQuery {
    let sort_column = match filter.sort_by {
        FriendSortBy::CreatedAt => "users.created_at",
        FriendSortBy::FriendCount => "users.friend_count",
    };

    let mut query = SelectQuery::table("users").columns(&[
        "users.id",
        "users.name",
        "users.image_url",
        "users.friend_count",
        "users.created_at",
    ]);

    if filter.only_friend {
        query = query.inner_join(
            "friends",
            "users.id = friends.follow_user_id",
            vec![Predicate::Eq(
                "friends.user_id",
                Value::Text(filter.user_id.clone()),
            )],
        );
    }

    query
        .filter(Predicate::NotEq(
            "users.id",
            Value::Text(filter.user_id.clone()),
        ))
        .filter_if(!filter.search.is_empty(), || {
            Predicate::Contains("users.name", filter.search.clone())
        })
        .order_by(sort_column, filter.order_by)
        .order_by("users.id", filter.order_by)
        .paginate(filter.limit, filter.offset)
}

/// One string per comment, fields joined by the unit separator (char 31) in
/// the order the aggregator expects, oldest comment first.
const COMMENTS_COLUMN: &str = "COALESCE((SELECT json_group_array(\
    pc.id || char(31) || pc.post_id || char(31) || pc.user_id || char(31) || \
    pc.comment || char(31) || pc.created_at || char(31) || \
    cu.id || char(31) || cu.name || char(31) || cu.image_url || char(31) || \
    cu.friend_count || char(31) || cu.created_at \
    ORDER BY pc.created_at ASC, pc.rowid ASC) \
    FROM post_comments pc JOIN users cu ON cu.id = pc.user_id \
    WHERE pc.post_id = posts.id), '[]')";

/// Column order of the feed: post id, post author id, content, tags JSON,
/// post created_at, author id, author name, author image_url, author
/// friend_count, author created_at, comments JSON.
pub fn post_feed_query(filter: &PostListFilter) -> SelectQuery {
    SelectQuery::table("posts")
        .columns(&[
            "posts.id",
            "posts.user_id",
            "posts.content",
            "posts.tags",
            "posts.created_at",
            "users.id",
            "users.name",
            "users.image_url",
            "users.friend_count",
            "users.created_at",
            COMMENTS_COLUMN,
        ])
        .inner_join("users", "users.id = posts.user_id", Vec::new())
        .filter_if(!filter.search.is_empty(), || {
            Predicate::Contains("posts.content", filter.search.clone())
        })
        .filter_if(!filter.search_tag.is_empty(), || {
            Predicate::JsonArrayOverlaps("posts.tags", filter.search_tag.clone())
        })
        .order_by("posts.created_at", SortOrder::Desc)
        .order_by("posts.rowid", SortOrder::Desc)
        .paginate(filter.limit, filter.offset)
}
