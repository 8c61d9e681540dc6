//! Decoding of the comment column produced by the feed query.
//!
//! The column holds a JSON array of strings, one per comment, each joining ten
//! fields with the unit separator. Malformed rows are errors, never skipped.

use thiserror::Error;

use crate::models::{FriendSummary, PostComment};
use crate::store::parse_timestamp;

pub const FIELD_SEPARATOR: char = '\u{1f}';
pub const COMMENT_FIELDS: usize = 10;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("comment column is not a JSON string array: {0}")]
    Json(#[from] serde_json::Error),
    #[error("comment row {row}: expected {expected} fields, found {found}")]
    Arity {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("comment row {row}: invalid {field} {value:?}")]
    Field {
        row: usize,
        field: &'static str,
        value: String,
    },
}

pub fn decode_comments(raw: &str) -> Result<Vec<PostComment>, AggregateError> {
    let rows: Vec<String> = serde_json::from_str(raw)?;
    rows.iter()
        .enumerate()
        .map(|(idx, encoded)| decode_comment(idx, encoded))
        .collect()
}

pub fn decode_comment(row: usize, encoded: &str) -> Result<PostComment, AggregateError> {
    let fields: Vec<&str> = encoded.split(FIELD_SEPARATOR).collect();
    if fields.len() != COMMENT_FIELDS {
        return Err(AggregateError::Arity {
            row,
            expected: COMMENT_FIELDS,
            found: fields.len(),
        });
    }

    let timestamp = |field: &'static str, value: &str| {
        parse_timestamp(value).map_err(|_| AggregateError::Field {
            row,
            field,
            value: value.to_string(),
        })
    };

    let friend_count = fields[8].parse::<i64>().map_err(|_| AggregateError::Field {
        row,
        field: "friend_count",
        value: fields[8].to_string(),
    })?;

    Ok(PostComment {
        id: fields[0].to_string(),
        post_id: fields[1].to_string(),
        user_id: fields[2].to_string(),
        comment: fields[3].to_string(),
        created_at: timestamp("comment created_at", fields[4])?,
        creator: FriendSummary {
            user_id: fields[5].to_string(),
            name: fields[6].to_string(),
            image_url: fields[7].to_string(),
            friend_count,
            created_at: timestamp("creator created_at", fields[9])?,
        },
    })
}
