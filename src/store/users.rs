use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    format_timestamp, get_datetime, is_unique_violation, is_valid_id, now, Store, StoreError,
    StoreResult,
};
use crate::models::{CredentialType, User};

const USER_COLUMNS: &str =
    "id, name, email, phone, password_hash, image_url, friend_count, created_at, updated_at";

impl Store {
    // ==================== User Operations ====================

    pub fn create_user(&self, user: &mut User) -> StoreResult<()> {
        user.id = Uuid::new_v4().to_string();
        let now = now();
        user.created_at = now;
        user.updated_at = now;
        user.friend_count = 0;

        self.run("create_user", |conn| {
            conn.execute(
                r#"INSERT INTO users (id, name, email, phone, password_hash, image_url,
                    friend_count, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
                params![
                    &user.id,
                    &user.name,
                    &user.email,
                    &user.phone,
                    &user.password_hash,
                    &user.image_url,
                    user.friend_count,
                    format_timestamp(&user.created_at),
                    format_timestamp(&user.updated_at),
                ],
            )
            .map_err(duplicate_credential)?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> StoreResult<User> {
        if !is_valid_id(id) {
            return Err(StoreError::NotFound("user".to_string()));
        }
        self.run("get_user", |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
        })
    }

    pub fn find_user_by_credential(
        &self,
        credential_type: CredentialType,
        value: &str,
    ) -> StoreResult<User> {
        let column = credential_column(credential_type);
        self.run("find_user_by_credential", |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column),
                params![value],
                row_to_user,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
        })
    }

    /// Attach an email or phone to an existing user.
    pub fn set_credential(
        &self,
        id: &str,
        credential_type: CredentialType,
        value: &str,
    ) -> StoreResult<()> {
        let column = credential_column(credential_type);
        let updated_at = format_timestamp(&now());
        self.run("set_credential", |conn| {
            let rows = conn
                .execute(
                    &format!("UPDATE users SET {} = ?1, updated_at = ?2 WHERE id = ?3", column),
                    params![value, updated_at, id],
                )
                .map_err(duplicate_credential)?;
            if rows == 0 {
                return Err(StoreError::NotFound("user".to_string()));
            }
            Ok(())
        })
    }

    pub fn update_profile(&self, id: &str, name: &str, image_url: &str) -> StoreResult<()> {
        let updated_at = format_timestamp(&now());
        self.run("update_profile", |conn| {
            let rows = conn.execute(
                "UPDATE users SET name = ?1, image_url = ?2, updated_at = ?3 WHERE id = ?4",
                params![name, image_url, updated_at, id],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound("user".to_string()));
            }
            Ok(())
        })
    }
}

pub(crate) fn user_exists(conn: &Connection, id: &str) -> StoreResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn credential_column(credential_type: CredentialType) -> &'static str {
    match credential_type {
        CredentialType::Email => "email",
        CredentialType::Phone => "phone",
    }
}

fn duplicate_credential(err: rusqlite::Error) -> StoreError {
    if is_unique_violation(&err) {
        let field = match &err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("users.phone") => "phone",
            _ => "email",
        };
        StoreError::Duplicate(field.to_string())
    } else {
        err.into()
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        password_hash: row.get(4)?,
        image_url: row.get(5)?,
        friend_count: row.get(6)?,
        created_at: get_datetime(row, 7)?,
        updated_at: get_datetime(row, 8)?,
    })
}
