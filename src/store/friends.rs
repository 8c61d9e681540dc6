use rusqlite::{params, params_from_iter, TransactionBehavior};
use uuid::Uuid;

use super::query::friend_list_query;
use super::users::user_exists;
use super::{
    format_timestamp, get_datetime, is_foreign_key_violation, is_unique_violation, is_valid_id,
    now, Store, StoreError, StoreResult,
};
use crate::models::{FriendEdge, FriendListFilter, FriendSummary, Friendship, PageMeta};

impl Store {
    // ==================== Friend Operations ====================

    /// Create both directional edges and bump both counters in one transaction.
    pub fn add_friend(&self, user_id: &str, friend_id: &str) -> StoreResult<()> {
        if user_id == friend_id {
            return Err(StoreError::SelfFriendship);
        }
        let ts = format_timestamp(&now());

        self.run("add_friend", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            for (from, to) in [(user_id, friend_id), (friend_id, user_id)] {
                tx.execute(
                    r#"INSERT INTO friends (id, user_id, follow_user_id, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?4)"#,
                    params![Uuid::new_v4().to_string(), from, to, &ts],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::AlreadyFriends
                    } else if is_foreign_key_violation(&e) {
                        StoreError::NotFound("user".to_string())
                    } else {
                        e.into()
                    }
                })?;
            }

            let updated = tx.execute(
                "UPDATE users SET friend_count = friend_count + 1, updated_at = ?3 WHERE id IN (?1, ?2)",
                params![user_id, friend_id, &ts],
            )?;
            if updated != 2 {
                return Err(StoreError::NotFound("user".to_string()));
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Delete both directional edges and drop both counters in one transaction.
    /// Anything other than exactly two deleted edges rolls back as `NotFriends`.
    pub fn remove_friend(&self, user_id: &str, friend_id: &str) -> StoreResult<()> {
        if user_id == friend_id {
            return Err(StoreError::SelfFriendship);
        }
        let ts = format_timestamp(&now());

        self.run("remove_friend", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let deleted = tx.execute(
                r#"DELETE FROM friends
                   WHERE (user_id = ?1 AND follow_user_id = ?2)
                      OR (user_id = ?2 AND follow_user_id = ?1)"#,
                params![user_id, friend_id],
            )?;
            if deleted != 2 {
                return Err(StoreError::NotFriends);
            }

            let updated = tx.execute(
                "UPDATE users SET friend_count = friend_count - 1, updated_at = ?3 WHERE id IN (?1, ?2)",
                params![user_id, friend_id, &ts],
            )?;
            if updated != 2 {
                return Err(StoreError::NotFound("user".to_string()));
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// NotFound when either id is malformed or names no user.
    pub fn check_friendship(&self, user_id: &str, friend_id: &str) -> StoreResult<Friendship> {
        if !is_valid_id(user_id) || !is_valid_id(friend_id) {
            return Err(StoreError::NotFound("user".to_string()));
        }
        self.run("check_friendship", |conn| {
            if !user_exists(conn, user_id)? || !user_exists(conn, friend_id)? {
                return Err(StoreError::NotFound("user".to_string()));
            }
            let edges: i64 = conn.query_row(
                "SELECT COUNT(*) FROM friends WHERE user_id = ?1 AND follow_user_id = ?2",
                params![user_id, friend_id],
                |row| row.get(0),
            )?;
            Ok(if edges > 0 {
                Friendship::AlreadyFriends
            } else {
                Friendship::NotFriends
            })
        })
    }

    pub fn list_friends(
        &self,
        filter: &FriendListFilter,
    ) -> StoreResult<(Vec<FriendSummary>, PageMeta)> {
        let (sql, values) = friend_list_query(filter).build();

        let friends = self.run("list_friends", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok(FriendSummary {
                    user_id: row.get(0)?,
                    name: row.get(1)?,
                    image_url: row.get(2)?,
                    friend_count: row.get(3)?,
                    created_at: get_datetime(row, 4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })?;

        let meta = PageMeta {
            limit: filter.limit,
            offset: filter.offset,
            total: friends.len() as i64,
        };
        Ok((friends, meta))
    }

    /// Outgoing edges of a user, oldest first.
    pub fn friend_edges(&self, user_id: &str) -> StoreResult<Vec<FriendEdge>> {
        self.run("friend_edges", |conn| {
            let mut stmt = conn.prepare(
                r#"SELECT id, user_id, follow_user_id, created_at, updated_at
                   FROM friends WHERE user_id = ?1 ORDER BY created_at, rowid"#,
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(FriendEdge {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    follow_user_id: row.get(2)?,
                    created_at: get_datetime(row, 3)?,
                    updated_at: get_datetime(row, 4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FriendSortBy, SortOrder, User};
    use chrono::Utc;

    fn create_user(store: &Store, name: &str) -> User {
        let mut user = User {
            id: String::new(),
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.replace(' ', ".").to_lowercase())),
            phone: None,
            password_hash: "hash".to_string(),
            image_url: String::new(),
            friend_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.create_user(&mut user).unwrap();
        user
    }

    fn friend_count(store: &Store, id: &str) -> i64 {
        store.get_user(id).unwrap().friend_count
    }

    #[test]
    fn test_add_friend_creates_symmetric_edges() {
        let store = Store::in_memory().unwrap();
        let a = create_user(&store, "Alice Doe");
        let b = create_user(&store, "Bobby Doe");

        store.add_friend(&a.id, &b.id).unwrap();

        let a_edges = store.friend_edges(&a.id).unwrap();
        let b_edges = store.friend_edges(&b.id).unwrap();
        assert_eq!(a_edges.len(), 1);
        assert_eq!(b_edges.len(), 1);
        assert_eq!(a_edges[0].follow_user_id, b.id);
        assert_eq!(b_edges[0].follow_user_id, a.id);
        assert_eq!(a_edges[0].created_at, b_edges[0].created_at);
        assert_eq!(friend_count(&store, &a.id), 1);
        assert_eq!(friend_count(&store, &b.id), 1);
    }

    #[test]
    fn test_duplicate_add_rolls_back() {
        let store = Store::in_memory().unwrap();
        let a = create_user(&store, "Alice Doe");
        let b = create_user(&store, "Bobby Doe");

        store.add_friend(&a.id, &b.id).unwrap();
        assert!(matches!(
            store.add_friend(&b.id, &a.id),
            Err(StoreError::AlreadyFriends)
        ));
        assert_eq!(friend_count(&store, &a.id), 1);
        assert_eq!(friend_count(&store, &b.id), 1);
        assert_eq!(store.friend_edges(&a.id).unwrap().len(), 1);
    }

    #[test]
    fn test_add_friend_with_missing_user() {
        let store = Store::in_memory().unwrap();
        let a = create_user(&store, "Alice Doe");
        let ghost = Uuid::new_v4().to_string();

        assert!(matches!(
            store.add_friend(&a.id, &ghost),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(friend_count(&store, &a.id), 0);
        assert!(store.friend_edges(&a.id).unwrap().is_empty());
    }

    #[test]
    fn test_self_friendship_rejected() {
        let store = Store::in_memory().unwrap();
        let a = create_user(&store, "Alice Doe");
        assert!(matches!(
            store.add_friend(&a.id, &a.id),
            Err(StoreError::SelfFriendship)
        ));
    }

    #[test]
    fn test_remove_friend() {
        let store = Store::in_memory().unwrap();
        let a = create_user(&store, "Alice Doe");
        let b = create_user(&store, "Bobby Doe");

        assert!(matches!(
            store.remove_friend(&a.id, &b.id),
            Err(StoreError::NotFriends)
        ));

        store.add_friend(&a.id, &b.id).unwrap();
        store.remove_friend(&b.id, &a.id).unwrap();

        assert_eq!(friend_count(&store, &a.id), 0);
        assert_eq!(friend_count(&store, &b.id), 0);
        assert!(store.friend_edges(&a.id).unwrap().is_empty());
        assert!(store.friend_edges(&b.id).unwrap().is_empty());
    }

    #[test]
    fn test_half_pair_is_not_removed() {
        let store = Store::in_memory().unwrap();
        let a = create_user(&store, "Alice Doe");
        let b = create_user(&store, "Bobby Doe");

        // A lone directional edge is inconsistent state and must not be deleted.
        store
            .run("seed", |conn| {
                conn.execute(
                    "INSERT INTO friends (id, user_id, follow_user_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![
                        Uuid::new_v4().to_string(),
                        &a.id,
                        &b.id,
                        format_timestamp(&now())
                    ],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            store.remove_friend(&a.id, &b.id),
            Err(StoreError::NotFriends)
        ));
        assert_eq!(store.friend_edges(&a.id).unwrap().len(), 1);
        assert_eq!(friend_count(&store, &a.id), 0);
    }

    #[test]
    fn test_check_friendship() {
        let store = Store::in_memory().unwrap();
        let a = create_user(&store, "Alice Doe");
        let b = create_user(&store, "Bobby Doe");

        assert_eq!(
            store.check_friendship(&a.id, &b.id).unwrap(),
            Friendship::NotFriends
        );
        store.add_friend(&a.id, &b.id).unwrap();
        assert_eq!(
            store.check_friendship(&a.id, &b.id).unwrap(),
            Friendship::AlreadyFriends
        );
        assert_eq!(
            store.check_friendship(&b.id, &a.id).unwrap(),
            Friendship::AlreadyFriends
        );

        assert!(matches!(
            store.check_friendship(&a.id, "garbage"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.check_friendship(&a.id, &Uuid::new_v4().to_string()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_friends_filters() {
        let store = Store::in_memory().unwrap();
        let me = create_user(&store, "Main User");
        let ann = create_user(&store, "Annie Lee");
        let bob = create_user(&store, "Bobby Ray");
        let joanne = create_user(&store, "Joanne Ng");

        store.add_friend(&me.id, &ann.id).unwrap();
        store.add_friend(&me.id, &joanne.id).unwrap();
        store.add_friend(&bob.id, &joanne.id).unwrap();

        let mut filter = FriendListFilter::new(me.id.clone());
        let (all, meta) = store.list_friends(&filter).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(meta.total, 3);
        assert!(all.iter().all(|f| f.user_id != me.id));

        filter.only_friend = true;
        let (friends, _) = store.list_friends(&filter).unwrap();
        let mut ids: Vec<&str> = friends.iter().map(|f| f.user_id.as_str()).collect();
        ids.sort();
        let mut expected = vec![ann.id.as_str(), joanne.id.as_str()];
        expected.sort();
        assert_eq!(ids, expected);

        filter.search = "nn".to_string();
        let (matched, _) = store.list_friends(&filter).unwrap();
        assert_eq!(matched.len(), 2);

        filter.search = "NN".to_string();
        let (case_sensitive, _) = store.list_friends(&filter).unwrap();
        assert!(case_sensitive.is_empty());

        filter.search = String::new();
        filter.only_friend = false;
        filter.sort_by = FriendSortBy::FriendCount;
        filter.order_by = SortOrder::Desc;
        let (by_count, _) = store.list_friends(&filter).unwrap();
        assert_eq!(by_count[0].user_id, joanne.id);
        assert!(by_count
            .windows(2)
            .all(|w| w[0].friend_count >= w[1].friend_count));

        filter.limit = 1;
        filter.offset = 1;
        let (page, meta) = store.list_friends(&filter).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].user_id, by_count[1].user_id);
        assert_eq!(meta, PageMeta { limit: 1, offset: 1, total: 1 });
    }
}
