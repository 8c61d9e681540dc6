use super::{validate_page, SocialService};
use crate::error::{AppError, AppResult};
use crate::models::{FriendListFilter, FriendSummary, Friendship, PageMeta};
use crate::store::StoreError;

impl SocialService {
    // ==================== Friend Operations ====================

    fn friendship(&self, user_id: &str, friend_id: &str) -> AppResult<Friendship> {
        self.store
            .check_friendship(user_id, friend_id)
            .map_err(|e| match e {
                StoreError::NotFound(_) => AppError::NotFound("user not found".to_string()),
                other => other.into(),
            })
    }

    pub fn add_friend(&self, user_id: &str, friend_id: &str) -> AppResult<()> {
        if user_id == friend_id {
            return Err(AppError::validation("cannot add yourself as friend"));
        }
        if self.friendship(user_id, friend_id)? == Friendship::AlreadyFriends {
            return Err(AppError::Conflict("already friends".to_string()));
        }

        // A concurrent add that commits first surfaces here as AlreadyFriends.
        self.store.add_friend(user_id, friend_id)?;
        log::info!("friendship created between {} and {}", user_id, friend_id);
        Ok(())
    }

    pub fn remove_friend(&self, user_id: &str, friend_id: &str) -> AppResult<()> {
        if user_id == friend_id {
            return Err(AppError::validation("cannot remove yourself"));
        }
        if self.friendship(user_id, friend_id)? == Friendship::NotFriends {
            return Err(AppError::Consistency("not friend".to_string()));
        }

        self.store.remove_friend(user_id, friend_id)?;
        log::info!("friendship removed between {} and {}", user_id, friend_id);
        Ok(())
    }

    pub fn list_friends(
        &self,
        filter: &FriendListFilter,
    ) -> AppResult<(Vec<FriendSummary>, PageMeta)> {
        validate_page(filter.limit, filter.offset)?;
        let (friends, meta) = self.store.list_friends(filter)?;
        log::debug!("listed {} users for {}", meta.total, filter.user_id);
        Ok((friends, meta))
    }
}
