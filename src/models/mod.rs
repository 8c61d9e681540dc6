use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User is a registered member; exactly one credential is set at registration
/// and the other can be linked later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub image_url: String,
    pub friend_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile of a user as it appears in friend listings and as the
/// creator of posts and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendSummary {
    pub user_id: String,
    pub name: String,
    pub image_url: String,
    pub friend_count: i64,
    pub created_at: DateTime<Utc>,
}

/// One directional friendship record. A friendship is always stored as a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendEdge {
    pub id: String,
    pub user_id: String,
    pub follow_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a friendship lookup between an existing pair of users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Friendship {
    NotFriends,
    AlreadyFriends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FriendSortBy {
    #[default]
    CreatedAt,
    FriendCount,
}

impl FriendSortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(FriendSortBy::CreatedAt),
            "friendCount" => Some(FriendSortBy::FriendCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter for listing other users, optionally restricted to friends.
#[derive(Debug, Clone)]
pub struct FriendListFilter {
    pub user_id: String,
    pub limit: i64,
    pub offset: i64,
    pub sort_by: FriendSortBy,
    pub order_by: SortOrder,
    pub only_friend: bool,
    pub search: String,
}

impl FriendListFilter {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            sort_by: FriendSortBy::default(),
            order_by: SortOrder::default(),
            only_friend: false,
            search: String::new(),
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: i64 = 5;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Pagination metadata. `total` counts the rows returned in this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "postInHtml")]
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment decoded from the feed query together with its author.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostComment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub creator: FriendSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub post_in_html: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A feed entry: the post, its author and every comment on it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListItem {
    pub post_id: String,
    pub post: PostView,
    pub comments: Vec<PostComment>,
    pub creator: FriendSummary,
}

#[derive(Debug, Clone, Default)]
pub struct PostListFilter {
    pub limit: i64,
    pub offset: i64,
    pub search: String,
    pub search_tag: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    Email,
    Phone,
}

// Request/Response types for API

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub credential_type: CredentialType,
    pub credential_value: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub credential_type: CredentialType,
    pub credential_value: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub email: String,
    pub phone: String,
    pub name: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkPhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub name: String,
    pub image_url: String,
}

/// Body of add/remove friend calls; `user_id` is the other user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub post_in_html: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: String,
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub message: String,
    pub data: Vec<T>,
    pub meta: PageMeta,
}
