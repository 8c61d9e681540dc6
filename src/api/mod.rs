use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::service::SocialService;

pub struct AppState {
    pub service: Arc<SocialService>,
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== User Endpoints ====================

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let auth = state.service.register(&body)?;
    Ok(HttpResponse::Created().json(ApiResponse::new("User registered successfully", auth)))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let auth = state.service.login(&body)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("User logged successfully", auth)))
}

pub async fn get_current_user(
    state: web::Data<AppState>,
    auth_user: AuthUser,
) -> AppResult<HttpResponse> {
    let user = state.service.get_user(&auth_user.user_id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("success", user)))
}

pub async fn link_email(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<LinkEmailRequest>,
) -> AppResult<HttpResponse> {
    let user = state.service.link_email(&auth_user.user_id, &body.email)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Email linked successfully", user)))
}

pub async fn link_phone(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<LinkPhoneRequest>,
) -> AppResult<HttpResponse> {
    let user = state.service.link_phone(&auth_user.user_id, &body.phone)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Phone linked successfully", user)))
}

pub async fn update_account(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<UpdateAccountRequest>,
) -> AppResult<HttpResponse> {
    let user = state
        .service
        .update_account(&auth_user.user_id, &body.name, &body.image_url)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Account updated successfully", user)))
}

// ==================== Friend Endpoints ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFriendsQuery {
    limit: Option<String>,
    offset: Option<String>,
    sort_by: Option<String>,
    order_by: Option<String>,
    only_friend: Option<String>,
    search: Option<String>,
}

impl ListFriendsQuery {
    fn into_filter(self, user_id: String) -> AppResult<FriendListFilter> {
        let mut filter = FriendListFilter::new(user_id);
        if let Some(limit) = self.limit {
            filter.limit = parse_number("limit", &limit)?;
        }
        if let Some(offset) = self.offset {
            filter.offset = parse_number("offset", &offset)?;
        }
        if let Some(sort_by) = self.sort_by {
            filter.sort_by = FriendSortBy::parse(&sort_by)
                .ok_or_else(|| AppError::validation("sortBy must be createdAt or friendCount"))?;
        }
        if let Some(order_by) = self.order_by {
            filter.order_by = SortOrder::parse(&order_by)
                .ok_or_else(|| AppError::validation("orderBy must be asc or desc"))?;
        }
        if let Some(only_friend) = self.only_friend {
            filter.only_friend = match only_friend.as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(AppError::validation("onlyFriend must be true or false")),
            };
        }
        filter.search = self.search.unwrap_or_default();
        Ok(filter)
    }
}

fn parse_number(name: &str, value: &str) -> AppResult<i64> {
    value
        .parse()
        .map_err(|_| AppError::validation(format!("{} must be a number", name)))
}

pub async fn add_friend(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<FriendRequest>,
) -> AppResult<HttpResponse> {
    state.service.add_friend(&auth_user.user_id, &body.user_id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Friend added successfully", ())))
}

pub async fn remove_friend(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<FriendRequest>,
) -> AppResult<HttpResponse> {
    state
        .service
        .remove_friend(&auth_user.user_id, &body.user_id)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Friend removed successfully", ())))
}

pub async fn list_friends(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    query: web::Query<ListFriendsQuery>,
) -> AppResult<HttpResponse> {
    let filter = query.into_inner().into_filter(auth_user.user_id)?;
    let (data, meta) = state.service.list_friends(&filter)?;
    Ok(HttpResponse::Ok().json(PaginatedResponse {
        message: "success".to_string(),
        data,
        meta,
    }))
}

// ==================== Post Endpoints ====================

/// `searchTag` may repeat, so the raw pairs are read instead of a struct.
fn post_filter(pairs: Vec<(String, String)>) -> AppResult<PostListFilter> {
    let mut filter = PostListFilter {
        limit: DEFAULT_PAGE_LIMIT,
        ..Default::default()
    };
    for (key, value) in pairs {
        match key.as_str() {
            "limit" => filter.limit = parse_number("limit", &value)?,
            "offset" => filter.offset = parse_number("offset", &value)?,
            "search" => filter.search = value,
            "searchTag" => {
                if !value.is_empty() {
                    filter.search_tag.push(value)
                }
            }
            _ => {}
        }
    }
    Ok(filter)
}

pub async fn create_post(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let post = state
        .service
        .create_post(&auth_user.user_id, &body.post_in_html, body.tags)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Post created successfully", post)))
}

pub async fn list_posts(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
    query: web::Query<Vec<(String, String)>>,
) -> AppResult<HttpResponse> {
    let filter = post_filter(query.into_inner())?;
    let (data, meta) = state.service.list_posts(&filter)?;
    Ok(HttpResponse::Ok().json(PaginatedResponse {
        message: "success".to_string(),
        data,
        meta,
    }))
}

pub async fn create_comment(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    body: web::Json<CreateCommentRequest>,
) -> AppResult<HttpResponse> {
    let comment = state
        .service
        .create_post_comment(&auth_user.user_id, &body.post_id, &body.comment)?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Comment created successfully", comment)))
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Malformed bodies and query strings share the validation error shape
        .app_data(web::JsonConfig::default().error_handler(|err, _| {
            AppError::validation(err.to_string()).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _| {
            AppError::validation(err.to_string()).into()
        }))

        // Health check
        .route("/health", web::get().to(health))

        // User routes
        .route("/v1/user/register", web::post().to(register))
        .route("/v1/user/login", web::post().to(login))
        .route("/v1/user", web::get().to(get_current_user))
        .route("/v1/user", web::patch().to(update_account))
        .route("/v1/user/link", web::post().to(link_email))
        .route("/v1/user/link/phone", web::post().to(link_phone))

        // Friends
        .route("/v1/friend", web::get().to(list_friends))
        .route("/v1/friend", web::post().to(add_friend))
        .route("/v1/friend", web::delete().to(remove_friend))

        // Posts
        .route("/v1/post", web::get().to(list_posts))
        .route("/v1/post", web::post().to(create_post))
        .route("/v1/post/comment", web::post().to(create_comment));
}
