use chrono::Duration;
use std::sync::Arc;

use kinship::auth::AuthService;
use kinship::error::ErrorKind;
use kinship::models::{CredentialType, PostListFilter, RegisterRequest, User};
use kinship::service::SocialService;
use kinship::store::Store;

fn create_service() -> SocialService {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new(
        "test_secret".to_string(),
        Duration::hours(2),
        4,
    ));
    SocialService::new(store, auth_service)
}

fn register(service: &SocialService, name: &str, email: &str) -> User {
    service
        .register(&RegisterRequest {
            credential_type: CredentialType::Email,
            credential_value: email.to_string(),
            name: name.to_string(),
            password: "secret1".to_string(),
        })
        .unwrap();
    service
        .store()
        .find_user_by_credential(CredentialType::Email, email)
        .unwrap()
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn feed(limit: i64) -> PostListFilter {
    PostListFilter {
        limit,
        offset: 0,
        ..Default::default()
    }
}

// ==================== Posts ====================

#[test]
fn test_create_post_validation() {
    let service = create_service();
    let alice = register(&service, "Alice Doe", "alice@test.com");

    let too_short = service.create_post(&alice.id, "x", tags(&["a"])).unwrap_err();
    assert_eq!(too_short.kind(), ErrorKind::ValidationError);

    let too_long = service
        .create_post(&alice.id, &"x".repeat(501), tags(&["a"]))
        .unwrap_err();
    assert_eq!(too_long.kind(), ErrorKind::ValidationError);

    let no_tags = service.create_post(&alice.id, "hello", Vec::new()).unwrap_err();
    assert_eq!(no_tags.kind(), ErrorKind::ValidationError);

    let many: Vec<String> = (0..21).map(|i| format!("t{}", i)).collect();
    let too_many = service.create_post(&alice.id, "hello", many).unwrap_err();
    assert_eq!(too_many.kind(), ErrorKind::ValidationError);

    let blank = service
        .create_post(&alice.id, "hello", tags(&["ok", " "]))
        .unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::ValidationError);

    let post = service
        .create_post(&alice.id, "<p>hello</p>", tags(&["greeting"]))
        .unwrap();
    assert!(!post.id.is_empty());
    assert_eq!(post.tags, vec!["greeting"]);
}

#[test]
fn test_comment_requires_existing_post() {
    let service = create_service();
    let alice = register(&service, "Alice Doe", "alice@test.com");

    for post_id in ["not-a-uuid", "6f1c0e8e-0c1a-4a53-9d8e-3f3f0f4b2a11"] {
        let err = service
            .create_post_comment(&alice.id, post_id, "nice one")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "post not found");
    }

    let missing = service.create_post_comment(&alice.id, "", "nice one").unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::ValidationError);

    let post = service
        .create_post(&alice.id, "hello", tags(&["a"]))
        .unwrap();
    let short = service
        .create_post_comment(&alice.id, &post.id, "k")
        .unwrap_err();
    assert_eq!(short.kind(), ErrorKind::ValidationError);
}

// ==================== Feed ====================

#[test]
fn test_feed_with_tag_filter_and_comments() {
    let service = create_service();
    let alice = register(&service, "Alice Doe", "alice@test.com");
    let bob = register(&service, "Bobby Ray", "bob@test.com");

    let tagged = service
        .create_post(&alice.id, "about x", tags(&["x", "y"]))
        .unwrap();
    let untagged = service
        .create_post(&bob.id, "about z", tags(&["z"]))
        .unwrap();
    service
        .create_post_comment(&bob.id, &tagged.id, "first comment")
        .unwrap();
    service
        .create_post_comment(&alice.id, &tagged.id, "second comment")
        .unwrap();

    let mut filter = feed(10);
    filter.search_tag = tags(&["x"]);
    let (items, meta) = service.list_posts(&filter).unwrap();
    assert_eq!(meta.total, 1);
    assert_eq!(items[0].post_id, tagged.id);
    assert!(items[0].post.tags.contains(&"x".to_string()));
    assert_eq!(items[0].creator.user_id, alice.id);
    let texts: Vec<&str> = items[0].comments.iter().map(|c| c.comment.as_str()).collect();
    assert_eq!(texts, vec!["first comment", "second comment"]);
    assert_eq!(items[0].comments[0].creator.name, "Bobby Ray");

    let (all, _) = service.list_posts(&feed(10)).unwrap();
    assert_eq!(all.len(), 2);
    let quiet = all.iter().find(|i| i.post_id == untagged.id).unwrap();
    assert!(quiet.comments.is_empty());

    let json = serde_json::to_value(quiet).unwrap();
    assert_eq!(json["comments"], serde_json::json!([]));
    assert_eq!(json["post"]["postInHtml"], "about z");
}

#[test]
fn test_feed_reflects_author_friend_count() {
    let service = create_service();
    let alice = register(&service, "Alice Doe", "alice@test.com");
    let bob = register(&service, "Bobby Ray", "bob@test.com");

    let post = service.create_post(&alice.id, "hello", tags(&["a"])).unwrap();
    service.create_post_comment(&bob.id, &post.id, "hey you").unwrap();
    service.add_friend(&alice.id, &bob.id).unwrap();

    let (items, _) = service.list_posts(&feed(5)).unwrap();
    assert_eq!(items[0].creator.friend_count, 1);
    assert_eq!(items[0].comments[0].creator.friend_count, 1);
}

#[test]
fn test_feed_bounds_and_empty_result() {
    let service = create_service();
    let alice = register(&service, "Alice Doe", "alice@test.com");
    service.create_post(&alice.id, "hello", tags(&["a"])).unwrap();

    assert_eq!(
        service.list_posts(&feed(101)).unwrap_err().kind(),
        ErrorKind::ValidationError
    );

    let mut filter = feed(5);
    filter.search = "absent".to_string();
    let (items, meta) = service.list_posts(&filter).unwrap();
    assert!(items.is_empty());
    assert_eq!(meta.total, 0);
}

// ==================== Separator Safety ====================

#[test]
fn test_comment_with_field_separator_is_rejected() {
    let service = create_service();
    let alice = register(&service, "Alice Doe", "alice@test.com");
    let bob = register(&service, "Bobby Ray", "bob@test.com");
    let post = service.create_post(&alice.id, "hello", tags(&["a"])).unwrap();

    let err = service
        .create_post_comment(&bob.id, &post.id, "hi\u{1f}there")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let (items, _) = service.list_posts(&feed(5)).unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].comments.is_empty());
}

#[test]
fn test_profile_with_field_separator_is_rejected() {
    let service = create_service();
    let alice = register(&service, "Alice Doe", "alice@test.com");
    let bob = register(&service, "Bobby Ray", "bob@test.com");
    let post = service.create_post(&alice.id, "hello", tags(&["a"])).unwrap();
    service.create_post_comment(&bob.id, &post.id, "nice one").unwrap();

    let bad_name = service
        .update_account(&bob.id, "Bobby\u{1f}Ray", "https://img.test/b.png")
        .unwrap_err();
    assert_eq!(bad_name.kind(), ErrorKind::ValidationError);

    let bad_image = service
        .update_account(&bob.id, "Bobby Ray", "https://img.test/b\u{1f}.png")
        .unwrap_err();
    assert_eq!(bad_image.kind(), ErrorKind::ValidationError);

    let bad_register = service
        .register(&RegisterRequest {
            credential_type: CredentialType::Email,
            credential_value: "carol@test.com".to_string(),
            name: "Carol\u{1f}Doe".to_string(),
            password: "secret1".to_string(),
        })
        .unwrap_err();
    assert_eq!(bad_register.kind(), ErrorKind::ValidationError);

    let (items, _) = service.list_posts(&feed(5)).unwrap();
    assert_eq!(items[0].comments.len(), 1);
    assert_eq!(items[0].comments[0].creator.name, "Bobby Ray");
}
