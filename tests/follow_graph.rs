mod support;

use tempfile::tempdir;
use yatube::application::follow::{FollowError, FollowOutcome, UnfollowOutcome};

use support::services;

#[tokio::test]
async fn follow_creates_one_edge_and_is_idempotent() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let leo = app.user("leo").await;
    let tolstoy = app.user("tolstoy").await;

    let first = app.follows.follow(leo.id, tolstoy.id).await.expect("follow");
    let second = app.follows.follow(leo.id, tolstoy.id).await.expect("follow");

    assert_eq!(first, FollowOutcome::Created);
    assert_eq!(second, FollowOutcome::AlreadyFollowing);
    assert_eq!(app.store.follow_count(), 1);
    assert!(app.follows.is_following(leo.id, tolstoy.id).await.expect("query"));
    assert!(!app.follows.is_following(tolstoy.id, leo.id).await.expect("query"));
}

#[tokio::test]
async fn self_follow_is_a_no_op() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let leo = app.user("leo").await;

    let outcome = app.follows.follow(leo.id, leo.id).await.expect("follow");

    assert_eq!(outcome, FollowOutcome::SelfFollow);
    assert_eq!(app.store.follow_count(), 0);
    assert!(app.follows.following_authors(leo.id).await.expect("authors").is_empty());
}

#[tokio::test]
async fn unfollow_removes_the_edge_and_tolerates_absence() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let leo = app.user("leo").await;
    let tolstoy = app.user("tolstoy").await;

    app.follows.follow(leo.id, tolstoy.id).await.expect("follow");
    let removed = app.follows.unfollow(leo.id, tolstoy.id).await.expect("unfollow");
    let again = app.follows.unfollow(leo.id, tolstoy.id).await.expect("unfollow");

    assert_eq!(removed, UnfollowOutcome::Removed);
    assert_eq!(again, UnfollowOutcome::NotFollowing);
    assert_eq!(app.store.follow_count(), 0);
}

#[tokio::test]
async fn following_authors_reflects_current_edges() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let leo = app.user("leo").await;
    let anna = app.user("anna").await;
    let boris = app.user("boris").await;

    app.follows.follow(leo.id, anna.id).await.expect("follow");
    app.follows.follow(leo.id, boris.id).await.expect("follow");
    app.follows.unfollow(leo.id, anna.id).await.expect("unfollow");

    let authors = app.follows.following_authors(leo.id).await.expect("authors");
    assert_eq!(authors.into_iter().collect::<Vec<_>>(), vec![boris.id]);
}

#[tokio::test]
async fn follow_by_unknown_username_is_reported() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let leo = app.user("leo").await;

    let err = app
        .follows
        .follow_username(leo.id, "nobody")
        .await
        .expect_err("unknown author");
    assert!(matches!(err, FollowError::UnknownAuthor(name) if name == "nobody"));
}

#[tokio::test]
async fn deleting_a_user_drops_edges_in_both_directions() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let leo = app.user("leo").await;
    let anna = app.user("anna").await;
    let boris = app.user("boris").await;

    app.follows.follow(leo.id, anna.id).await.expect("follow");
    app.follows.follow(anna.id, boris.id).await.expect("follow");
    app.follows.follow(boris.id, leo.id).await.expect("follow");

    app.users.delete_user("anna").await.expect("delete");

    assert_eq!(app.store.follow_count(), 1);
    assert!(app.follows.is_following(boris.id, leo.id).await.expect("query"));
}
