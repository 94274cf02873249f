mod support;

use tempfile::tempdir;
use yatube::application::feed::FeedError;

use support::services;

#[tokio::test]
async fn feed_contains_only_followed_authors_newest_first() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let reader = app.user("reader").await;
    let anna = app.user("anna").await;
    let boris = app.user("boris").await;
    let stranger = app.user("stranger").await;

    let a1 = app.post(&anna, "anna first").await;
    let b1 = app.post(&boris, "boris first").await;
    app.post(&stranger, "not followed").await;
    let a2 = app.post(&anna, "anna second").await;

    app.follows.follow(reader.id, anna.id).await.expect("follow");
    app.follows.follow(reader.id, boris.id).await.expect("follow");

    let feed = app.feed.compute_feed(reader.id).await.expect("feed");
    let ids: Vec<_> = feed.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![a2.id, b1.id, a1.id]);
}

#[tokio::test]
async fn following_nobody_yields_an_empty_page() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let reader = app.user("reader").await;
    let anna = app.user("anna").await;
    app.post(&anna, "hello").await;

    let page = app.feed.follow_page(reader.id, 1).await.expect("page");
    assert!(page.items.is_empty());
    assert_eq!(page.number, 1);
    assert_eq!(page.num_pages, 1);
    assert!(!page.has_next);
    assert!(!page.has_previous);
}

#[tokio::test]
async fn unfollowed_authors_leave_the_feed_immediately() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let reader = app.user("reader").await;
    let anna = app.user("anna").await;
    app.post(&anna, "hello").await;

    app.follows.follow(reader.id, anna.id).await.expect("follow");
    assert_eq!(app.feed.compute_feed(reader.id).await.expect("feed").len(), 1);

    app.follows.unfollow(reader.id, anna.id).await.expect("unfollow");
    assert!(app.feed.compute_feed(reader.id).await.expect("feed").is_empty());
}

#[tokio::test]
async fn out_of_range_pages_clamp_to_the_last_page() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let author = app.user("anna").await;
    for n in 0..13 {
        app.post(&author, &format!("post {n}")).await;
    }

    let first = app.feed.index_page(1).await.expect("page 1");
    let second = app.feed.index_page(2).await.expect("page 2");
    let beyond = app.feed.index_page(3).await.expect("page 3");
    let huge = app.feed.index_page(u64::MAX).await.expect("huge");

    assert_eq!(first.items.len(), 10);
    assert_eq!(second.items.len(), 3);
    assert_eq!(beyond, second);
    assert_eq!(huge, second);
    assert_eq!(second.number, 2);
    assert_eq!(second.count, 13);
    assert_eq!(first.items[0].text, "post 12");
}

#[tokio::test]
async fn follow_feed_pages_partition_the_full_feed() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 4);
    let reader = app.user("reader").await;
    let anna = app.user("anna").await;
    for n in 0..9 {
        app.post(&anna, &format!("post {n}")).await;
    }
    app.follows.follow(reader.id, anna.id).await.expect("follow");

    let full = app.feed.compute_feed(reader.id).await.expect("feed");
    let mut collected = Vec::new();
    for number in 1..=3 {
        let page = app.feed.follow_page(reader.id, number).await.expect("page");
        assert_eq!(page.num_pages, 3);
        collected.extend(page.items);
    }
    assert_eq!(collected, full);
}

#[tokio::test]
async fn group_page_lists_only_group_posts() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let anna = app.user("anna").await;
    let cats = app
        .groups
        .create_group(yatube::application::groups::CreateGroupCommand {
            title: "Cats".to_string(),
            slug: None,
            description: "All about cats".to_string(),
        })
        .await
        .expect("group");

    let in_group = app.post_in_group(&anna, "meow", Some(cats.id)).await;
    app.post(&anna, "outside").await;

    let page = app.feed.group_page("cats", 1).await.expect("group page");
    assert_eq!(page.group.id, cats.id);
    assert_eq!(page.page.items.len(), 1);
    assert_eq!(page.page.items[0].id, in_group.id);

    let err = app.feed.group_page("dogs", 1).await.expect_err("unknown group");
    assert!(matches!(err, FeedError::UnknownGroup(slug) if slug == "dogs"));
}

#[tokio::test]
async fn profile_reports_count_and_follow_state() {
    let media = tempdir().expect("tempdir");
    let app = services(media.path(), 10);
    let reader = app.user("reader").await;
    let anna = app.user("anna").await;
    app.post(&anna, "one").await;
    app.post(&anna, "two").await;

    let anonymous = app.feed.profile_page("anna", None, 1).await.expect("profile");
    assert_eq!(anonymous.post_count, 2);
    assert!(!anonymous.following);

    app.follows.follow(reader.id, anna.id).await.expect("follow");
    let viewed = app
        .feed
        .profile_page("anna", Some(reader.id), 1)
        .await
        .expect("profile");
    assert!(viewed.following);

    let err = app
        .feed
        .profile_page("nobody", None, 1)
        .await
        .expect_err("unknown author");
    assert!(matches!(err, FeedError::UnknownAuthor(_)));
}
