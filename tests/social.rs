mod common;

use common::{register_user, test_app};
use rubyan::error::AppError;
use rubyan::graph::EdgeType;
use rubyan::services::identity::{CreateUserInput, UpdateUserInput, UserQuery};
use rubyan::services::social::RecommendationQuery;

fn user_input(username: &str, email: &str) -> CreateUserInput {
    CreateUserInput {
        username: username.to_string(),
        email: email.to_string(),
        full_name: "Someone Else".to_string(),
        bio: String::new(),
        avatar_link: String::new(),
        password: "another-password".to_string(),
    }
}

#[tokio::test]
async fn duplicate_username_conflicts_regardless_of_other_fields() {
    let app = test_app().await;
    register_user(&app.identity, "alice").await;

    let err = app
        .identity
        .create_user(user_input("alice", "other@example.com"))
        .await
        .unwrap_err();
    match err {
        AppError::Conflict(msg) => assert!(msg.contains("username")),
        other => panic!("expected Conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn duplicate_email_conflicts_after_username_check() {
    let app = test_app().await;
    register_user(&app.identity, "alice").await;

    let err = app
        .identity
        .create_user(user_input("alice2", "alice@example.com"))
        .await
        .unwrap_err();
    match err {
        AppError::Conflict(msg) => assert!(msg.contains("email")),
        other => panic!("expected Conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn login_round_trip_and_bad_credentials() {
    let app = test_app().await;
    register_user(&app.identity, "alice").await;

    let token = app
        .identity
        .authenticate("alice", "hunter22")
        .await
        .unwrap();
    let claims = app.security.verify_token(&token).unwrap();
    assert_eq!(claims.sub, "alice");

    assert!(matches!(
        app.identity.authenticate("alice", "wrong").await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        app.identity.authenticate("nobody", "hunter22").await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn update_user_rehashes_password() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;

    let updated = app
        .identity
        .update_user(
            alice.id,
            UpdateUserInput {
                full_name: "Alice Renamed".to_string(),
                password: "new-password".to_string(),
                bio: "hi".to_string(),
                avatar_link: String::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Alice Renamed");
    assert_ne!(updated.password_digest, "new-password");

    assert!(app.identity.authenticate("alice", "new-password").await.is_ok());
    assert!(matches!(
        app.identity.authenticate("alice", "hunter22").await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn update_and_delete_missing_user_are_not_found() {
    let app = test_app().await;

    assert!(matches!(
        app.identity
            .update_user(
                12345,
                UpdateUserInput {
                    full_name: "Ghost".to_string(),
                    password: "x".to_string(),
                    bio: String::new(),
                    avatar_link: String::new(),
                },
            )
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        app.identity.delete_user(12345).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_users_filters_narrow() {
    let app = test_app().await;
    register_user(&app.identity, "alice").await;
    register_user(&app.identity, "alicia").await;
    register_user(&app.identity, "bob").await;

    let exact = app
        .identity
        .list_users(UserQuery {
            username: Some("alice".to_string()),
            ..UserQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);

    let substring = app
        .identity
        .list_users(UserQuery {
            username_i: Some("ALI".to_string()),
            ..UserQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(substring.len(), 2);

    let paged = app
        .identity
        .list_users(UserQuery {
            limit: Some(1),
            offset: Some(1),
            ..UserQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].username, "alicia");
}

#[tokio::test]
async fn self_follow_is_rejected_and_creates_no_edge() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;

    let err = app.social.follow(&alice, alice.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(!app
        .store
        .edge_exists(alice.id, EdgeType::Following, alice.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn duplicate_follow_and_unfollow_without_follow_are_rejected() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;
    let bob = register_user(&app.identity, "bob").await;

    app.social.follow(&alice, bob.id).await.unwrap();
    assert!(matches!(
        app.social.follow(&alice, bob.id).await,
        Err(AppError::BadRequest(_))
    ));

    app.social.unfollow(&alice, bob.id).await.unwrap();
    assert!(matches!(
        app.social.unfollow(&alice, bob.id).await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn follow_missing_user_is_not_found() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;

    assert!(matches!(
        app.social.follow(&alice, 9876).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn follow_lists_reflect_edges() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;
    let bob = register_user(&app.identity, "bob").await;
    let carol = register_user(&app.identity, "carol").await;

    app.social.follow(&alice, bob.id).await.unwrap();
    app.social.follow(&carol, alice.id).await.unwrap();

    let following = app.social.list_following(&alice).await.unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].username, "bob");

    let followers = app.social.list_followers(&alice).await.unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].username, "carol");
}

#[tokio::test]
async fn friend_of_friend_is_recommended_exactly_once() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;
    let bob = register_user(&app.identity, "bob").await;
    let carol = register_user(&app.identity, "carol").await;
    let dave = register_user(&app.identity, "dave").await;

    // A -> B -> D and A -> C -> D: D reachable via two intermediaries.
    app.social.follow(&alice, bob.id).await.unwrap();
    app.social.follow(&alice, carol.id).await.unwrap();
    app.social.follow(&bob, dave.id).await.unwrap();
    app.social.follow(&carol, dave.id).await.unwrap();
    // B also follows A and C; neither may be recommended.
    app.social.follow(&bob, alice.id).await.unwrap();
    app.social.follow(&bob, carol.id).await.unwrap();

    let recs = app
        .social
        .recommendations(&alice, RecommendationQuery::default())
        .await
        .unwrap();
    let usernames: Vec<&str> = recs.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(usernames, vec!["dave"]);
}

#[tokio::test]
async fn recommendations_paginate_deterministically() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;
    let hub = register_user(&app.identity, "hub").await;
    let mut expected = Vec::new();
    for name in ["uma", "vic", "wes"] {
        let user = register_user(&app.identity, name).await;
        app.social.follow(&hub, user.id).await.unwrap();
        expected.push(user.id);
    }
    app.social.follow(&alice, hub.id).await.unwrap();

    let all = app
        .social
        .recommendations(&alice, RecommendationQuery::default())
        .await
        .unwrap();
    assert_eq!(all.iter().map(|u| u.id).collect::<Vec<_>>(), expected);

    let page = app
        .social
        .recommendations(
            &alice,
            RecommendationQuery {
                limit: Some(1),
                offset: Some(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, expected[1]);
}

#[tokio::test]
async fn deleting_a_user_removes_their_follow_edges() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;
    let bob = register_user(&app.identity, "bob").await;

    app.social.follow(&alice, bob.id).await.unwrap();
    app.identity.delete_user(bob.id).await.unwrap();

    assert!(!app
        .store
        .edge_exists(alice.id, EdgeType::Following, bob.id)
        .await
        .unwrap());
    let following = app.social.list_following(&alice).await.unwrap();
    assert!(following.is_empty());
}

#[tokio::test]
async fn deleting_a_user_cascades_to_their_posts() {
    let app = test_app().await;
    let alice = register_user(&app.identity, "alice").await;
    let bob = register_user(&app.identity, "bob").await;

    let post = app.content.create_post(&alice, "soon gone").await.unwrap();
    app.content
        .create_comment(&bob, post.id, "a reply")
        .await
        .unwrap();
    let kept = app.content.create_post(&bob, "staying").await.unwrap();

    app.identity.delete_user(alice.id).await.unwrap();

    let err = app.content.get_post(post.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    // Bob's reply lived under Alice's post, so it goes with the subtree.
    let feed = app
        .content
        .list_feed(Default::default())
        .await
        .unwrap();
    assert_eq!(
        feed.iter().map(|node| node.id).collect::<Vec<_>>(),
        vec![kept.id]
    );
}
