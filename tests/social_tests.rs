//! Tweets, likes, subscriptions, playlists and the channel dashboard.

mod common;

use axum::http::StatusCode;
use common::{TestApp, empty_request, json_request};
use serde_json::json;

#[tokio::test]
async fn test_tweet_lifecycle() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let mut ids = Vec::new();
    for content in ["hello", "world"] {
        let (status, body) = app
            .call(json_request(
                "POST",
                "/api/v1/tweets",
                Some(&alice.access_token),
                &json!({ "content": content }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = app
        .call(empty_request(
            "GET",
            &format!("/api/v1/tweets/user/{}", alice.id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let tweets = body["data"].as_array().unwrap();
    assert_eq!(tweets.len(), 2);
    assert_eq!(tweets[0]["content"], "world");

    let uri = format!("/api/v1/tweets/{}", ids[0]);
    let (status, _) = app
        .call(json_request(
            "PATCH",
            &uri,
            Some(&bob.access_token),
            &json!({ "newContent": "mine now" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(json_request(
            "PATCH",
            &uri,
            Some(&alice.access_token),
            &json!({ "newContent": "hello again" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "hello again");

    let (status, _) = app
        .call(empty_request("DELETE", &uri, Some(&bob.access_token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(empty_request("DELETE", &uri, Some(&alice.access_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.db.tweets().get_by_id(&ids[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_tweet_validation() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;

    let (status, _) = app
        .call(json_request(
            "POST",
            "/api/v1/tweets",
            Some(&alice.access_token),
            &json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(empty_request("GET", "/api/v1/tweets/user/nobody", None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_likes() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let video = app.publish_video(&alice.access_token, "Likeable").await;
    let video_id = video["id"].as_str().unwrap();

    let uri = format!("/api/v1/likes/toggle/v/{}", video_id);
    let (status, body) = app
        .call(empty_request("POST", &uri, Some(&bob.access_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["liked"], true);

    let (status, body) = app
        .call(empty_request(
            "GET",
            "/api/v1/likes/videos",
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let liked = body["data"].as_array().unwrap();
    assert_eq!(liked.len(), 1);
    assert_eq!(liked[0]["video"]["id"], video_id);
    assert_eq!(liked[0]["video"]["owner"]["username"], "alice");

    let (_, body) = app
        .call(empty_request("POST", &uri, Some(&bob.access_token)))
        .await;
    assert_eq!(body["data"]["liked"], false);

    let (_, body) = app
        .call(empty_request(
            "GET",
            "/api/v1/likes/videos",
            Some(&bob.access_token),
        ))
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_like_comment_and_tweet() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let video = app.publish_video(&alice.access_token, "v").await;

    let (_, body) = app
        .call(json_request(
            "POST",
            &format!("/api/v1/comments/{}", video["id"].as_str().unwrap()),
            Some(&alice.access_token),
            &json!({ "content": "c" }),
        ))
        .await;
    let comment_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .call(json_request(
            "POST",
            "/api/v1/tweets",
            Some(&alice.access_token),
            &json!({ "content": "t" }),
        ))
        .await;
    let tweet_id = body["data"]["id"].as_str().unwrap().to_string();

    for uri in [
        format!("/api/v1/likes/toggle/c/{}", comment_id),
        format!("/api/v1/likes/toggle/t/{}", tweet_id),
    ] {
        let (status, body) = app
            .call(empty_request("POST", &uri, Some(&alice.access_token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["liked"], true);
    }
}

#[tokio::test]
async fn test_like_missing_target() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;

    for kind in ["v", "c", "t"] {
        let (status, _) = app
            .call(empty_request(
                "POST",
                &format!("/api/v1/likes/toggle/{}/missing", kind),
                Some(&alice.access_token),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, _) = app
        .call(empty_request("GET", "/api/v1/likes/videos", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_subscriptions() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let carol = app.create_user("carol").await;

    for user in [&bob, &carol] {
        let (status, body) = app
            .call(empty_request(
                "POST",
                &format!("/api/v1/subscriptions/c/{}", alice.id),
                Some(&user.access_token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["subscribed"], true);
    }

    let (_, body) = app
        .call(empty_request(
            "GET",
            "/api/v1/subscriptions/subscribers",
            Some(&alice.access_token),
        ))
        .await;
    let mut names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["username"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["bob", "carol"]);

    let (_, body) = app
        .call(empty_request(
            "GET",
            "/api/v1/subscriptions/channels",
            Some(&bob.access_token),
        ))
        .await;
    let channels = body["data"].as_array().unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0]["id"], alice.id.as_str());

    let (_, body) = app
        .call(empty_request(
            "POST",
            &format!("/api/v1/subscriptions/c/{}", alice.id),
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(body["data"]["subscribed"], false);

    let (status, _) = app
        .call(empty_request(
            "POST",
            "/api/v1/subscriptions/c/nobody",
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_playlist_lifecycle() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let first = app.publish_video(&alice.access_token, "first").await;
    let second = app.publish_video(&bob.access_token, "second").await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    let (status, body) = app
        .call(json_request(
            "POST",
            "/api/v1/playlists",
            Some(&alice.access_token),
            &json!({ "name": "Favourites", "description": "Best of" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let playlist_id = body["data"]["id"].as_str().unwrap().to_string();

    for video_id in [second_id, first_id] {
        let (status, _) = app
            .call(empty_request(
                "POST",
                &format!("/api/v1/playlists/add/{}/{}", playlist_id, video_id),
                Some(&alice.access_token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app
        .call(empty_request(
            "POST",
            &format!("/api/v1/playlists/add/{}/{}", playlist_id, first_id),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Public read keeps insertion order
    let (status, body) = app
        .call(empty_request(
            "GET",
            &format!("/api/v1/playlists/{}", playlist_id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalVideos"], 2);
    assert_eq!(body["data"]["videos"][0]["id"], second_id);
    assert_eq!(body["data"]["videos"][1]["id"], first_id);

    let (status, _) = app
        .call(empty_request(
            "POST",
            &format!("/api/v1/playlists/add/{}/{}", playlist_id, first_id),
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let remove_uri = format!("/api/v1/playlists/remove/{}/{}", playlist_id, second_id);
    let (status, body) = app
        .call(empty_request("PATCH", &remove_uri, Some(&alice.access_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalVideos"], 1);

    let (status, _) = app
        .call(empty_request("PATCH", &remove_uri, Some(&alice.access_token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .call(empty_request(
            "GET",
            &format!("/api/v1/playlists/user/{}", alice.id),
            None,
        ))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = app
        .call(empty_request(
            "GET",
            "/api/v1/playlists",
            Some(&bob.access_token),
        ))
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_playlist_add_unknown_video_or_playlist() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let video = app.publish_video(&alice.access_token, "v").await;

    let (_, body) = app
        .call(json_request(
            "POST",
            "/api/v1/playlists",
            Some(&alice.access_token),
            &json!({ "name": "p", "description": "d" }),
        ))
        .await;
    let playlist_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call(empty_request(
            "POST",
            &format!("/api/v1/playlists/add/{}/missing", playlist_id),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(empty_request(
            "POST",
            &format!("/api/v1/playlists/add/missing/{}", video["id"].as_str().unwrap()),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_delete_playlist() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let (_, body) = app
        .call(json_request(
            "POST",
            "/api/v1/playlists",
            Some(&alice.access_token),
            &json!({ "name": "Old", "description": "Same" }),
        ))
        .await;
    let uri = format!("/api/v1/playlists/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = app
        .call(json_request(
            "PATCH",
            &uri,
            Some(&alice.access_token),
            &json!({ "name": "New" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(json_request(
            "PATCH",
            &uri,
            Some(&alice.access_token),
            &json!({ "name": "Old", "description": "Same" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(json_request(
            "PATCH",
            &uri,
            Some(&bob.access_token),
            &json!({ "name": "New", "description": "Same" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(json_request(
            "PATCH",
            &uri,
            Some(&alice.access_token),
            &json!({ "name": "New", "description": "Same" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "New");

    let (status, _) = app
        .call(empty_request("DELETE", &uri, Some(&bob.access_token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(empty_request("DELETE", &uri, Some(&alice.access_token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dashboard() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let first = app.publish_video(&alice.access_token, "first").await;
    let second = app.publish_video(&alice.access_token, "second").await;
    let first_id = first["id"].as_str().unwrap();

    for _ in 0..3 {
        app.call(empty_request(
            "GET",
            &format!("/api/v1/videos/{}", first_id),
            None,
        ))
        .await;
    }
    app.call(empty_request(
        "POST",
        &format!("/api/v1/likes/toggle/v/{}", first_id),
        Some(&bob.access_token),
    ))
    .await;
    app.call(empty_request(
        "POST",
        &format!("/api/v1/subscriptions/c/{}", alice.id),
        Some(&bob.access_token),
    ))
    .await;

    let (status, body) = app
        .call(empty_request(
            "GET",
            &format!("/api/v1/dashboard/stats/{}", alice.id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["videoStats"]["totalVideos"], 2);
    assert_eq!(stats["videoStats"]["totalViews"], 3);
    assert_eq!(stats["subscribersCount"], 1);
    assert_eq!(stats["likeStats"]["likedVideosCount"], 1);
    assert_eq!(stats["likeStats"]["likedCommentsCount"], 0);
    assert_eq!(stats["likeStats"]["likedTweetsCount"], 0);

    let (status, body) = app
        .call(empty_request(
            "GET",
            &format!("/api/v1/dashboard/videos/{}", alice.id),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let videos = body["data"].as_array().unwrap();
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0]["id"], second["id"]);

    for uri in [
        "/api/v1/dashboard/stats/nobody",
        "/api/v1/dashboard/videos/nobody",
    ] {
        let (status, _) = app.call(empty_request("GET", uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_drafts_stay_hidden_from_other_viewers() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let public = app.publish_video(&alice.access_token, "public").await;
    let draft = app.publish_video(&alice.access_token, "secret draft").await;
    let public_id = public["id"].as_str().unwrap();
    let draft_id = draft["id"].as_str().unwrap();

    let (_, body) = app
        .call(json_request(
            "POST",
            "/api/v1/playlists",
            Some(&alice.access_token),
            &json!({ "name": "Mine", "description": "d" }),
        ))
        .await;
    let playlist_id = body["data"]["id"].as_str().unwrap().to_string();
    for video_id in [public_id, draft_id] {
        let (status, _) = app
            .call(empty_request(
                "POST",
                &format!("/api/v1/playlists/add/{}/{}", playlist_id, video_id),
                Some(&alice.access_token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app
        .call(empty_request(
            "PATCH",
            &format!("/api/v1/videos/togglePublishStatus/{}", draft_id),
            Some(&alice.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let playlist_uri = format!("/api/v1/playlists/{}", playlist_id);
    let channel_uri = format!("/api/v1/dashboard/videos/{}", alice.id);

    for token in [None, Some(bob.access_token.as_str())] {
        let (status, body) = app.call(empty_request("GET", &playlist_uri, token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalVideos"], 1);
        assert_eq!(body["data"]["videos"][0]["id"], public_id);

        let (status, body) = app.call(empty_request("GET", &channel_uri, token)).await;
        assert_eq!(status, StatusCode::OK);
        let videos = body["data"].as_array().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0]["id"], public_id);
    }

    let (_, body) = app
        .call(empty_request("GET", &playlist_uri, Some(&alice.access_token)))
        .await;
    assert_eq!(body["data"]["totalVideos"], 2);
    let (_, body) = app
        .call(empty_request("GET", &channel_uri, Some(&alice.access_token)))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Someone else's draft cannot be liked or added to a playlist
    let (status, _) = app
        .call(empty_request(
            "POST",
            &format!("/api/v1/likes/toggle/v/{}", draft_id),
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .call(json_request(
            "POST",
            "/api/v1/playlists",
            Some(&bob.access_token),
            &json!({ "name": "Bob's", "description": "d" }),
        ))
        .await;
    let bob_playlist = body["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .call(empty_request(
            "POST",
            &format!("/api/v1/playlists/add/{}/{}", bob_playlist, draft_id),
            Some(&bob.access_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
