#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{bearer, cleanup_user, create_user, db_state, keys, lazy_state, login, unique_username, PASSWORD};
use taskdesk::auth::{RefreshResponse, TokenKind};
use taskdesk::models::{NewUser, PublicUser, User};
use taskdesk::AppError;

#[actix_rt::test]
async fn test_blank_login_fields_are_rejected() {
    let media = tempfile::tempdir().unwrap();
    let app = init_app!(lazy_state(media.path()));

    let req = test::TestRequest::post()
        .uri("/api/auth/login/")
        .set_json(json!({"username": "", "password": "x"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["fields"]["username"][0], "This field may not be blank.");

    let req = test::TestRequest::post()
        .uri("/api/auth/login/")
        .set_json(json!({"username": "alice"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_refresh_issues_new_access_token() {
    let media = tempfile::tempdir().unwrap();
    let app = init_app!(lazy_state(media.path()));
    let refresh = keys().issue_refresh(17).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh/")
        .set_json(json!({ "refresh": refresh }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: RefreshResponse = test::read_body_json(resp).await;
    let claims = keys().verify(&body.access, TokenKind::Access).unwrap();
    assert_eq!(claims.sub, 17);
}

#[actix_rt::test]
async fn test_refresh_rejects_access_and_garbage_tokens() {
    let media = tempfile::tempdir().unwrap();
    let app = init_app!(lazy_state(media.path()));

    for token in [keys().issue_access(17).unwrap(), "not.a.token".to_string()] {
        let req = test::TestRequest::post()
            .uri("/api/auth/refresh/")
            .set_json(json!({ "refresh": token }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

#[actix_rt::test]
async fn test_current_user_requires_token() {
    let media = tempfile::tempdir().unwrap();
    let app = init_app!(lazy_state(media.path()));

    let req = test::TestRequest::get().uri("/api/auth/user/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_login_and_current_user() {
    let media = tempfile::tempdir().unwrap();
    let state = db_state(media.path()).await;
    let app = init_app!(state);
    let user = create_user(&state.pool, "login").await;

    let tokens = login(&app, &user.username, PASSWORD).await;
    assert_eq!(tokens.user.id, user.id);
    assert_eq!(tokens.user.username, user.username);
    assert_eq!(tokens.user.name, "");
    assert_eq!(tokens.user.profile_picture_url, None);
    assert!(!tokens.user.is_admin);
    assert!(keys().verify(&tokens.refresh, TokenKind::Refresh).is_ok());

    let req = test::TestRequest::get()
        .uri("/api/auth/user/")
        .insert_header(bearer(&tokens.access))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: PublicUser = test::read_body_json(resp).await;
    assert_eq!(me, tokens.user);

    cleanup_user(&state.pool, user.id).await;
}

#[actix_rt::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_login_failures_are_indistinguishable() {
    let media = tempfile::tempdir().unwrap();
    let state = db_state(media.path()).await;
    let app = init_app!(state);
    let active = create_user(&state.pool, "active").await;
    let inactive = create_user(&state.pool, "inactive").await;
    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(inactive.id)
        .execute(&state.pool)
        .await
        .unwrap();

    let attempts = [
        (unique_username("ghost"), PASSWORD.to_string()),
        (active.username.clone(), "wrong-password".to_string()),
        (inactive.username.clone(), PASSWORD.to_string()),
    ];
    let mut bodies = Vec::new();
    for (username, password) in attempts {
        let req = test::TestRequest::post()
            .uri("/api/auth/login/")
            .set_json(json!({ "username": username, "password": password }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        bodies.push(test::read_body(resp).await);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);

    cleanup_user(&state.pool, active.id).await;
    cleanup_user(&state.pool, inactive.id).await;
}

#[actix_rt::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_staff_user_is_admin() {
    let media = tempfile::tempdir().unwrap();
    let state = db_state(media.path()).await;
    let app = init_app!(state);
    let username = unique_username("staff");
    let staff = User::provision(
        &state.pool,
        &NewUser {
            email: format!("{}@example.com", username),
            username: username.clone(),
            password: PASSWORD.to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            is_staff: true,
        },
    )
    .await
    .unwrap();

    let tokens = login(&app, &username, PASSWORD).await;
    assert!(tokens.user.is_admin);
    assert_eq!(tokens.user.name, "Grace Hopper");

    let duplicate = User::provision(
        &state.pool,
        &NewUser {
            email: "other@example.com".to_string(),
            username,
            password: PASSWORD.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    cleanup_user(&state.pool, staff.id).await;
}

#[actix_rt::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_provisioned_user_has_one_profile_and_cascades() {
    let media = tempfile::tempdir().unwrap();
    let state = db_state(media.path()).await;
    let app = init_app!(state);
    let user = create_user(&state.pool, "cascade").await;

    let (profiles,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM user_profiles WHERE user_id = $1 AND profile_picture IS NULL",
    )
    .bind(user.id)
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert_eq!(profiles, 1);

    let token = login(&app, &user.username, PASSWORD).await.access;
    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(bearer(&token))
        .set_json(json!({"title": "Doomed", "description": ""}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user.id)
        .execute(&state.pool)
        .await
        .unwrap();

    for table in ["tasks", "user_profiles"] {
        let column = if table == "tasks" { "owner_id" } else { "user_id" };
        let (left,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {} WHERE {} = $1", table, column))
                .bind(user.id)
                .fetch_one(&state.pool)
                .await
                .unwrap();
        assert_eq!(left, 0, "rows left in {}", table);
    }
}

#[actix_rt::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_unusable_password_hash_is_bad_credentials() {
    let media = tempfile::tempdir().unwrap();
    let state = db_state(media.path()).await;
    let app = init_app!(state);
    let healthy = create_user(&state.pool, "healthy").await;
    let broken = create_user(&state.pool, "broken").await;
    sqlx::query("UPDATE users SET password_hash = 'not-a-bcrypt-hash' WHERE id = $1")
        .bind(broken.id)
        .execute(&state.pool)
        .await
        .unwrap();

    let mut bodies = Vec::new();
    for (username, password) in [(&healthy.username, "wrong-password"), (&broken.username, PASSWORD)] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login/")
            .set_json(json!({ "username": username, "password": password }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        bodies.push(test::read_body(resp).await);
    }
    assert_eq!(bodies[0], bodies[1]);

    cleanup_user(&state.pool, healthy.id).await;
    cleanup_user(&state.pool, broken.id).await;
}
