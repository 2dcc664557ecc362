use agora::config::Config;
use agora::db;
use agora::routes;
use agora::state::AppState;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: AppState,
    _tmp: TempDir,
}

fn setup() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let pool = db::create_pool(&tmp.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    let state = AppState::new(pool, config);

    TestApp {
        app: routes::router(state.clone()),
        state,
        _tmp: tmp,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Register `name` and return the `session=...` cookie pair.
    async fn register(&self, name: &str) -> String {
        let body = format!("name={0}&email={0}%40example.com&password=Secret123", name);
        let response = self.post_form("/register", None, &body).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("registration sets a session cookie")
    }

    /// Create a post as `cookie` and return its id.
    async fn create_post(&self, cookie: &str, title: &str, categories: &[&str]) -> i64 {
        let mut body = format!("title={}&content=Some+content", title);
        for category in categories {
            body.push_str(&format!("&categories={}", category));
        }
        let response = self.post_form("/create/post", Some(cookie), &body).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        location(&response)
            .trim_start_matches("/posts/")
            .parse()
            .unwrap()
    }

    fn dislikes(&self, post_id: i64) -> i64 {
        self.state.posts.get_post(post_id, None).unwrap().dislikes
    }
}

fn session_cookie(response: &Response<Body>) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = value.split(';').next()?.trim();
    if pair.ends_with('=') {
        None
    } else {
        Some(pair.to_string())
    }
}

fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn registration_signs_the_user_in() {
    let app = setup();
    let response = app
        .post_form(
            "/register",
            None,
            "name=alice&email=alice%40example.com&password=Secret123",
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=86400"));

    let cookie = session_cookie(&response).unwrap();
    let home = app.get("/", Some(&cookie)).await;
    assert_eq!(home.status(), StatusCode::OK);
    assert!(body_text(home).await.contains("alice"));
}

#[tokio::test]
async fn duplicate_registration_is_rejected_without_a_session() {
    let app = setup();
    app.register("alice").await;

    let response = app
        .post_form(
            "/register",
            None,
            "name=alice&email=other%40example.com&password=Secret123",
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(body_text(response)
        .await
        .contains("This username is already taken"));

    let response = app
        .post_form(
            "/register",
            None,
            "name=bob&email=alice%40example.com&password=Secret123",
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("This email is already registered"));
}

#[tokio::test]
async fn weak_password_is_rejected() {
    let app = setup();
    let response = app
        .post_form(
            "/register",
            None,
            "name=alice&email=alice%40example.com&password=secret123",
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn login_replaces_older_sessions() {
    let app = setup();
    let first = app.register("alice").await;

    let wrong = app
        .post_form("/login", None, "username=alice&password=Wrong1234")
        .await;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    assert!(wrong.headers().get(header::SET_COOKIE).is_none());

    let response = app
        .post_form(
            "/login",
            None,
            "username=alice%40example.com&password=Secret123",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let second = session_cookie(&response).unwrap();
    assert_ne!(first, second);

    // Only the newest session survives a fresh login
    let stale = app.get("/create/post", Some(&first)).await;
    assert_eq!(stale.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&stale), "/login");

    let fresh = app.get("/create/post", Some(&second)).await;
    assert_eq!(fresh.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = setup();
    let cookie = app.register("alice").await;

    let response = app.get("/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let after = app.get("/create/post", Some(&cookie)).await;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&after), "/login");
}

#[tokio::test]
async fn guests_are_sent_to_login() {
    let app = setup();

    for uri in ["/create/post", "/?filter=mine", "/?filter=liked"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), "/login");
    }

    let response = app
        .post_form("/reaction/", None, "target=post&id=1&type=like")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = app.get("/?filter=mine", Some("session=not-a-real-token")).await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn posts_are_filtered_by_category() {
    let app = setup();
    let cookie = app.register("alice").await;
    app.create_post(&cookie, "Quantum", &["Science"]).await;
    app.create_post(&cookie, "Pixels", &["Art", "Gaming"]).await;

    let response = app.get("/?category=Science", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Quantum"));
    assert!(!body.contains("Pixels"));

    let body = body_text(app.get("/?category=Gaming&category=Science", None).await).await;
    assert!(body.contains("Quantum"));
    assert!(body.contains("Pixels"));

    let response = app.get("/?category=Cooking", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_post_is_not_stored() {
    let app = setup();
    let cookie = app.register("alice").await;

    let response = app
        .post_form("/create/post", Some(&cookie), "title=Hello&content=World")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("Pick at least one category"));

    let posts = app
        .state
        .posts
        .list_posts(Default::default(), &[], None)
        .unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn dislikes_from_two_users_toggle_independently() {
    let app = setup();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post_id = app.create_post(&alice, "Hot+take", &["Other"]).await;
    let dislike = format!("target=post&id={}&type=dislike&redirect=home", post_id);

    let response = app.post_form("/reaction/", Some(&bob), &dislike).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert_eq!(app.dislikes(post_id), 1);

    app.post_form("/reaction/", Some(&alice), &dislike).await;
    assert_eq!(app.dislikes(post_id), 2);

    app.post_form("/reaction/", Some(&bob), &dislike).await;
    assert_eq!(app.dislikes(post_id), 1);

    let post = app.state.posts.get_post(post_id, None).unwrap();
    assert_eq!(post.likes, 0);
}

#[tokio::test]
async fn comments_and_their_reactions_return_to_the_post() {
    let app = setup();
    let cookie = app.register("alice").await;
    let post_id = app.create_post(&cookie, "Hello", &["Technology"]).await;
    let post_uri = format!("/posts/{}", post_id);

    let response = app
        .post_form(&post_uri, Some(&cookie), "content=First%21")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), post_uri);

    let empty = app.post_form(&post_uri, Some(&cookie), "content=++").await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let post = app.state.posts.get_post(post_id, None).unwrap();
    assert_eq!(post.comment_count, 1);
    let comment_id = post.comments[0].id;

    let response = app
        .post_form(
            "/reaction/",
            Some(&cookie),
            &format!("target=comment&id={}&type=like&redirect=home", comment_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), post_uri);

    let page = app.get(&post_uri, None).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_text(page).await.contains("First!"));
}

#[tokio::test]
async fn unknown_redirect_is_rejected_before_reacting() {
    let app = setup();
    let cookie = app.register("alice").await;
    let post_id = app.create_post(&cookie, "Hello", &["Art"]).await;

    let response = app
        .post_form(
            "/reaction/",
            Some(&cookie),
            &format!("target=post&id={}&type=dislike&redirect=elsewhere", post_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.dislikes(post_id), 0);
}

#[tokio::test]
async fn missing_things_are_404_and_wrong_methods_405() {
    let app = setup();
    let cookie = app.register("alice").await;

    assert_eq!(app.get("/posts/999", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/posts/abc", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/nowhere", None).await.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_form("/reaction/", Some(&cookie), "target=post&id=999&type=like")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(
        app.get("/reaction/", Some(&cookie)).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(
        app.post_form("/", None, "").await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
}

#[tokio::test]
async fn stylesheet_is_served() {
    let app = setup();
    let response = app.get("/statics/css/style.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

    let missing = app.get("/statics/css/missing.css", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_dislike_withdraws_it() {
    let app = setup();
    let a = app.register("a_user").await;
    let b = app.register("b_user").await;
    let post_id = app.create_post(&a, "Hello", &["Technology"]).await;
    let dislike = format!("target=post&id={}&type=dislike&redirect=post", post_id);

    let response = app.post_form("/reaction/", Some(&b), &dislike).await;
    assert_eq!(location(&response), format!("/posts/{}", post_id));
    let post = app.state.posts.get_post(post_id, None).unwrap();
    assert_eq!((post.likes, post.dislikes), (0, 1));

    app.post_form("/reaction/", Some(&b), &dislike).await;
    let post = app.state.posts.get_post(post_id, None).unwrap();
    assert_eq!((post.likes, post.dislikes), (0, 0));
}

#[tokio::test]
async fn multi_category_post_matches_any_of_its_categories() {
    let app = setup();
    let cookie = app.register("alice").await;
    app.create_post(&cookie, "Crossover", &["Science", "Other"]).await;

    let body = body_text(app.get("/?category=Other", None).await).await;
    assert!(body.contains("Crossover"));

    let body = body_text(app.get("/?category=Gaming", None).await).await;
    assert!(!body.contains("Crossover"));
}

#[tokio::test]
async fn bad_form_bodies_render_the_error_page() {
    let app = setup();
    let cookie = app.register("alice").await;

    let json_login = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username":"alice","password":"Secret123"}"#))
        .unwrap();
    let response = app.send(json_login).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Invalid form submission"));

    let plain_post = Request::builder()
        .method("POST")
        .uri("/create/post")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("title=Hello&content=World&categories=Art"))
        .unwrap();
    let response = app.send(plain_post).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app
        .state
        .posts
        .list_posts(Default::default(), &[], None)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn wrong_method_renders_the_error_page() {
    let app = setup();
    let response = app.get("/reaction/", None).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_text(response).await;
    assert!(body.contains("405"));
    assert!(body.contains("Method not allowed"));
}

#[tokio::test]
async fn email_login_reaches_the_address_owner() {
    let app = setup();

    let response = app
        .post_form(
            "/register",
            None,
            "name=bob%40example.com&email=squat%40example.com&password=Secret123",
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("cannot contain"));

    app.register("bob").await;
    let response = app
        .post_form(
            "/login",
            None,
            "username=bob%40example.com&password=Secret123",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(session_cookie(&response).is_some());
}
