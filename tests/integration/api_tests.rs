//! API integration tests
//!
//! Run against a live server started in the development run mode, which
//! creates the bootstrap admin `admin`/`admin`:
//! `cargo test --test api_tests -- --ignored`

use reqwest::{redirect::Policy, Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080";

/// Client that reports redirects instead of following them
fn client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

/// Helper to get an admin token
async fn get_auth_token(client: &Client) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": "admin",
            "password": "admin"
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("No Location header")
        .to_string()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = client();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = client();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": "admin",
            "password": "admin"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = client();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "username": "admin",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_visit_counter_increments_per_session() {
    let client = client();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let response = client
            .get(format!("{}/catalog/", BASE_URL))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());

        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["template"], "index.html");
        seen.push(body["context"]["num_visits"].as_i64().expect("num_visits missing"));
    }

    assert_eq!(seen, vec![0, 1, 2]);
}

#[tokio::test]
#[ignore]
async fn test_book_list_pages() {
    let client = client();

    let response = client
        .get(format!("{}/catalog/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let page = &body["context"]["page_obj"];
    assert_eq!(page["number"], 1);
    assert!(body["context"]["object_list"].as_array().unwrap().len() <= 5);

    let past_end = page["num_pages"].as_i64().unwrap() + 1;
    let response = client
        .get(format!("{}/catalog/books?page={}", BASE_URL, past_end))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_borrowed_requires_login() {
    let client = client();

    let response = client
        .get(format!("{}/catalog/borrowed", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_author_lifecycle() {
    let client = client();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/catalog/author/create", BASE_URL))
        .bearer_auth(&token)
        .form(&[
            ("first_name", "Ursula"),
            ("last_name", "Le Guin"),
            ("date_of_birth", "10/21/1929"),
            ("date_of_death", ""),
        ])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let detail = location(&response);

    let body: Value = client
        .get(format!("{}{}", BASE_URL, detail))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(body["context"]["author"]["last_name"], "Le Guin");
    assert_eq!(body["context"]["author"]["date_of_birth"], "1929-10-21");
    assert!(body["context"]["author"]["date_of_death"].is_null());

    let response = client
        .post(format!("{}{}/delete", BASE_URL, detail))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/catalog/authors");

    let response = client
        .get(format!("{}{}", BASE_URL, detail))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_renewal_rejects_past_date() {
    let client = client();
    let token = get_auth_token(&client).await;

    let body: Value = client
        .get(format!("{}/catalog/borrowed", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    let copy = body["context"]["object_list"]
        .as_array()
        .and_then(|l| l.first().cloned())
        .expect("No copy on loan; seed one book instance with status 'o' before running");
    let renew_url = format!("{}/catalog/book/{}/renew", BASE_URL, copy["id"].as_str().unwrap());

    let response = client
        .post(&renew_url)
        .bearer_auth(&token)
        .form(&[("renewal_date", "2000-01-01")])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body["context"]["form"]["errors"]["renewal_date"][0],
        "Invalid date - renewal in past"
    );
    assert_eq!(body["context"]["book_instance"]["due_back"], copy["due_back"]);

    let response = client
        .get(&renew_url)
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let proposed = body["context"]["form"]["fields"]["renewal_date"].clone();

    let response = client
        .post(&renew_url)
        .bearer_auth(&token)
        .form(&[("renewal_date", proposed.as_str().unwrap())])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/catalog/borrowed");
}
