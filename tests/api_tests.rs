// tests/api_tests.rs

use chrono::Utc;
use codetrack::{config::Config, routes, state::AppState, utils::token::sign_token};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL, the shared pool for seeding, and the config.
async fn spawn_app() -> (String, SqlitePool, Config) {
    // One connection keeps every request on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate test database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        token_secret: "test_secret_for_integration_tests".to_string(),
        token_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
    };

    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool, config)
}

async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, display_name, created_at) VALUES (?, ?, ?)")
        .bind(username)
        .bind(username)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn seed_course(pool: &SqlitePool) -> i64 {
    sqlx::query("INSERT INTO courses (name, title, term_name) VALUES (?, ?, ?)")
        .bind("CS 101")
        .bind("Intro to Programming")
        .bind("Fall 2026")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn register(pool: &SqlitePool, course_id: i64, user_id: i64, role: &str, section: i64) {
    sqlx::query(
        "INSERT INTO course_registrations (course_id, user_id, role, section)
         VALUES (?, ?, ?, ?)",
    )
    .bind(course_id)
    .bind(user_id)
    .bind(role)
    .bind(section)
    .execute(pool)
    .await
    .unwrap();
}

fn bearer(config: &Config, user_id: i64, username: &str) -> String {
    let token = sign_token(user_id, username, &config.token_secret, 600).unwrap();
    format!("Bearer {}", token)
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let (address, _pool, _config) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn missing_token_is_unauthenticated() {
    let (address, _pool, _config) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/courses", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn garbage_token_is_unauthenticated() {
    let (address, _pool, _config) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/courses", address))
        .header("Authorization", "Bearer not_a_real_token")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn courses_listing_pairs_course_with_registration() {
    let (address, pool, config) = spawn_app().await;
    let client = reqwest::Client::new();

    let username = unique_name("u");
    let user = seed_user(&pool, &username).await;
    let course = seed_course(&pool).await;
    register(&pool, course, user, "student", 3).await;

    let body: serde_json::Value = client
        .get(format!("{}/api/courses", address))
        .header("Authorization", bearer(&config, user, &username))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["course"]["name"], "CS 101");
    assert_eq!(entries[0]["registration"]["role"], "student");
    assert_eq!(entries[0]["registration"]["section"], 3);
}

#[tokio::test]
async fn test_submit_flow_end_to_end() {
    // Arrange: one instructor and one student in section 1.
    let (address, pool, config) = spawn_app().await;
    let client = reqwest::Client::new();

    let prof_name = unique_name("prof");
    let student_name = unique_name("student");
    let prof = seed_user(&pool, &prof_name).await;
    let student = seed_user(&pool, &student_name).await;
    let course = seed_course(&pool).await;
    register(&pool, course, prof, "instructor", 1).await;
    register(&pool, course, student, "student", 1).await;

    let prof_auth = bearer(&config, prof, &prof_name);
    let student_auth = bearer(&config, student, &student_name);

    // 1. Instructor imports an exercise with a single test case.
    let import_resp = client
        .post(format!("{}/api/courses/{}/problems/import", address, course))
        .header("Authorization", &prof_auth)
        .json(&serde_json::json!({
            "problem": {
                "title": "Return Zero",
                "description": "Make main return 0",
                "visible": true
            },
            "test_cases": [
                {"name": "exit_code", "input": "", "expected_output": "0", "secret": false}
            ]
        }))
        .send()
        .await
        .expect("Import failed");
    assert_eq!(import_resp.status().as_u16(), 201);
    let problem: serde_json::Value = import_resp.json().await.unwrap();
    let problem_id = problem["id"].as_i64().unwrap();

    // 2. Instructor reads back the full test cases to grade against.
    let test_cases: serde_json::Value = client
        .get(format!("{}/api/problems/{}/test-cases", address, problem_id))
        .header("Authorization", &prof_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let test_case_id = test_cases[0]["id"].as_i64().unwrap();

    // 3. Student types: a full-text checkpoint, then an incremental edit
    //    adding the return statement.
    let append_resp = client
        .post(format!("{}/api/changes", address))
        .header("Authorization", &student_auth)
        .json(&serde_json::json!({
            "problem_id": problem_id,
            "changes": [{
                "revision": 0,
                "payload": {"kind": "full_text", "text": "int main(){}"},
                "client_time": Utc::now().to_rfc3339()
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(append_resp.status().as_u16(), 201);

    let append_resp = client
        .post(format!("{}/api/changes", address))
        .header("Authorization", &student_auth)
        .json(&serde_json::json!({
            "problem_id": problem_id,
            "changes": [{
                "revision": 1,
                "payload": {"kind": "delta", "position": 11, "removed": "", "inserted": "return 0;"},
                "client_time": Utc::now().to_rfc3339()
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(append_resp.status().as_u16(), 201);
    let outcome: serde_json::Value = append_resp.json().await.unwrap();
    assert_eq!(outcome["last_revision"], 1);

    // 4. Replaying revision 1 again conflicts: the client must resync.
    let stale_resp = client
        .post(format!("{}/api/changes", address))
        .header("Authorization", &student_auth)
        .json(&serde_json::json!({
            "problem_id": problem_id,
            "changes": [{
                "revision": 1,
                "payload": {"kind": "delta", "position": 0, "removed": "", "inserted": "//"},
                "client_time": Utc::now().to_rfc3339()
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(stale_resp.status().as_u16(), 409);
    let body: serde_json::Value = stale_resp.json().await.unwrap();
    assert_eq!(body["error"], "revision_conflict");

    // 5. Catch-up sync returns both changes in order.
    let changes: serde_json::Value = client
        .get(format!(
            "{}/api/problems/{}/changes?since=-1",
            address, problem_id
        ))
        .header("Authorization", &student_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let changes = changes.as_array().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0]["revision"], 0);
    assert_eq!(changes[0]["payload"]["kind"], "full_text");
    assert_eq!(changes[1]["revision"], 1);

    // 6. The external grader ran the snapshot: 1 of 1 tests passed.
    let record_resp = client
        .post(format!("{}/api/submissions", address))
        .header("Authorization", &student_auth)
        .json(&serde_json::json!({
            "problem_id": problem_id,
            "revision": 1,
            "status": "tests_passed",
            "results": [
                {"test_case_id": test_case_id, "outcome": "passed", "stdout": "0", "elapsed_ms": 7}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(record_resp.status().as_u16(), 201);
    let receipt: serde_json::Value = record_resp.json().await.unwrap();
    assert_eq!(receipt["score"], 1.0);
    assert_eq!(receipt["num_tests_passed"], 1);

    // 7. Standings for the section carry the student's best receipt.
    let standings: serde_json::Value = client
        .get(format!(
            "{}/api/problems/{}/standings?section=1",
            address, problem_id
        ))
        .header("Authorization", &prof_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let standings = standings.as_array().unwrap();
    assert_eq!(standings.len(), 1);
    assert_eq!(standings[0]["user"]["username"], student_name);
    assert_eq!(standings[0]["receipt"]["score"], 1.0);

    // 8. Standings are an instructor view.
    let forbidden = client
        .get(format!(
            "{}/api/problems/{}/standings?section=1",
            address, problem_id
        ))
        .header("Authorization", &student_auth)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    // 9. The summary roll-up agrees.
    let summary: serde_json::Value = client
        .get(format!("{}/api/problems/{}/summary", address, problem_id))
        .header("Authorization", &prof_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["num_students_attempted"], 1);
    assert_eq!(summary["num_students_passed"], 1);
}

#[tokio::test]
async fn test_quiz_flow_over_http() {
    let (address, pool, config) = spawn_app().await;
    let client = reqwest::Client::new();

    let prof_name = unique_name("prof");
    let student_name = unique_name("student");
    let prof = seed_user(&pool, &prof_name).await;
    let student = seed_user(&pool, &student_name).await;
    let course = seed_course(&pool).await;
    register(&pool, course, prof, "instructor", 1).await;
    register(&pool, course, student, "student", 1).await;

    let prof_auth = bearer(&config, prof, &prof_name);
    let student_auth = bearer(&config, student, &student_name);

    // A hidden problem: the quiz session is what makes it reachable.
    let import_resp = client
        .post(format!("{}/api/courses/{}/problems/import", address, course))
        .header("Authorization", &prof_auth)
        .json(&serde_json::json!({
            "problem": {
                "title": "Pop Quiz",
                "description": "Surprise!",
                "visible": false
            },
            "test_cases": [
                {"name": "t1", "input": "", "expected_output": "ok"}
            ]
        }))
        .send()
        .await
        .unwrap();
    let problem: serde_json::Value = import_resp.json().await.unwrap();
    let problem_id = problem["id"].as_i64().unwrap();

    let append = |auth: String, revision: i64| {
        let client = client.clone();
        let address = address.clone();
        async move {
            client
                .post(format!("{}/api/changes", address))
                .header("Authorization", auth)
                .json(&serde_json::json!({
                    "problem_id": problem_id,
                    "changes": [{
                        "revision": revision,
                        "payload": {"kind": "full_text", "text": "x"},
                        "client_time": Utc::now().to_rfc3339()
                    }]
                }))
                .send()
                .await
                .unwrap()
        }
    };

    // Hidden problem: no edits before the session starts.
    assert_eq!(append(student_auth.clone(), 0).await.status().as_u16(), 403);

    // Students cannot start quizzes.
    let start = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", &student_auth)
        .json(&serde_json::json!({"problem_id": problem_id, "section": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(start.status().as_u16(), 403);

    // Instructor starts the session for section 1.
    let start = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", &prof_auth)
        .json(&serde_json::json!({"problem_id": problem_id, "section": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(start.status().as_u16(), 201);
    let session: serde_json::Value = start.json().await.unwrap();
    let session_id = session["id"].as_i64().unwrap();
    assert!(session["end_time"].is_null());

    // Starting again for the same pair conflicts.
    let duplicate = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", &prof_auth)
        .json(&serde_json::json!({"problem_id": problem_id, "section": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status().as_u16(), 409);
    let body: serde_json::Value = duplicate.json().await.unwrap();
    assert_eq!(body["error"], "session_already_active");

    // The quiz window opens the problem to the section.
    assert_eq!(append(student_auth.clone(), 0).await.status().as_u16(), 201);

    // The student polls the running quiz; end_time is projected to "now".
    let current: serde_json::Value = client
        .get(format!("{}/api/problems/{}/quiz", address, problem_id))
        .header("Authorization", &student_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["id"].as_i64().unwrap(), session_id);
    assert!(!current["end_time"].is_null());

    // Only an instructor may end the session.
    let end = client
        .post(format!("{}/api/quizzes/{}/end", address, session_id))
        .header("Authorization", &student_auth)
        .send()
        .await
        .unwrap();
    assert_eq!(end.status().as_u16(), 403);

    let end = client
        .post(format!("{}/api/quizzes/{}/end", address, session_id))
        .header("Authorization", &prof_auth)
        .send()
        .await
        .unwrap();
    assert_eq!(end.status().as_u16(), 200);

    // Ending twice is rejected, not silently ignored.
    let end_again = client
        .post(format!("{}/api/quizzes/{}/end", address, session_id))
        .header("Authorization", &prof_auth)
        .send()
        .await
        .unwrap();
    assert_eq!(end_again.status().as_u16(), 409);
    let body: serde_json::Value = end_again.json().await.unwrap();
    assert_eq!(body["error"], "already_ended");

    // With the session over, the hidden problem closes again.
    assert_eq!(append(student_auth.clone(), 1).await.status().as_u16(), 403);

    // And no current session is reported.
    let current: serde_json::Value = client
        .get(format!("{}/api/problems/{}/quiz", address, problem_id))
        .header("Authorization", &student_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(current.is_null());
}

#[tokio::test]
async fn test_export_round_trips_the_import() {
    let (address, pool, config) = spawn_app().await;
    let client = reqwest::Client::new();

    let prof_name = unique_name("prof");
    let prof = seed_user(&pool, &prof_name).await;
    let course = seed_course(&pool).await;
    register(&pool, course, prof, "instructor", 1).await;
    let prof_auth = bearer(&config, prof, &prof_name);

    let document = serde_json::json!({
        "problem": {
            "title": "FizzBuzz",
            "description": "The classic",
            "visible": true
        },
        "test_cases": [
            {"name": "small", "input": "3", "expected_output": "Fizz", "secret": false},
            {"name": "large", "input": "15", "expected_output": "FizzBuzz", "secret": true}
        ]
    });

    let import_resp = client
        .post(format!("{}/api/courses/{}/problems/import", address, course))
        .header("Authorization", &prof_auth)
        .json(&document)
        .send()
        .await
        .unwrap();
    assert_eq!(import_resp.status().as_u16(), 201);
    let problem: serde_json::Value = import_resp.json().await.unwrap();
    let problem_id = problem["id"].as_i64().unwrap();

    let exported: serde_json::Value = client
        .get(format!("{}/api/problems/{}/export", address, problem_id))
        .header("Authorization", &prof_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(exported, document);
}

#[tokio::test]
async fn test_students_see_only_nonsecret_test_case_names() {
    let (address, pool, config) = spawn_app().await;
    let client = reqwest::Client::new();

    let prof_name = unique_name("prof");
    let student_name = unique_name("student");
    let prof = seed_user(&pool, &prof_name).await;
    let student = seed_user(&pool, &student_name).await;
    let course = seed_course(&pool).await;
    register(&pool, course, prof, "instructor", 1).await;
    register(&pool, course, student, "student", 1).await;

    let prof_auth = bearer(&config, prof, &prof_name);
    let student_auth = bearer(&config, student, &student_name);

    let import_resp = client
        .post(format!("{}/api/courses/{}/problems/import", address, course))
        .header("Authorization", &prof_auth)
        .json(&serde_json::json!({
            "problem": {"title": "P", "description": "D", "visible": true},
            "test_cases": [
                {"name": "public_case", "input": "1", "expected_output": "1", "secret": false},
                {"name": "secret_case", "input": "2", "expected_output": "2", "secret": true}
            ]
        }))
        .send()
        .await
        .unwrap();
    let problem: serde_json::Value = import_resp.json().await.unwrap();
    let problem_id = problem["id"].as_i64().unwrap();

    let student_view: serde_json::Value = client
        .get(format!("{}/api/problems/{}/test-cases", address, problem_id))
        .header("Authorization", &student_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let cases = student_view.as_array().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0]["name"], "public_case");
    // No grading data leaks to students.
    assert!(cases[0].get("expected_output").is_none());

    let instructor_view: serde_json::Value = client
        .get(format!("{}/api/problems/{}/test-cases", address, problem_id))
        .header("Authorization", &prof_auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(instructor_view.as_array().unwrap().len(), 2);
}
