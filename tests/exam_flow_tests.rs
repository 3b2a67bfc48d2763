// tests/exam_flow_tests.rs

//! End-to-end flows against a real Postgres (`DATABASE_URL`).
//! Each test returns early when the variable is not set.

mod common;

use chrono::{Duration, Utc};
use common::{spawn_app, unique};
use serde_json::{Value, json};

fn exam_payload(code: &str, whitelist: &[&str], starts_in: Duration) -> Value {
    let start = Utc::now() + starts_in;
    json!({
        "title": "Data Structures Midterm",
        "duration": 60,
        "exam_code": code,
        "start_date": start.to_rfc3339(),
        "expiration_date": (start + Duration::days(1)).to_rfc3339(),
        "whitelist": whitelist,
        "questions": [
            {
                "desc": "Which structure is LIFO?",
                "type": "mcq",
                "grade": 2,
                "choices": [
                    {"desc": "Queue", "isCorrect": false},
                    {"desc": "Stack", "isCorrect": true}
                ]
            },
            {
                "desc": "Reverse a linked list",
                "type": "coding",
                "grade": 5,
                "test_cases": [{"input": "1 2 3", "output": "3 2 1"}]
            }
        ]
    })
}

#[tokio::test]
async fn creation_requires_subscription_and_respects_quota() {
    let Some(app) = spawn_app().await else { return };

    let name = unique("inst_");
    let token = app
        .register_and_login(&name, &format!("{}@uni.edu", name), "instructor")
        .await;

    // No subscription yet
    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&token)
        .json(&exam_payload(&unique("Q"), &[], Duration::days(1)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    app.subscribe_with_limit(&token, 1).await;

    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&token)
        .json(&exam_payload(&unique("Q"), &[], Duration::days(1)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Plan limit of 1 reached
    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&token)
        .json(&exam_payload(&unique("Q"), &[], Duration::days(1)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("exam limit"));

    let current: Value = app
        .client
        .get(app.url("/api/subscriptions/current"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["exams_created"], 1);
}

#[tokio::test]
async fn whitelist_access_follows_the_exam_window() {
    let Some(mut app) = spawn_app().await else { return };

    let owner_name = unique("own_");
    let owner = app
        .register_and_login(&owner_name, &format!("{}@uni.edu", owner_name), "instructor")
        .await;
    app.subscribe_with_limit(&owner, 0).await;

    let student_name = unique("stu_");
    let student_email = format!("{}@cs.example.edu", student_name);
    let student = app
        .register_and_login(&student_name, &student_email, "student")
        .await;

    let stranger_name = unique("str_");
    let stranger = app
        .register_and_login(&stranger_name, &format!("{}@elsewhere.org", stranger_name), "student")
        .await;

    let code = unique("W");
    let invited = format!("{}@uni.edu", unique("inv_"));
    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&owner)
        .json(&exam_payload(
            &code,
            &["*@cs.example.edu", &invited, "ta?@uni.edu"],
            Duration::hours(2),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // Only the literal whitelist entry is mailed.
    let invitation = app.sent.recv().await.expect("invitation");
    assert_eq!(invitation.email, invited);
    assert_eq!(invitation.exam_code, code);
    assert!(app.sent.try_recv().is_err());

    let exam_url = app.url(&format!("/api/exams/{}", code));

    // Before start
    let response = app.client.get(&exam_url).bearer_auth(&student).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not started"));

    // Not whitelisted at all
    let response = app.client.get(&exam_url).bearer_auth(&stranger).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Duration is visible to participants ahead of time
    let response = app
        .client
        .get(app.url(&format!("/api/exams/{}/duration", code)))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["duration"], 60);

    // Exam running: started 10 minutes ago
    sqlx::query("UPDATE exams SET start_date = $1 WHERE exam_code = $2")
        .bind(Utc::now() - Duration::minutes(10))
        .bind(&code)
        .execute(&app.pool)
        .await
        .unwrap();

    let body: Value = app
        .client
        .get(&exam_url)
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["questions"][0]["choices"][0]["isCorrect"], "****");
    assert_eq!(body["questions"][0]["choices"][1]["isCorrect"], "****");
    assert_eq!(body["questions"][0]["choices"][1]["desc"], "Stack");

    // Owner sees the answers
    let body: Value = app
        .client
        .get(&exam_url)
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["questions"][0]["choices"][1]["isCorrect"], true);

    // Started exams can no longer be changed
    let response = app
        .client
        .patch(&exam_url)
        .bearer_auth(&owner)
        .json(&json!({"title": "Renamed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Window over: started 2 hours ago, lasted 60 minutes
    sqlx::query("UPDATE exams SET start_date = $1 WHERE exam_code = $2")
        .bind(Utc::now() - Duration::hours(2))
        .bind(&code)
        .execute(&app.pool)
        .await
        .unwrap();

    let response = app.client.get(&exam_url).bearer_auth(&student).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "You are not authorized to view this exam.");
}

#[tokio::test]
async fn owner_edits_and_deletes_before_start() {
    let Some(app) = spawn_app().await else { return };

    let owner_name = unique("own_");
    let owner = app
        .register_and_login(&owner_name, &format!("{}@uni.edu", owner_name), "instructor")
        .await;
    app.subscribe_with_limit(&owner, 0).await;

    let other_name = unique("oth_");
    let other = app
        .register_and_login(&other_name, &format!("{}@uni.edu", other_name), "instructor")
        .await;

    let code = unique("E");
    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&owner)
        .json(&exam_payload(&code, &[], Duration::days(2)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let exam_url = app.url(&format!("/api/exams/{}", code));

    // Duplicate code
    app.subscribe_with_limit(&other, 0).await;
    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&other)
        .json(&exam_payload(&code, &[], Duration::days(2)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // Someone else cannot edit or delete
    let response = app
        .client
        .patch(&exam_url)
        .bearer_auth(&other)
        .json(&json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app.client.delete(&exam_url).bearer_auth(&other).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Owner patches the title and the group
    let body: Value = app
        .client
        .patch(&exam_url)
        .bearer_auth(&owner)
        .json(&json!({"title": "Final", "group_name": "cs-2025"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["title"], "Final");
    assert_eq!(body["group_name"], "cs-2025");
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);

    let listed: Vec<Value> = app
        .client
        .get(app.url("/api/exams"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["exam_code"], code.as_str());

    let response = app.client.delete(&exam_url).bearer_auth(&owner).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = app.client.get(&exam_url).bearer_auth(&owner).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn subscription_lifecycle() {
    let Some(app) = spawn_app().await else { return };

    let name = unique("sub_");
    let token = app
        .register_and_login(&name, &format!("{}@uni.edu", name), "instructor")
        .await;

    let response = app
        .client
        .get(app.url("/api/subscriptions/current"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let plan_id = app.subscribe_with_limit(&token, 5).await;

    // Same plan again is a no-op
    let response = app
        .client
        .post(app.url("/api/subscriptions/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "plan_id": plan_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "You are already subscribed to this plan");

    // Unknown plan
    let response = app
        .client
        .post(app.url("/api/subscriptions/subscribe"))
        .bearer_auth(&token)
        .json(&json!({ "plan_id": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .client
        .post(app.url("/api/subscriptions/cancel"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .post(app.url("/api/subscriptions/cancel"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let history: Vec<Value> = app
        .client
        .get(app.url("/api/subscriptions"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["is_active"], false);
}

#[tokio::test]
async fn question_text_is_returned_as_authored() {
    let Some(app) = spawn_app().await else { return };

    let name = unique("txt_");
    let token = app
        .register_and_login(&name, &format!("{}@uni.edu", name), "instructor")
        .await;
    app.subscribe_with_limit(&token, 0).await;

    let code = unique("T");
    let mut payload = exam_payload(&code, &[], Duration::days(1));
    payload["questions"][0]["desc"] = json!("2 < 3 && Vec<i32>");
    payload["questions"][0]["choices"][0]["desc"] = json!("A & B");

    let created: Value = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["questions"][0]["desc"], "2 < 3 && Vec<i32>");

    let fetched: Value = app
        .client
        .get(app.url(&format!("/api/exams/{}", code)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["questions"][0]["desc"], "2 < 3 && Vec<i32>");
    assert_eq!(fetched["questions"][0]["choices"][0]["desc"], "A & B");
}
