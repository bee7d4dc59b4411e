mod common;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use common::{body_json, contact_body, create_exhibition, json_request, request, spawn_app};
use expo_contacts::types::contact::ContactCreate;
use serde_json::json;

#[tokio::test]
async fn contact_defaults_to_active_exhibition() {
    let app = spawn_app().await;
    let admin = app.login_admin(1).await;

    let resp = app
        .send(json_request("POST", "/contacts", None, &contact_body("a@x.io", "+7 (999) 000-00-01")))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let ex = create_exhibition(
        &app,
        &admin,
        json!({"title": "Expo", "start_date": "2025-03-10", "end_date": "2025-03-12"}),
    )
    .await;

    let resp = app
        .send(json_request("POST", "/contacts", None, &contact_body("A@X.io", "+7 (999) 000-00-01")))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["exhibition_id"], ex["id"]);
    assert_eq!(body["exhibition"]["title"], "Expo");
    assert_eq!(body["email"], "a@x.io");
    assert!(body["author_id"].is_null());
    assert_eq!(body["questionnaire"]["product_type"], json!([1, 3]));
}

#[tokio::test]
async fn duplicates_are_rejected_within_an_exhibition() {
    let app = spawn_app().await;
    let admin = app.login_admin(1).await;
    let author = app.login(2, "Author").await;
    let first = create_exhibition(
        &app,
        &admin,
        json!({"title": "First", "start_date": "2025-03-10", "end_date": "2025-03-12"}),
    )
    .await;

    let resp = app
        .send(json_request("POST", "/contacts", Some(&author), &contact_body("dup@x.io", "8 800 555 35 35")))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["author_id"], 2);

    let resp = app
        .send(json_request("POST", "/contacts", Some(&author), &contact_body("DUP@x.io", "8 800 555 35 35")))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = body_json(resp).await;
    assert_eq!(err["error"]["code"], "DUPLICATE_CONTACT");
    assert_eq!(err["error"]["fields"], json!(["email", "phone_number"]));

    let resp = app
        .send(json_request("POST", "/contacts", Some(&author), &contact_body("new@x.io", "8 800 555 35 35")))
        .await;
    assert_eq!(body_json(resp).await["error"]["fields"], json!(["phone_number"]));

    // Same person at another exhibition is not a duplicate.
    let second = create_exhibition(
        &app,
        &admin,
        json!({"title": "Second", "start_date": "2025-05-01", "end_date": "2025-05-03"}),
    )
    .await;
    let mut body = contact_body("dup@x.io", "8 800 555 35 35");
    body["exhibition_id"] = second["id"].clone();
    let resp = app
        .send(json_request("POST", "/contacts", Some(&author), &body))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .send(json_request(
            "POST",
            "/contacts/check-duplicate",
            None,
            &json!({"email": " Dup@X.io ", "exhibition_id": first["id"]}),
        ))
        .await;
    let check = body_json(resp).await;
    assert_eq!(check["is_duplicate"], true);
    assert_eq!(check["duplicate_fields"], json!(["email"]));
    assert_eq!(check["existing_contact"]["email"], "dup@x.io");

    let resp = app
        .send(json_request(
            "POST",
            "/contacts/check-duplicate",
            None,
            &json!({"phone_number": "88005553535"}),
        ))
        .await;
    let check = body_json(resp).await;
    assert_eq!(check["is_duplicate"], false);
    assert!(check["existing_contact"].is_null());
}

#[tokio::test]
async fn invalid_fields_are_rejected() {
    let app = spawn_app().await;
    let admin = app.login_admin(1).await;
    create_exhibition(
        &app,
        &admin,
        json!({"title": "Expo", "start_date": "2025-03-10", "end_date": "2025-03-12"}),
    )
    .await;

    for body in [
        contact_body("not-an-email", "+7 999 000 00 00"),
        contact_body("ok@x.io", "12345"),
        contact_body("ok@x.io", "+7 999 000 00 00 ext#1"),
    ] {
        let resp = app.send(json_request("POST", "/contacts", None, &body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    let mut body = contact_body("ok@x.io", "+7 999 000 00 00");
    body["exhibition_id"] = json!(999);
    let resp = app.send(json_request("POST", "/contacts", None, &body)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_skips_duplicates_against_store_and_itself() {
    let app = spawn_app().await;
    let admin = app.login_admin(1).await;
    let ex = create_exhibition(
        &app,
        &admin,
        json!({"title": "Expo", "start_date": "2025-03-10", "end_date": "2025-03-12"}),
    )
    .await;
    let resp = app
        .send(json_request("POST", "/contacts", None, &contact_body("stored@x.io", "+7 900 000 00 01")))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .send(json_request(
            "POST",
            "/contacts/batch",
            Some(&admin),
            &json!({
                "exhibition_id": ex["id"],
                "contacts": [
                    contact_body("one@x.io", "+7 900 000 00 02"),
                    contact_body("stored@x.io", "+7 900 000 00 03"),
                    contact_body("two@x.io", "+7 900 000 00 02"),
                    contact_body("three@x.io", "+7 900 000 00 04"),
                ]
            }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let outcome = body_json(resp).await;
    assert_eq!(outcome["created"].as_array().unwrap().len(), 2);
    let skipped = outcome["skipped"].as_array().unwrap();
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0]["index"], 1);
    assert_eq!(skipped[0]["duplicate_fields"], json!(["email"]));
    assert_eq!(skipped[1]["index"], 2);
    assert_eq!(skipped[1]["duplicate_fields"], json!(["phone_number"]));

    let resp = app
        .send(json_request(
            "POST",
            "/contacts/batch",
            Some(&admin),
            &json!({"exhibition_id": ex["id"], "contacts": [contact_body("bad", "1")]}),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_authors_and_admins_manage_contacts() {
    let app = spawn_app().await;
    let admin = app.login_admin(1).await;
    let author = app.login(2, "Author").await;
    let other = app.login(3, "Other").await;
    create_exhibition(
        &app,
        &admin,
        json!({"title": "Expo", "start_date": "2025-03-10", "end_date": "2025-03-12"}),
    )
    .await;

    let resp = app
        .send(json_request("POST", "/contacts", Some(&author), &contact_body("c@x.io", "+7 900 111 22 33")))
        .await;
    let id = body_json(resp).await["id"].as_i64().unwrap();
    let uri = format!("/contacts/{id}");

    let resp = app
        .send(json_request("PUT", &uri, Some(&other), &json!({"city": "Omsk"})))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .send(json_request("PUT", &uri, Some(&author), &json!({"city": "Omsk", "email": "NEW@x.io"})))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await;
    assert_eq!(updated["city"], "Omsk");
    assert_eq!(updated["email"], "new@x.io");

    let resp = app.send(request("GET", "/contacts", Some(&other))).await;
    assert_eq!(body_json(resp).await["total"], 0);
    let resp = app.send(request("GET", "/contacts?search=omsk", Some(&author))).await;
    assert_eq!(body_json(resp).await["total"], 1);

    // Case folding is not limited to ASCII: "ОМСК" finds "Омск".
    let resp = app
        .send(json_request("PUT", &uri, Some(&author), &json!({"city": "Омск"})))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app
        .send(request("GET", "/contacts?search=%D0%9E%D0%9C%D0%A1%D0%9A", Some(&author)))
        .await;
    assert_eq!(body_json(resp).await["total"], 1);

    let resp = app
        .send(request("PATCH", &format!("{uri}/validate?is_validated=true&notes=checked"), Some(&author)))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = app
        .send(request("PATCH", &format!("{uri}/validate?is_validated=true&notes=checked"), Some(&admin)))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let validated = body_json(resp).await;
    assert_eq!(validated["is_validated"], true);
    assert_eq!(validated["validated_by_id"], 1);
    assert_eq!(validated["notes"], "checked");

    let resp = app.send(request("DELETE", &uri, Some(&other))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = app.send(request("DELETE", &uri, Some(&author))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.send(request("GET", &uri, Some(&admin))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_filters_by_inclusive_date_window_and_paginates() {
    let app = spawn_app().await;
    let admin = app.login_admin(1).await;
    let ex = create_exhibition(
        &app,
        &admin,
        json!({"title": "Expo", "start_date": "2025-03-10", "end_date": "2025-03-13"}),
    )
    .await;
    let ex_id = ex["id"].as_i64().unwrap();

    for (n, (day, hour, minute)) in [(10, 9, 0), (11, 23, 30), (12, 12, 0), (13, 8, 0)]
        .into_iter()
        .enumerate()
    {
        let contact: ContactCreate = serde_json::from_value(contact_body(
            &format!("d{day}@x.io"),
            &format!("+7 900 000 00 2{n}"),
        ))
        .unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap();
        app.db.create_contact(&contact, ex_id, None, at).await.unwrap();
    }

    let emails = |page: &serde_json::Value| -> Vec<String> {
        page["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["email"].as_str().unwrap().to_string())
            .collect()
    };

    let resp = app
        .send(request("GET", "/contacts?date_from=2025-03-11&date_to=2025-03-12", Some(&admin)))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_json(resp).await;
    assert_eq!(page["total"], 2);
    assert_eq!(emails(&page), ["d12@x.io", "d11@x.io"]);

    // The whole of the date_to day counts.
    let resp = app
        .send(request("GET", "/contacts?date_to=2025-03-12", Some(&admin)))
        .await;
    let page = body_json(resp).await;
    assert_eq!(page["total"], 3);
    assert_eq!(emails(&page), ["d12@x.io", "d11@x.io", "d10@x.io"]);

    let resp = app
        .send(request("GET", "/contacts?date_from=2025-03-13", Some(&admin)))
        .await;
    assert_eq!(emails(&body_json(resp).await), ["d13@x.io"]);

    let resp = app
        .send(request("GET", "/contacts?skip=1&limit=2", Some(&admin)))
        .await;
    let page = body_json(resp).await;
    assert_eq!(page["total"], 4);
    assert_eq!(page["skip"], 1);
    assert_eq!(page["limit"], 2);
    assert_eq!(emails(&page), ["d12@x.io", "d11@x.io"]);

    let resp = app
        .send(request("GET", "/contacts?limit=-1", Some(&admin)))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_overview_counts_contacts() {
    let app = spawn_app().await;
    let admin = app.login_admin(1).await;
    create_exhibition(
        &app,
        &admin,
        json!({"title": "Expo", "start_date": "2025-03-10", "end_date": "2025-03-12"}),
    )
    .await;
    for (email, phone) in [("s1@x.io", "+7 900 000 00 11"), ("s2@x.io", "+7 900 000 00 12")] {
        app.send(json_request("POST", "/contacts", None, &contact_body(email, phone)))
            .await;
    }

    let resp = app
        .send(request("GET", "/contacts/stats/overview", Some(&admin)))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = body_json(resp).await;
    assert_eq!(stats["total_contacts"], 2);
    assert_eq!(stats["contacts_today"], 2);
    assert_eq!(stats["contacts_last_week"], 2);
    assert_eq!(stats["contacts_by_exhibition"], json!([{"name": "Expo", "count": 2}]));
    assert_eq!(stats["contacts_by_position"], json!([{"name": "CEO", "count": 2}]));
}
