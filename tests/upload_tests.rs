mod common;

use axum::body::to_bytes;
use axum::http::StatusCode;
use common::{
    TestApp, body_json, contact_body, create_exhibition, files_in, json_request, multipart_request,
    request, spawn_app, truncated_multipart_request,
};
use serde_json::json;

async fn contact_with_author(app: &TestApp) -> (String, i64) {
    let admin = app.login_admin(1).await;
    create_exhibition(
        app,
        &admin,
        json!({"title": "Expo", "start_date": "2025-03-10", "end_date": "2025-03-12"}),
    )
    .await;
    let author = app.login(2, "Author").await;
    let resp = app
        .send(json_request("POST", "/contacts", Some(&author), &contact_body("f@x.io", "+7 900 000 00 01")))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["id"].as_i64().unwrap();
    (author, id)
}

#[tokio::test]
async fn rejected_contact_files_leave_nothing_on_disk() {
    let app = spawn_app().await;
    let (author, id) = contact_with_author(&app).await;
    let uri = format!("/contacts/{id}/files");

    let resp = app
        .send(multipart_request(&uri, Some(&author), &[("document", "setup.exe", b"MZ")]))
        .await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(resp).await["error"]["code"], "INVALID_FILE_TYPE");
    assert!(files_in(&app, "contacts").is_empty());

    let big = vec![b'a'; 5 * 1024 * 1024 + 1];
    let resp = app
        .send(multipart_request(&uri, Some(&author), &[("document", "notes.txt", &big)]))
        .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(files_in(&app, "contacts").is_empty());

    let resp = app
        .send(multipart_request(&uri, Some(&author), &[("unrelated", "a.txt", b"x")]))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn contact_files_are_served_limited_and_removed() {
    let app = spawn_app().await;
    let (author, id) = contact_with_author(&app).await;
    let other = app.login(3, "Other").await;
    let uri = format!("/contacts/{id}/files");

    let resp = app
        .send(multipart_request(&uri, Some(&other), &[("document", "a.txt", b"x")]))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .send(multipart_request(
            &uri,
            Some(&author),
            &[
                ("business_card_front", "card.png", b"front-bytes"),
                ("document", "brief.pdf", b"%PDF-1.4"),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let uploaded = body_json(resp).await;
    assert_eq!(uploaded["contact_id"], id);
    assert_eq!(uploaded["files"][0]["type"], "business_card_front");
    assert_eq!(uploaded["files"][1]["type"], "document");
    assert_eq!(files_in(&app, "contacts").len(), 2);

    let url = uploaded["files"][0]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/contacts/"));
    let resp = app.send(request("GET", &url, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let served = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&served[..], b"front-bytes");

    // Only one slot is left, so the second file fails and the first is rolled back.
    let resp = app
        .send(multipart_request(
            &uri,
            Some(&author),
            &[("document", "one.txt", b"1"), ("document", "two.txt", b"2")],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(files_in(&app, "contacts").len(), 2);

    let resp = app.send(request("GET", &uri, Some(&author))).await;
    let listed = body_json(resp).await;
    assert_eq!(listed["total_files"], 2);
    let doc_id = listed["files"][1]["file_id"].as_i64().unwrap();

    let resp = app
        .send(request("DELETE", &format!("{uri}/{doc_id}"), Some(&author)))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(files_in(&app, "contacts").len(), 1);

    let resp = app
        .send(request("DELETE", &format!("/contacts/{id}"), Some(&author)))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(files_in(&app, "contacts").is_empty());
}

#[tokio::test]
async fn general_uploads_respect_directory_and_naming() {
    let app = spawn_app().await;
    let user = app.login(7, "Uploader").await;

    let resp = app
        .send(multipart_request(
            "/files/upload?file_type=..%2Fetc",
            Some(&user),
            &[("file", "a.txt", b"x")],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .send(multipart_request("/files/upload", None, &[("file", "a.txt", b"x")]))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .send(multipart_request(
            "/files/upload?file_type=reports&custom_name=q1%20summary",
            Some(&user),
            &[("file", "Report.CSV", b"a,b\n1,2\n")],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first = body_json(resp).await;
    assert_eq!(first["format"], "csv");
    assert_eq!(first["url"], "/uploads/reports/q1_summary.csv");
    assert_eq!(first["size_bytes"], 8);

    // Same custom name overwrites the file and refreshes the record.
    let resp = app
        .send(multipart_request(
            "/files/upload?file_type=reports&custom_name=q1%20summary",
            Some(&user),
            &[("file", "again.csv", b"a,b\n")],
        ))
        .await;
    let second = body_json(resp).await;
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["name"], "again.csv");
    assert_eq!(second["size_bytes"], 4);
    assert_eq!(files_in(&app, "reports"), ["q1_summary.csv"]);

    let resp = app
        .send(request("GET", &format!("/files/{}", first["id"]), Some(&user)))
        .await;
    let stored = body_json(resp).await;
    assert_eq!(stored["name"], "again.csv");
    assert_eq!(stored["size_bytes"], 4);

    let resp = app
        .send(multipart_request(
            "/files/upload-multiple",
            Some(&user),
            &[
                ("files", "ok.json", b"{}"),
                ("files", "bad.exe", b"MZ"),
                ("files", "also.xml", b"<a/>"),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let outcome = body_json(resp).await;
    assert_eq!(outcome["uploaded"].as_array().unwrap().len(), 2);
    assert_eq!(outcome["failed"][0]["name"], "bad.exe");
    assert_eq!(files_in(&app, "general").len(), 2);

    let resp = app
        .send(request("GET", "/files?format_filter=json", Some(&user)))
        .await;
    assert_eq!(body_json(resp).await["total"], 1);

    let file_uri = format!("/files/{}", first["id"]);
    let resp = app.send(request("DELETE", &file_uri, Some(&user))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let admin = app.login_admin(8).await;
    let resp = app.send(request("DELETE", &file_uri, Some(&admin))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(files_in(&app, "reports").is_empty());
    let resp = app.send(request("GET", &file_uri, Some(&user))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn business_card_attaches_to_contact() {
    let app = spawn_app().await;
    let (author, id) = contact_with_author(&app).await;

    let resp = app
        .send(multipart_request(
            &format!("/files/business-card?contact_id={id}&side=back"),
            Some(&author),
            &[("file", "card.pdf", b"%PDF")],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = app
        .send(multipart_request(
            &format!("/files/business-card?contact_id={id}&side=back"),
            Some(&author),
            &[("file", "card.webp", b"RIFF")],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let card = body_json(resp).await;
    assert_eq!(card["contact_id"], id);
    assert_eq!(card["type"], "business_card_back");

    let resp = app
        .send(request("GET", &format!("/contacts/{id}/files"), Some(&author)))
        .await;
    let listed = body_json(resp).await;
    assert_eq!(listed["total_files"], 1);
    assert_eq!(listed["files"][0]["type"], "business_card_back");

    let resp = app
        .send(multipart_request(
            "/files/business-card",
            Some(&author),
            &[("file", "loose.png", b"png")],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(body_json(resp).await["contact_id"].is_null());
    assert_eq!(files_in(&app, "contacts").len(), 2);
}

#[tokio::test]
async fn failed_overwrite_keeps_the_stored_file() {
    let app = spawn_app().await;
    let user = app.login(7, "Uploader").await;
    let uri = "/files/upload?file_type=reports&custom_name=q1";

    let resp = app
        .send(multipart_request(uri, Some(&user), &[("file", "first.csv", b"a,b\n1,2\n")]))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let first = body_json(resp).await;

    // The body ends before the closing boundary.
    let resp = app
        .send(truncated_multipart_request(uri, Some(&user), "file", "second.csv", b"x,y\n"))
        .await;
    assert!(resp.status().is_client_error(), "{}", resp.status());

    assert_eq!(files_in(&app, "reports"), ["q1.csv"]);
    let on_disk = std::fs::read(app.uploads.join("reports").join("q1.csv")).unwrap();
    assert_eq!(on_disk, b"a,b\n1,2\n");

    let resp = app
        .send(request("GET", &format!("/files/{}", first["id"]), Some(&user)))
        .await;
    let stored = body_json(resp).await;
    assert_eq!(stored["name"], "first.csv");
    assert_eq!(stored["size_bytes"], 8);

    let served = app
        .send(request("GET", "/uploads/reports/q1.csv", None))
        .await;
    assert_eq!(served.status(), StatusCode::OK);
    let bytes = to_bytes(served.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"a,b\n1,2\n");
}
