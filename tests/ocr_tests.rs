mod common;

use axum::http::StatusCode;
use common::{body_json, multipart_request, spawn_app, spawn_app_with};
use image::{GrayImage, ImageFormat, Luma};
use serde_json::json;
use std::io::Cursor;

/// Light card with a few dark strokes, encoded as PNG.
fn card_png() -> Vec<u8> {
    let img = GrayImage::from_fn(240, 140, |x, y| {
        if y % 35 < 3 && x > 20 && x < 220 {
            Luma([25])
        } else {
            Luma([235])
        }
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

#[tokio::test]
async fn ocr_returns_cleaned_lines() {
    let app = spawn_app().await;
    let png = card_png();

    let resp = app
        .send(multipart_request("/ocr", None, &[("file", "card.png", &png)]))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!(["ACME Corp", "John Smith", "CEO"]));

    let calls = app.recognizer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].psm, 6);
    assert!(calls[0].whitelist.is_some());
}

#[tokio::test]
async fn ocr_rejects_bad_input() {
    let app = spawn_app().await;

    let resp = app
        .send(multipart_request("/ocr", None, &[("file", "card.png", b"not an image")]))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(resp).await["error"]["code"], "OCR_ERROR");

    let resp = app
        .send(multipart_request("/ocr", None, &[("file", "card.pdf", b"%PDF")]))
        .await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let resp = app
        .send(multipart_request("/ocr", None, &[("file", "card.png", b"")]))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .send(multipart_request("/ocr", None, &[("image", "card.png", b"x")]))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enhanced_ocr_picks_the_richest_pass() {
    let app = spawn_app().await;
    let png = card_png();

    let resp = app
        .send(multipart_request("/ocr/enhanced", None, &[("file", "card.png", &png)]))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let out = body_json(resp).await;
    assert_eq!(out["psm"], 3);
    assert_eq!(out["lines"], json!(["ACME Corp", "John Smith", "CEO"]));

    let resp = app
        .send(multipart_request(
            "/ocr/enhanced?filter=false",
            None,
            &[("file", "card.png", &png)],
        ))
        .await;
    let out = body_json(resp).await;
    assert_eq!(out["lines"].as_array().unwrap().len(), 4);
    assert_eq!(out["lines"][3], "+7 999 123-45-67");
}

#[tokio::test]
async fn ocr_is_rate_limited() {
    let app = spawn_app_with(|cfg| cfg.ocr.requests_per_minute = 1).await;
    let png = card_png();

    let resp = app
        .send(multipart_request("/ocr", None, &[("file", "card.png", &png)]))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .send(multipart_request("/ocr/enhanced", None, &[("file", "card.png", &png)]))
        .await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(resp).await["error"]["code"], "RATE_LIMIT");
}
