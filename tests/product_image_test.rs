//! Product image uploads: type checks, size limits and serving the stored file.

mod common;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use common::{response_json, TestApp};

const BOUNDARY: &str = "bakery-upload-boundary";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

fn png_bytes(len: usize) -> Vec<u8> {
    let mut bytes = PNG_MAGIC.to_vec();
    bytes.resize(len.max(PNG_MAGIC.len()), 0x42);
    bytes
}

fn multipart_body(field: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(
    app: &TestApp,
    product_id: &str,
    field: &str,
    content_type: &str,
    bytes: &[u8],
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/v1/products/{product_id}/image"))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token()))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, content_type, bytes)))
        .unwrap();
    app.send(request).await
}

#[tokio::test]
async fn stored_image_is_served_from_uploads() {
    let app = TestApp::new().await;
    let product = app.seed_product("IMG-BUN", "15").await;
    let product_id = product["id"].as_str().unwrap();
    let image = png_bytes(512);

    let response = upload(&app, product_id, "image", "image/png", &image).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let path = body["data"]["image_path"].as_str().unwrap().to_string();
    assert!(path.starts_with("products/"), "{path}");
    assert!(path.ends_with(".png"), "{path}");

    let fetched = app
        .request(Method::GET, &format!("/uploads/{path}"), None, None)
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(
        fetched.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let served = body::to_bytes(fetched.into_body(), usize::MAX).await.unwrap();
    assert_eq!(served.as_ref(), image.as_slice());

    // Same content lands on the same name
    let again = upload(&app, product_id, "image", "image/png", &image).await;
    let again = response_json(again).await;
    assert_eq!(again["data"]["image_path"].as_str().unwrap(), path);

    let product = response_json(app.get(&format!("/api/v1/products/{product_id}")).await).await;
    assert_eq!(product["data"]["image_path"].as_str().unwrap(), path);
}

#[tokio::test]
async fn declared_type_must_match_the_content() {
    let app = TestApp::new().await;
    let product = app.seed_product("IMG-CAKE", "300").await;
    let product_id = product["id"].as_str().unwrap();

    let jpeg = b"\xff\xd8\xff\xe0 jpeg body".to_vec();
    let mislabelled = upload(&app, product_id, "image", "image/png", &jpeg).await;
    assert_eq!(mislabelled.status(), StatusCode::BAD_REQUEST);

    let fake_webp = b"RIFF\x00\x00\x00\x00AVI LIST".to_vec();
    let not_webp = upload(&app, product_id, "image", "image/webp", &fake_webp).await;
    assert_eq!(not_webp.status(), StatusCode::BAD_REQUEST);

    let gif = b"GIF89a tiny".to_vec();
    let unsupported = upload(&app, product_id, "image", "image/gif", &gif).await;
    assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);

    let wrong_field = upload(&app, product_id, "photo", "image/png", &png_bytes(64)).await;
    assert_eq!(wrong_field.status(), StatusCode::BAD_REQUEST);

    let accepted = upload(&app, product_id, "image", "image/jpeg", &jpeg).await;
    assert_eq!(accepted.status(), StatusCode::OK);
    let accepted = response_json(accepted).await;
    assert!(accepted["data"]["image_path"]
        .as_str()
        .unwrap()
        .ends_with(".jpg"));
}

#[tokio::test]
async fn oversized_images_are_refused() {
    let app = TestApp::with_config(|c| c.max_upload_bytes = 1024).await;
    let product = app.seed_product("IMG-LOAF", "45").await;
    let product_id = product["id"].as_str().unwrap();

    let fits = upload(&app, product_id, "image", "image/png", &png_bytes(1024)).await;
    assert_eq!(fits.status(), StatusCode::OK);

    // Over the image limit but inside the request body limit
    let over = upload(&app, product_id, "image", "image/png", &png_bytes(2048)).await;
    assert_eq!(over.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // Past the request body limit itself
    let huge = upload(&app, product_id, "image", "image/png", &png_bytes(128 * 1024)).await;
    assert_eq!(huge.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let missing = upload(
        &app,
        &uuid::Uuid::new_v4().to_string(),
        "image",
        "image/png",
        &png_bytes(64),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
