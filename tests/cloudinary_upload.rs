//! Integration tests for the Cloudinary adapter against a local mock host

use serde_json::{json, Value};
use slideshot::upload::{CloudinaryAccount, CloudinaryClient, ImageHost};
use slideshot::Error;
use std::io::Read;
use std::sync::Once;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();

/// Start a mock upload API. The cloud name in the path selects the behavior.
fn start_mock_cloudinary() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18091").unwrap();
            for mut request in server.incoming_requests() {
                let path = request.url().to_string();
                let mut raw = String::new();
                request.as_reader().read_to_string(&mut raw).unwrap();
                let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);

                let file = body["file"].as_str().unwrap_or("");
                let preset = body["upload_preset"].as_str().unwrap_or("");
                let well_formed = file.starts_with("data:image/png;base64,")
                    && !preset.is_empty()
                    && body.get("api_key").is_none();

                let response = match path.as_str() {
                    "/good-cloud/image/upload" if well_formed => Response::from_string(
                        json!({
                            "public_id": "abc123",
                            "secure_url": format!("https://res.cloudinary.com/good-cloud/image/upload/{}/abc123.png", preset),
                        })
                        .to_string(),
                    ),
                    "/good-cloud/image/upload" => Response::from_string("malformed upload").with_status_code(422),
                    "/bad-cloud/image/upload" => Response::from_string(
                        json!({"error": {"message": "Upload preset not found"}}).to_string(),
                    )
                    .with_status_code(400),
                    "/odd-cloud/image/upload" => Response::from_string("{}"),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18091".to_string()
}

fn account(cloud_name: &str) -> CloudinaryAccount {
    CloudinaryAccount { cloud_name: cloud_name.into(), upload_preset: "eevdbifs".into() }
}

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

#[tokio::test]
async fn test_upload_returns_secure_url() {
    let client = CloudinaryClient::new(start_mock_cloudinary()).unwrap();
    let url = client.upload(PNG, "ig_1_slide_1", &account("good-cloud")).await.unwrap();
    assert_eq!(url, "https://res.cloudinary.com/good-cloud/image/upload/eevdbifs/abc123.png");
}

#[tokio::test]
async fn test_rejection_carries_status_and_body() {
    let client = CloudinaryClient::new(start_mock_cloudinary()).unwrap();
    let err = client.upload(PNG, "ig_1_slide_1", &account("bad-cloud")).await.unwrap_err();
    match err {
        Error::Upload { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Upload preset not found"));
        }
        other => panic!("expected upload error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_response_without_secure_url_is_an_error() {
    let client = CloudinaryClient::new(start_mock_cloudinary()).unwrap();
    let err = client.upload(PNG, "ig_1_slide_1", &account("odd-cloud")).await.unwrap_err();
    assert!(matches!(err, Error::Upload { status: 200, .. }));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let client = CloudinaryClient::new("http://127.0.0.1:1").unwrap();
    let err = client.upload(PNG, "ig_1_slide_1", &account("good-cloud")).await.unwrap_err();
    assert!(matches!(err, Error::NetworkError(_)));
    assert_eq!(err.status_code(), 500);
}
