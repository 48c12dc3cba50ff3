use payrun::domain::ports::TransferGateway;
use payrun::domain::transfer::RecipientRequest;
use payrun::error::DisbursementError;
use payrun::infrastructure::paystack::PaystackGateway;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A one-response-per-connection HTTP server that replays queued answers and
/// records every request it receives.
struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    async fn start(responses: Vec<(u16, Value)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let mut responses: VecDeque<_> = responses.into();

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let request = read_request(&mut stream).await;
                recorded.lock().unwrap().push(request);
                let (code, body) = responses
                    .pop_front()
                    .unwrap_or((500, json!({"status": false, "message": "no scripted response"})));
                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 {code} STUB\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    fn request_lines(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| {
                // "GET /transfer/TRF_1 HTTP/1.1" -> "GET /transfer/TRF_1"
                let line = request.lines().next().unwrap_or_default();
                line.rsplit_once(' ').map(|(head, _)| head.to_string()).unwrap_or_default()
            })
            .collect()
    }

    fn gateway(&self) -> PaystackGateway {
        PaystackGateway {
            retry_min_delay: Duration::from_millis(1),
            ..PaystackGateway::new(&self.base_url, "sk_test_stub")
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn ok(data: Value) -> (u16, Value) {
    (200, json!({"status": true, "message": "ok", "data": data}))
}

fn server_error() -> (u16, Value) {
    (500, json!({"status": false, "message": "internal error"}))
}

#[tokio::test]
async fn test_status_query_retries_after_server_error() {
    let server = StubServer::start(vec![
        server_error(),
        ok(json!({"transfer_code": "TRF_1", "status": "success"})),
    ])
    .await;

    let status = server.gateway().get_transfer_status("TRF_1").await.unwrap();

    assert_eq!(status["status"], "success");
    assert_eq!(server.request_lines(), vec!["GET /transfer/TRF_1", "GET /transfer/TRF_1"]);
}

#[tokio::test]
async fn test_status_query_gives_up_after_configured_retries() {
    let server = StubServer::start(vec![server_error(), server_error(), server_error(), server_error()]).await;
    let gateway = PaystackGateway {
        status_retries: 2,
        ..server.gateway()
    };

    let err = gateway.get_transfer_status("TRF_1").await.unwrap_err();

    assert!(matches!(err, DisbursementError::Gateway(ref m) if m.contains("500")));
    assert_eq!(server.request_lines().len(), 3);
}

#[tokio::test]
async fn test_status_query_does_not_retry_provider_rejection() {
    let server = StubServer::start(vec![(404, json!({"status": false, "message": "Transfer not found"}))]).await;

    let err = server.gateway().get_transfer_status("TRF_MISSING").await.unwrap_err();

    assert!(matches!(err, DisbursementError::Gateway(ref m) if m == "Transfer not found"));
    assert_eq!(server.request_lines().len(), 1);
}

#[tokio::test]
async fn test_status_query_retries_unreachable_provider() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = PaystackGateway {
        status_retries: 1,
        retry_min_delay: Duration::from_millis(1),
        ..PaystackGateway::new(format!("http://{addr}"), "sk_test_stub")
    };
    let err = gateway.get_transfer_status("TRF_1").await.unwrap_err();

    assert!(matches!(err, DisbursementError::Gateway(ref m) if m.contains("No response")));
}

#[tokio::test]
async fn test_initiate_transfer_is_never_retried() {
    let server = StubServer::start(vec![
        server_error(),
        ok(json!({"transfer_code": "TRF_DUPLICATE", "status": "success"})),
    ])
    .await;

    let err = server
        .gateway()
        .initiate_transfer("RCP_1", dec!(150000), "Salary for 2025-01")
        .await
        .unwrap_err();

    assert!(matches!(err, DisbursementError::Gateway(_)));
    assert_eq!(server.request_lines(), vec!["POST /transfer"]);
}

#[tokio::test]
async fn test_initiate_transfer_sends_body_and_reads_receipt() {
    let server = StubServer::start(vec![ok(json!({
        "transfer_code": "TRF_123",
        "status": "pending",
        "amount": 150000
    }))])
    .await;

    let receipt = server
        .gateway()
        .initiate_transfer("RCP_123", dec!(150000), "Salary for 2025-01")
        .await
        .unwrap();
    assert_eq!(receipt.transfer_code, "TRF_123");
    assert_eq!(receipt.amount, Some(dec!(150000)));

    let request = server.requests.lock().unwrap()[0].clone();
    assert!(request.to_lowercase().contains("authorization: bearer sk_test_stub"));
    let body: Value = serde_json::from_str(request.split("\r\n\r\n").nth(1).unwrap()).unwrap();
    assert_eq!(body["source"], "balance");
    assert_eq!(body["recipient"], "RCP_123");
    assert_eq!(body["reason"], "Salary for 2025-01");
    assert_eq!(body["amount"], json!(150000.0));
}

#[tokio::test]
async fn test_create_recipient_surfaces_provider_message() {
    let server = StubServer::start(vec![(400, json!({"status": false, "message": "Invalid bank code"}))]).await;
    let recipient = RecipientRequest {
        name: "Alice".to_string(),
        account_number: "0123456789".to_string(),
        bank_code: "999".to_string(),
        currency: "NGN".to_string(),
    };

    let err = server.gateway().create_recipient(&recipient).await.unwrap_err();

    assert!(matches!(err, DisbursementError::Gateway(ref m) if m == "Invalid bank code"));
    assert_eq!(server.request_lines(), vec!["POST /transferrecipient"]);
}

#[tokio::test]
async fn test_create_recipient_returns_recipient_code() {
    let server = StubServer::start(vec![ok(json!({"recipient_code": "RCP_abc"}))]).await;
    let recipient = RecipientRequest {
        name: "Alice".to_string(),
        account_number: "0123456789".to_string(),
        bank_code: "057".to_string(),
        currency: "NGN".to_string(),
    };

    let code = server.gateway().create_recipient(&recipient).await.unwrap();
    assert_eq!(code, "RCP_abc");

    let request = server.requests.lock().unwrap()[0].clone();
    let body: Value = serde_json::from_str(request.split("\r\n\r\n").nth(1).unwrap()).unwrap();
    assert_eq!(body["type"], "nuban");
    assert_eq!(body["bank_code"], "057");
    assert_eq!(body["currency"], "NGN");
}
