use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use tokio::net::TcpListener;
use tower::BoxError;

// used for testing
#[allow(dead_code)]
static INIT_CRYPTO: Once = Once::new();
#[allow(dead_code)]
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .unwrap()
    });
}

#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub body: String,
    pub content_type: String,
    pub authorization: String,
}

/// Local HTTP server that answers each request with the next queued
/// (status, body) pair and records what it received.
pub struct TestServer {
    addr: SocketAddr,
    requests: Recorded,
}

impl TestServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(Mutex::new(VecDeque::from(responses)));

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = recorded.clone();
                let responses = responses.clone();

                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        handle(req, recorded.clone(), responses.clone())
                    });

                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Self { addr, requests }
    }

    /// Accepts connections but never answers them.
    pub async fn start_stalled() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        Self {
            addr,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

type Recorded = Arc<Mutex<Vec<ReceivedRequest>>>;
type Queued = Arc<Mutex<VecDeque<(u16, String)>>>;

async fn handle(
    req: Request<Incoming>,
    recorded: Recorded,
    responses: Queued,
) -> Result<Response<Full<Bytes>>, BoxError> {
    let content_type = header(&req, CONTENT_TYPE);
    let authorization = header(&req, AUTHORIZATION);
    let body = req.into_body().collect().await?.to_bytes();

    recorded.lock().unwrap().push(ReceivedRequest {
        body: String::from_utf8_lossy(&body).into_owned(),
        content_type,
        authorization,
    });

    let (status, body) = responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((500, "no response queued".to_string()));

    Ok(Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))?)
}

fn header(req: &Request<Incoming>, name: HeaderName) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
