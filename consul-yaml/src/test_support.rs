//! In-process Consul stand-in for tests.

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub body: String,
}

/// HTTP server answering every request with a fixed status and body, and
/// recording what it received
pub struct MockConsul {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockConsul {
    pub async fn start(status: u16, body: &'static str) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let make_svc = make_service_fn(move |_conn| {
            let recorded = recorded.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let recorded = recorded.clone();
                    async move {
                        let method = req.method().to_string();
                        let uri = req.uri().to_string();
                        let bytes = hyper::body::to_bytes(req.into_body())
                            .await
                            .unwrap_or_default();
                        recorded.lock().await.push(RecordedRequest {
                            method,
                            uri,
                            body: String::from_utf8_lossy(&bytes).to_string(),
                        });

                        let mut response = Response::new(Body::from(body));
                        *response.status_mut() =
                            StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
                        Ok::<_, Infallible>(response)
                    }
                }))
            }
        });

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);

        Self { addr, requests }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}
