//! Test doubles shared by the unit tests of every module.

use crate::config::ChannelAddressing;
use crate::helix::HelixClient;
use crate::queries::TwitchQueries;
use crate::token::{MemoryTokenStore, TokenService, TokenStore};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use oauth2::ClientId;
use reqwest::Url;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) const HELIX_URL: &str = "https://api.twitch.tv/helix/";
pub(crate) const TOKEN_URL: &str = "https://tokens.example.com/token";
pub(crate) const CLIENT_ID: &str = "test-client-id";

type Scripted = Result<(StatusCode, String), String>;

#[derive(Debug)]
struct Route {
    path: String,
    responses: VecDeque<Scripted>,
}

/// A [`Transport`] that answers from a script and records every request it sees.
///
/// Responses are matched on the URL path suffix. Each queued response is used once, except
/// the last one for a path which keeps being replayed.
#[derive(Debug, Default)]
pub(crate) struct StubTransport {
    routes: Mutex<Vec<Route>>,
    holds: Mutex<Vec<(String, Arc<Notify>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, path: &str, response: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        if let Some(route) = routes.iter_mut().find(|r| r.path == path) {
            route.responses.push_back(response);
        } else {
            routes.push(Route {
                path: path.to_string(),
                responses: VecDeque::from([response]),
            });
        }
    }

    pub(crate) fn respond(&self, path: &str, status: StatusCode, body: impl Into<String>) {
        self.push(path, Ok((status, body.into())));
    }

    pub(crate) fn ok(&self, path: &str, body: impl Into<String>) {
        self.respond(path, StatusCode::OK, body);
    }

    pub(crate) fn fail(&self, path: &str, message: &str) {
        self.push(path, Err(message.to_string()));
    }

    /// Makes every request to `path` wait until the returned [`Notify`] is notified.
    pub(crate) fn hold(&self, path: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds
            .lock()
            .unwrap()
            .push((path.to_string(), Arc::clone(&notify)));
        notify
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.path().ends_with(path))
            .collect()
    }
}

impl Transport for StubTransport {
    async fn send(&self, request: HttpRequest) -> eyre::Result<HttpResponse> {
        let path = request.url.path().to_string();
        self.requests.lock().unwrap().push(request);

        let hold = self
            .holds
            .lock()
            .unwrap()
            .iter()
            .find(|(held, _)| path.ends_with(held))
            .map(|(_, notify)| Arc::clone(notify));
        if let Some(hold) = hold {
            hold.notified().await;
        }

        let scripted = {
            let mut routes = self.routes.lock().unwrap();
            let Some(route) = routes.iter_mut().find(|r| path.ends_with(&r.path)) else {
                eyre::bail!("no stubbed response for {path}");
            };
            if route.responses.len() > 1 {
                route.responses.pop_front().expect("checked non-empty")
            } else {
                route.responses[0].clone()
            }
        };

        match scripted {
            Ok((status, body)) => Ok(HttpResponse {
                status,
                body: Bytes::from(body),
            }),
            Err(message) => Err(eyre::eyre!(message)),
        }
    }
}

pub(crate) fn memory_store() -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::default())
}

pub(crate) fn token_service(
    transport: &Arc<StubTransport>,
    store: Arc<dyn TokenStore>,
) -> TokenService<StubTransport> {
    TokenService::new(
        Arc::clone(transport),
        store,
        Url::parse(TOKEN_URL).unwrap(),
        ClientId::new(CLIENT_ID.to_string()),
    )
}

pub(crate) fn helix_client(
    transport: &Arc<StubTransport>,
    store: Arc<dyn TokenStore>,
) -> HelixClient<StubTransport> {
    HelixClient::new(
        Arc::clone(transport),
        token_service(transport, store),
        Url::parse(HELIX_URL).unwrap(),
    )
    .unwrap()
}

pub(crate) fn queries(
    transport: &Arc<StubTransport>,
    addressing: ChannelAddressing,
) -> TwitchQueries<StubTransport> {
    TwitchQueries::new(helix_client(transport, memory_store()), addressing)
}

/// Log output captured by [`capture_logs`].
#[derive(Debug, Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Records everything logged on this thread, down to TRACE, until the guard is dropped.
pub(crate) fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: Method,
    pub(crate) uri: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: String,
}

pub(crate) struct LocalServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl LocalServer {
    pub(crate) fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Runs a throwaway HTTP/1 server on a random local port for the lifetime of the test runtime.
pub(crate) async fn serve_local<F>(respond: F) -> LocalServer
where
    F: Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync + 'static,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to localhost");
    let addr = listener.local_addr().expect("get local address");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((conn, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            let recorded = Arc::clone(&recorded);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let respond = Arc::clone(&respond);
                    let recorded = Arc::clone(&recorded);
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body.collect().await?.to_bytes();
                        let request = RecordedRequest {
                            method: parts.method,
                            uri: parts.uri.to_string(),
                            headers: parts.headers,
                            body: String::from_utf8_lossy(&body).into_owned(),
                        };
                        let (status, body) = respond(&request);
                        recorded.lock().unwrap().push(request);
                        let mut response = Response::new(Full::new(Bytes::from(body)));
                        *response.status_mut() = status;
                        Ok::<_, hyper::Error>(response)
                    }
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(conn), service)
                    .await;
            });
        }
    });

    LocalServer { addr, requests }
}
