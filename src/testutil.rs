use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    // closes the socket without writing anything
    pub drop_connection: bool,
}

impl MockResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.into().into_bytes(),
            drop_connection: false,
        }
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: body.into().into_bytes(),
            drop_connection: false,
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Location".to_string(), location.into())],
            body: Vec::new(),
            drop_connection: false,
        }
    }

    pub fn connection_drop() -> Self {
        Self {
            status: 0,
            headers: Vec::new(),
            body: Vec::new(),
            drop_connection: true,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

type HitCounter = Arc<std::sync::atomic::AtomicUsize>;

enum Rule {
    Fixed(MockResponse),
    // returns fail for the first fail_count hits, then ok forever
    FailThenSucceed {
        fail: MockResponse,
        fail_count: usize,
        ok: MockResponse,
    },
}

struct Route {
    path: String,
    rule: Rule,
    hits: HitCounter,
}

pub struct MockServer {
    pub base_url: String,
    routes: Arc<Mutex<Vec<Route>>>,
    default: Arc<Mutex<Option<MockResponse>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock server failed to bind");
        let addr = listener.local_addr().expect("mock server has no local addr");
        let routes: Arc<Mutex<Vec<Route>>> = Arc::new(Mutex::new(Vec::new()));
        let default: Arc<Mutex<Option<MockResponse>>> = Arc::new(Mutex::new(None));
        let accept_routes = Arc::clone(&routes);
        let accept_default = Arc::clone(&default);

        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let routes = Arc::clone(&accept_routes);
                let default = Arc::clone(&accept_default);
                tokio::spawn(async move {
                    let _ = serve_one(stream, routes, default).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            routes,
            default,
            handle,
        }
    }

    pub async fn route(&self, path: impl Into<String>, response: MockResponse) {
        let mut routes = self.routes.lock().await;
        routes.push(Route {
            path: normalize(&path.into()),
            rule: Rule::Fixed(response),
            hits: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        });
    }

    // fails fail_count times (each reusing fail), then settles on ok
    pub async fn route_flaky(
        &self,
        path: impl Into<String>,
        fail: MockResponse,
        fail_count: usize,
        ok: MockResponse,
    ) {
        let mut routes = self.routes.lock().await;
        routes.push(Route {
            path: normalize(&path.into()),
            rule: Rule::FailThenSucceed {
                fail,
                fail_count,
                ok,
            },
            hits: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        });
    }

    // the soft-404 / wildcard-trap response for any path with no explicit route
    pub async fn set_default(&self, response: MockResponse) {
        *self.default.lock().await = Some(response);
    }

    pub async fn hit_count(&self, path: &str) -> usize {
        let routes = self.routes.lock().await;
        routes
            .iter()
            .find(|r| r.path == normalize(path))
            .map(|r| r.hits.load(std::sync::atomic::Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

async fn serve_one(
    mut stream: TcpStream,
    routes: Arc<Mutex<Vec<Route>>>,
    default: Arc<Mutex<Option<MockResponse>>>,
) -> std::io::Result<()> {
    let request = read_request_line(&mut stream).await?;
    let Some((_, target)) = parse_request_line(&request) else {
        return Ok(());
    };
    let path = normalize(target.split('?').next().unwrap_or(""));

    let mut routes = routes.lock().await;
    let Some(route) = routes.iter_mut().find(|r| r.path == path) else {
        drop(routes);
        let fallback = default.lock().await.clone();
        return match fallback {
            Some(resp) => dispatch(&mut stream, resp).await,
            None => write_response(&mut stream, 404, &[], b"not found").await,
        };
    };
    let hit_index = route.hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    match &mut route.rule {
        Rule::Fixed(resp) => {
            let resp = resp.clone();
            drop(routes);
            dispatch(&mut stream, resp).await
        }
        Rule::FailThenSucceed {
            fail,
            fail_count,
            ok,
        } => {
            let resp = if hit_index < *fail_count { fail.clone() } else { ok.clone() };
            drop(routes);
            dispatch(&mut stream, resp).await
        }
    }
}

async fn dispatch(stream: &mut TcpStream, resp: MockResponse) -> std::io::Result<()> {
    if resp.drop_connection {
        return Ok(());
    }
    write_response(stream, resp.status, &resp.headers, &resp.body).await
}

async fn read_request_line(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            break;
        }
        buf.push(byte[0]);
        if buf.ends_with(b"\r\n") {
            break;
        }
        if buf.len() > 8192 {
            break;
        }
    }
    // drain the rest of the headers so the client doesn't see an early reset
    let mut tail = Vec::new();
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            break;
        }
        tail.push(byte[0]);
        if tail.len() >= 4 && tail.ends_with(b"\r\n\r\n") {
            break;
        }
        if tail.len() > 65536 {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

fn parse_request_line(line: &str) -> Option<(String, String)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    Some((method, target))
}

async fn write_response(
    stream: &mut TcpStream,
    status: u16,
    headers: &[(String, String)],
    body: &[u8],
) -> std::io::Result<()> {
    let reason = reason_phrase(status);
    let mut head = format!("HTTP/1.1 {status} {reason}\r\n");
    let mut seen_content_type = false;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-type") {
            seen_content_type = true;
        }
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    if !seen_content_type {
        head.push_str("Content-Type: text/plain\r\n");
    }
    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str("Connection: close\r\n\r\n");
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.shutdown().await?;
    Ok(())
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

pub async fn server_with_routes(routes: HashMap<&str, MockResponse>) -> MockServer {
    let server = MockServer::start().await;
    for (path, resp) in routes {
        server.route(path, resp).await;
    }
    server
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_a_fixed_route_and_404s_everything_else() {
        let server = MockServer::start().await;
        server.route("/admin", MockResponse::text(200, "hi")).await;

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("{}/admin", server.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.text().await.unwrap(), "hi");

        let missing = client
            .get(format!("{}/nope", server.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);

        server.shutdown();
    }

    #[tokio::test]
    async fn flaky_route_fails_then_succeeds() {
        let server = MockServer::start().await;
        server
            .route_flaky(
                "/flaky",
                MockResponse { status: 502, headers: vec![], body: vec![], drop_connection: false },
                2,
                MockResponse::text(200, "recovered"),
            )
            .await;

        let client = reqwest::Client::new();
        for expected in [502, 502, 200] {
            let resp = client
                .get(format!("{}/flaky", server.base_url))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status().as_u16(), expected);
        }

        server.shutdown();
    }
}
