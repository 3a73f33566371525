use std::sync::atomic::Ordering;

use http::{
    header::{
        ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
        ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, USER_AGENT,
    },
    HeaderMap, HeaderValue, Method, StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{
    error::HandlerError,
    http::{IntoResponse, Json, Redirect, Request, Response},
    AppState,
};

use self::payload::{
    BodySize, CommandResult, Count, DnsLookup, DnsReport, DnsStats, FetchUrl, Message, RunCommand,
};

const ENV_FALLBACK: &str = "Specified environment variable is not set.";
const HELLO: Message = Message {
    message: "Hello, World!",
};
const SERVERLESS_AGENT: &str = "Boltic Serverless";

pub async fn route_request(request: Request, app_state: AppState) -> Response {
    macro_rules! method_matches {
        (ANY) => {
            true
        };
        ($m:ident) => {
            request.method() == Method::$m
        };
    }

    macro_rules! routes {
        (
            $($m:ident $p:literal => $f:expr),*
            $(, _ => $wc:expr)?
        ) => {
            let path = request.uri().path();
            let path = match path.strip_suffix('/') {
                Some(trimmed) if !trimmed.is_empty() => trimmed,
                _ => path,
            };

            $(if method_matches!($m) && path == $p {
                return IntoResponse::into_response($f);
            })*
            $(return $wc;)?
        };
    }

    routes!(
        ANY "/env" => echo_env(&app_state),
        ANY "/delay" => delay(&app_state).await,
        POST "/exec" => run_command(&app_state, &request).await,
        ANY "/hello" => Json(HELLO),
        POST "/fetch" => fetch_url(&app_state, &request).await,
        ANY "/cors" => cors(&request),
        ANY "/headers" => rewrite_user_agent(&request),
        ANY "/redirect" => Redirect(app_state.redirect_location.clone()),
        ANY "/count" => count_invocation(&app_state, &request),
        ANY "/method" => identify_method(&request),
        ANY "/body-size" => body_size(&request),
        ANY "/dns" => dns_stats(&request).await,
        _ => {
            let msg = format!(
                "Unknown route {} {}",
                request.method(),
                request.uri().path()
            );
            (StatusCode::NOT_FOUND, msg).into_response()
        }
    );
}

fn echo_env(app_state: &AppState) -> String {
    env_or_fallback(std::env::var(&app_state.config.echo_variable).ok())
}

fn env_or_fallback(value: Option<String>) -> String {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| ENV_FALLBACK.to_owned())
}

async fn delay(app_state: &AppState) -> Json<Message> {
    let delay = app_state.config.delay();

    tracing::debug!(?delay, "starting execution");
    tokio::time::sleep(delay).await;
    tracing::debug!("execution resumed after delay");

    Json(Message {
        message: "Function executed with intentional delay.",
    })
}

async fn run_command(
    app_state: &AppState,
    request: &Request,
) -> Result<Json<CommandResult>, HandlerError> {
    let RunCommand { command } = decode(request, "Invalid request body")?;
    if command.is_empty() {
        return Err(HandlerError::MissingParameter(
            "Please specify a command to run in the payload",
        ));
    }

    let output = app_state
        .runner
        .run(&command)
        .await
        .map_err(|err| HandlerError::ExecutionError(err.to_string()))?;

    // a command that ran but failed is folded into the same error as one
    // that never started
    if !output.success() {
        let reason = match output.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_owned(),
        };
        return Err(HandlerError::ExecutionError(reason));
    }

    let stdout = String::from_utf8_lossy(&output.combined).into_owned();
    tracing::debug!(%command, %stdout, "command finished");

    Ok(Json(CommandResult {
        stdout,
        stderr: String::new(),
    }))
}

async fn fetch_url(
    app_state: &AppState,
    request: &Request,
) -> Result<Json<Message>, HandlerError> {
    let FetchUrl { url } = decode(request, "Invalid request payload")?;
    if url.is_empty() {
        return Err(HandlerError::MissingParameter("URL is required"));
    }

    app_state.client.get_ok(&url).await?;

    Ok(Json(Message { message: "ok!" }))
}

fn cors(request: &Request) -> Response {
    const ANY_ORIGIN: HeaderValue = HeaderValue::from_static("*");

    if request.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, ANY_ORIGIN);
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));
        return resp;
    }

    let mut resp = Json(HELLO).into_response();
    resp.headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, ANY_ORIGIN);
    resp
}

fn rewrite_user_agent(request: &Request) -> StatusCode {
    let headers = with_serverless_agent(request.headers());
    tracing::debug!(?headers, "modified headers");

    StatusCode::OK
}

fn with_serverless_agent(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    headers.insert(USER_AGENT, HeaderValue::from_static(SERVERLESS_AGENT));
    headers
}

fn count_invocation(app_state: &AppState, request: &Request) -> Response {
    let count = app_state.invocations.fetch_add(1, Ordering::Relaxed) + 1;

    if accepts_json(request.headers()) {
        Json(Count { count }).into_response()
    } else {
        format!("Instance execution count: {count}").into_response()
    }
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(mime::APPLICATION_JSON.as_ref()))
}

fn identify_method(request: &Request) -> Json<Message> {
    let message = match *request.method() {
        Method::GET => "GET method called.",
        Method::POST => "POST method called.",
        Method::PUT => "PUT method called.",
        Method::DELETE => "DELETE method called.",
        Method::PATCH => "PATCH method called.",
        _ => "Unsupported method.",
    };

    Json(Message { message })
}

fn body_size(request: &Request) -> Json<BodySize> {
    const MEGABYTE: f64 = 1024.0 * 1024.0;

    let bytes = request.body().as_ref().map_or(0, |body| body.len());
    let megabytes = (bytes as f64 / MEGABYTE * 10_000.0).round() / 10_000.0;
    tracing::debug!("received body size: {bytes} bytes | ({megabytes} MB)");

    Json(BodySize {
        message: "Body size calculated successfully",
        body_size_bytes: bytes,
        body_size_mb: megabytes,
    })
}

async fn dns_stats(request: &Request) -> Result<Json<DnsReport>, HandlerError> {
    let DnsLookup { domain } = decode(request, "Invalid request payload")?;
    // "https://example.com" resolves as "example.com"
    let domain = domain.rsplit("//").next().unwrap_or_default().to_owned();
    if domain.is_empty() {
        return Err(HandlerError::MissingParameter(
            "Domain not provided in request body",
        ));
    }

    let dns_stats = match resolve(&domain).await {
        Ok(ip_addresses) => DnsStats::Resolved { ip_addresses },
        Err(err) => {
            tracing::debug!(%domain, %err, "dns lookup failed");
            DnsStats::Unavailable {
                error: "DNS statistics not available",
                exception: err.to_string(),
            }
        }
    };

    Ok(Json(DnsReport {
        reachable: matches!(dns_stats, DnsStats::Resolved { .. }),
        domain,
        dns_stats,
    }))
}

async fn resolve(domain: &str) -> std::io::Result<Vec<String>> {
    let mut ip_addresses = Vec::new();
    for addr in tokio::net::lookup_host((domain, 0)).await? {
        let ip = addr.ip().to_string();
        if !ip_addresses.contains(&ip) {
            ip_addresses.push(ip);
        }
    }

    tracing::debug!(%domain, ?ip_addresses, "resolved");
    if ip_addresses.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no addresses found",
        ));
    }

    Ok(ip_addresses)
}

fn decode<T: DeserializeOwned>(
    request: &Request,
    invalid: &'static str,
) -> Result<T, HandlerError> {
    let body = request.body().as_deref().unwrap_or_default();
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(%err, "failed to decode request body");
        HandlerError::InvalidInput(invalid)
    })
}

mod payload {
    #[derive(Debug, serde::Deserialize)]
    pub(super) struct RunCommand {
        #[serde(default)]
        pub command: String,
    }

    #[derive(Debug, serde::Deserialize)]
    pub(super) struct FetchUrl {
        #[serde(default)]
        pub url: String,
    }

    #[derive(Debug, serde::Deserialize)]
    pub(super) struct DnsLookup {
        #[serde(default)]
        pub domain: String,
    }

    #[derive(Debug, serde::Serialize)]
    pub(super) struct Message {
        pub message: &'static str,
    }

    #[derive(Debug, serde::Serialize)]
    pub(super) struct CommandResult {
        pub stdout: String,
        pub stderr: String,
    }

    #[derive(Debug, serde::Serialize)]
    pub(super) struct Count {
        pub count: u64,
    }

    #[derive(Debug, serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BodySize {
        pub message: &'static str,
        pub body_size_bytes: usize,
        #[serde(rename = "bodySizeMB")]
        pub body_size_mb: f64,
    }

    #[derive(Debug, serde::Serialize)]
    pub(super) struct DnsReport {
        pub domain: String,
        pub reachable: bool,
        pub dns_stats: DnsStats,
    }

    #[derive(Debug, serde::Serialize)]
    #[serde(untagged)]
    pub(super) enum DnsStats {
        Resolved {
            ip_addresses: Vec<String>,
        },
        Unavailable {
            error: &'static str,
            exception: String,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc, time::Duration};

    use bytes::Bytes;
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};

    use super::*;
    use crate::{
        config::Config,
        process::{shell::ShellCommandRunner, CommandOutput, CommandRunner},
        upstream::tests::spawn_upstream,
    };

    struct StubRunner(fn(&str) -> io::Result<CommandOutput>);

    #[async_trait::async_trait]
    impl CommandRunner for StubRunner {
        async fn run(&self, command: &str) -> io::Result<CommandOutput> {
            (self.0)(command)
        }
    }

    fn exited(code: i32, combined: &'static str) -> io::Result<CommandOutput> {
        Ok(CommandOutput {
            combined: Bytes::from_static(combined.as_bytes()),
            exit_code: Some(code),
        })
    }

    fn state_with(config: Config, runner: impl CommandRunner + Send + Sync + 'static) -> AppState {
        AppState::with_runner(config, Arc::new(runner)).unwrap()
    }

    fn state() -> AppState {
        state_with(Config::default(), StubRunner(|_| exited(0, "")))
    }

    fn request(method: Method, path: &str, body: Option<&str>) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(body.map(|body| Bytes::copy_from_slice(body.as_bytes())))
            .unwrap()
    }

    fn body_json(resp: &Response) -> serde_json::Value {
        serde_json::from_slice(resp.body().as_deref().unwrap_or_default()).unwrap()
    }

    fn body_text(resp: &Response) -> String {
        let body = resp.body().clone().unwrap_or_default();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn env_echo_returns_the_variable() {
        std::env::set_var("FUNCTIONS_TEST_ECHO_SET", "bar");
        let config = Config {
            echo_variable: "FUNCTIONS_TEST_ECHO_SET".into(),
            ..Config::default()
        };
        let state = state_with(config, StubRunner(|_| exited(0, "")));

        for method in [Method::GET, Method::POST, Method::PUT] {
            let resp = route_request(request(method, "/env", None), state.clone()).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
            assert_eq!(body_text(&resp), "bar");
        }
    }

    #[tokio::test]
    async fn env_echo_falls_back_when_unset() {
        let config = Config {
            echo_variable: "FUNCTIONS_TEST_ECHO_NEVER_SET".into(),
            ..Config::default()
        };
        let state = state_with(config, StubRunner(|_| exited(0, "")));

        for method in [Method::GET, Method::DELETE] {
            let resp = route_request(request(method, "/env", None), state.clone()).await;
            assert_eq!(body_text(&resp), ENV_FALLBACK);
        }
    }

    #[test]
    fn empty_variable_counts_as_unset() {
        assert_eq!(env_or_fallback(Some(String::new())), ENV_FALLBACK);
        assert_eq!(env_or_fallback(Some("x".into())), "x");
    }

    #[tokio::test(start_paused = true)]
    async fn delay_waits_without_blocking_others() {
        let state = state();
        let start = tokio::time::Instant::now();

        let (first, second) = tokio::join!(
            route_request(request(Method::GET, "/delay", None), state.clone()),
            route_request(request(Method::GET, "/delay", None), state.clone()),
        );

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
        for resp in [first, second] {
            assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
            assert_eq!(
                body_text(&resp),
                r#"{"message":"Function executed with intentional delay."}"#
            );
        }
    }

    #[tokio::test]
    async fn exec_runs_through_a_real_shell() {
        let config = Config {
            shell: "sh".into(),
            ..Config::default()
        };
        let state = state_with(config.clone(), ShellCommandRunner::new(config.shell));

        let body = Some(r#"{"command":"echo hi"}"#);
        let resp = route_request(request(Method::POST, "/exec", body), state).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(&resp);
        assert!(json["stdout"].as_str().unwrap().contains("hi"));
        assert_eq!(json["stderr"], "");
    }

    #[tokio::test]
    async fn exec_reports_combined_output_as_stdout() {
        let state = state_with(Config::default(), StubRunner(|_| exited(0, "out\nerr\n")));

        let body = Some(r#"{"command":"whatever"}"#);
        let resp = route_request(request(Method::POST, "/exec", body), state).await;

        assert_eq!(body_text(&resp), r#"{"stdout":"out\nerr\n","stderr":""}"#);
    }

    #[tokio::test]
    async fn exec_rejects_bad_payloads() {
        let cases = [
            (Some("not json"), "Invalid request body"),
            (None, "Invalid request body"),
            (Some(r#"{"command":""}"#), "Please specify a command to run in the payload"),
            (Some("{}"), "Please specify a command to run in the payload"),
        ];

        for (body, expected) in cases {
            let resp = route_request(request(Method::POST, "/exec", body), state()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(&resp), expected);
        }
    }

    #[tokio::test]
    async fn exec_failures_are_server_errors() {
        let not_found = state_with(Config::default(), StubRunner(|_| {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such shell"))
        }));
        let body = Some(r#"{"command":"ls"}"#);
        let resp = route_request(request(Method::POST, "/exec", body), not_found).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(&resp), "Error executing command: no such shell");

        let failed = state_with(Config::default(), StubRunner(|_| exited(2, "boom")));
        let resp = route_request(request(Method::POST, "/exec", body), failed).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(&resp), "Error executing command: exit status 2");
    }

    #[tokio::test]
    async fn exec_only_accepts_post() {
        let resp = route_request(request(Method::GET, "/exec", None), state()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn hello_world() {
        let resp = route_request(request(Method::GET, "/hello/", None), state()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_text(&resp), r#"{"message":"Hello, World!"}"#);
    }

    #[tokio::test]
    async fn fetch_reuses_the_pooled_client() {
        let (url, accepted) = spawn_upstream(StatusCode::OK).await;
        let state = state();
        let body = format!(r#"{{"url":"{url}"}}"#);

        for _ in 0..100 {
            let req = request(Method::POST, "/fetch", Some(&body));
            let resp = route_request(req, state.clone()).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_text(&resp), r#"{"message":"ok!"}"#);
        }

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_rejects_bad_payloads() {
        let cases = [
            (Some("{"), "Invalid request payload"),
            (Some("{}"), "URL is required"),
            (Some(r#"{"url":""}"#), "URL is required"),
        ];

        for (body, expected) in cases {
            let resp = route_request(request(Method::POST, "/fetch", body), state()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(&resp), expected);
        }
    }

    #[tokio::test]
    async fn fetch_reports_upstream_failures() {
        let (url, _) = spawn_upstream(StatusCode::NOT_FOUND).await;
        let body = format!(r#"{{"url":"{url}"}}"#);

        let resp = route_request(request(Method::POST, "/fetch", Some(&body)), state()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(&resp).contains("404"));

        let unreachable = Some(r#"{"url":"http://127.0.0.1:1/"}"#);
        let resp = route_request(request(Method::POST, "/fetch", unreachable), state()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn cors_preflight() {
        let resp = route_request(request(Method::OPTIONS, "/cors", None), state()).await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let headers = resp.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "3600");
        assert!(resp.body().is_none());
    }

    #[tokio::test]
    async fn cors_main_request() {
        let resp = route_request(request(Method::GET, "/cors", None), state()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_text(&resp), r#"{"message":"Hello, World!"}"#);
    }

    #[tokio::test]
    async fn header_mutation_answers_empty_ok() {
        let resp = route_request(request(Method::GET, "/headers", None), state()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "0");
        assert!(resp.body().is_none());
    }

    #[test]
    fn user_agent_is_overwritten_on_a_copy() {
        let mut original = HeaderMap::new();
        original.append(USER_AGENT, HeaderValue::from_static("curl/8.0"));
        original.append(USER_AGENT, HeaderValue::from_static("second"));

        let modified = with_serverless_agent(&original);

        assert_eq!(modified.get_all(USER_AGENT).iter().count(), 1);
        assert_eq!(modified[USER_AGENT], SERVERLESS_AGENT);
        assert_eq!(original[USER_AGENT], "curl/8.0");
    }

    #[tokio::test]
    async fn redirect_is_permanent() {
        let resp = route_request(request(Method::POST, "/redirect", None), state()).await;

        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[LOCATION], "https://www.boltic.io");
        assert!(resp.body().is_none());
    }

    #[tokio::test]
    async fn counter_increments_per_request() {
        let state = state();

        for expected in 1..=5 {
            let resp = route_request(request(Method::GET, "/count", None), state.clone()).await;
            assert_eq!(body_text(&resp), format!("Instance execution count: {expected}"));
        }

        let mut req = request(Method::GET, "/count", None);
        req.headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        let resp = route_request(req, state.clone()).await;
        assert_eq!(body_text(&resp), r#"{"count":6}"#);
    }

    #[tokio::test]
    async fn counters_are_per_instance() {
        let first = state();
        let second = state();

        route_request(request(Method::GET, "/count", None), first.clone()).await;
        let resp = route_request(request(Method::GET, "/count", None), second).await;

        assert_eq!(body_text(&resp), "Instance execution count: 1");
    }

    #[tokio::test]
    async fn method_identifier() {
        let cases = [
            (Method::GET, "GET method called."),
            (Method::PATCH, "PATCH method called."),
            (Method::HEAD, "Unsupported method."),
        ];

        for (method, expected) in cases {
            let resp = route_request(request(method, "/method", None), state()).await;
            let json = body_json(&resp);
            assert_eq!(json["message"], expected);
        }
    }

    #[tokio::test]
    async fn body_size_counts_bytes() {
        let resp = route_request(request(Method::POST, "/body-size", Some("hello")), state()).await;
        assert_eq!(
            body_text(&resp),
            r#"{"message":"Body size calculated successfully","bodySizeBytes":5,"bodySizeMB":0.0}"#
        );

        let resp = route_request(request(Method::GET, "/body-size", None), state()).await;
        let json = body_json(&resp);
        assert_eq!(json["bodySizeBytes"], 0);
    }

    #[tokio::test]
    async fn unknown_route() {
        let resp = route_request(request(Method::GET, "/nope", None), state()).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(&resp), "Unknown route GET /nope");
    }

    #[tokio::test]
    async fn dns_resolves_localhost() {
        let body = Some(r#"{"domain":"localhost"}"#);
        let resp = route_request(request(Method::POST, "/dns", body), state()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(&resp);
        assert_eq!(json["domain"], "localhost");
        assert_eq!(json["reachable"], true);

        let ips = json["dns_stats"]["ip_addresses"].as_array().unwrap();
        assert!(!ips.is_empty());
        for ip in ips {
            let ip: std::net::IpAddr = ip.as_str().unwrap().parse().unwrap();
            assert!(ip.is_loopback(), "{ip}");
        }
    }

    #[tokio::test]
    async fn dns_strips_the_scheme() {
        let body = Some(r#"{"domain":"http://localhost"}"#);
        let resp = route_request(request(Method::POST, "/dns", body), state()).await;

        let json = body_json(&resp);
        assert_eq!(json["domain"], "localhost");
        assert_eq!(json["reachable"], true);
    }

    #[tokio::test]
    async fn dns_failure_is_reported_in_the_body() {
        let body = Some(r#"{"domain":"nonexistent.invalid"}"#);
        let resp = route_request(request(Method::POST, "/dns", body), state()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(&resp);
        assert_eq!(json["reachable"], false);
        assert_eq!(json["dns_stats"]["error"], "DNS statistics not available");
        assert!(json["dns_stats"]["exception"].is_string());
        assert!(json["dns_stats"].get("ip_addresses").is_none());
    }

    #[tokio::test]
    async fn dns_rejects_bad_payloads() {
        let cases = [
            (Some("nope"), "Invalid request payload"),
            (Some("{}"), "Domain not provided in request body"),
            (Some(r#"{"domain":"https://"}"#), "Domain not provided in request body"),
        ];

        for (body, expected) in cases {
            let resp = route_request(request(Method::POST, "/dns", body), state()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(&resp), expected);
        }
    }
}
