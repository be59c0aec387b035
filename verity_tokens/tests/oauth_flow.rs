use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use color_eyre::Result;
use http::{header, Method, StatusCode};
use verity_clock::{DurationSecs, UnixTime};
use verity_tokens::{
    ConfigurationError, Endpoints, HttpRequest, HttpResponse, HttpTransport, InvalidToken,
    NotRevoked, OAuthClient, OAuthClientConfig, RefreshToken, RevocationOutcome, SharedToken,
    Token, TokenRequestError, TransportError, DEFAULT_EXPIRY_THRESHOLD,
};

enum Reply {
    Respond(StatusCode, String),
    Timeout,
    Connection,
}

#[derive(Debug)]
struct Recorded {
    method: Method,
    url: String,
    content_type: Option<String>,
    accept: Option<String>,
    form: HashMap<String, String>,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    requests: Vec<Recorded>,
}

/// An authority that answers from a script and records what it was sent
#[derive(Clone, Default)]
struct MockAuthority {
    script: Arc<Mutex<Script>>,
    latency: Option<Duration>,
}

impl MockAuthority {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    fn respond(&self, status: u16, body: &str) -> &Self {
        self.push(Reply::Respond(
            StatusCode::from_u16(status).unwrap(),
            body.to_owned(),
        ))
    }

    fn push(&self, reply: Reply) -> &Self {
        self.script.lock().unwrap().replies.push_back(reply);
        self
    }

    fn requests(&self) -> Vec<Recorded> {
        std::mem::take(&mut self.script.lock().unwrap().requests)
    }
}

impl HttpTransport for MockAuthority {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let header_str = |name: header::HeaderName| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let recorded = Recorded {
            method: request.method.clone(),
            url: request.url.to_string(),
            content_type: header_str(header::CONTENT_TYPE),
            accept: header_str(header::ACCEPT),
            form: url::form_urlencoded::parse(&request.body)
                .into_owned()
                .collect(),
        };

        let reply = {
            let mut script = self.script.lock().unwrap();
            script.requests.push(recorded);
            script.replies.pop_front()
        };

        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }

        match reply {
            Some(Reply::Respond(status, body)) => Ok(HttpResponse {
                status,
                headers: http::HeaderMap::new(),
                body: body.into_bytes(),
            }),
            Some(Reply::Timeout) => Err(TransportError::timeout("deadline elapsed")),
            Some(Reply::Connection) => Err(TransportError::connection("connection refused")),
            None => Ok(HttpResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                headers: http::HeaderMap::new(),
                body: b"no reply scripted".to_vec(),
            }),
        }
    }
}

fn config() -> OAuthClientConfig {
    OAuthClientConfig::new("my-app", "my-secret", "https://my-app.example/callback").unwrap()
}

fn client(authority: &MockAuthority) -> OAuthClient {
    OAuthClient::with_transport(config(), authority.clone())
}

const TOKEN_BODY: &str = r#"{
    "access_token": "access-1",
    "refresh_token": "refresh-1",
    "token_type": "Bearer",
    "expires_in": 3600,
    "scope": "record:read note:write"
}"#;

#[test]
fn rejects_ftp_redirect_uri() {
    let err = OAuthClientConfig::new("id", "s", "ftp://x").unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidRedirectUri));
    assert_eq!(err.to_string(), "redirect_uri must be a valid HTTP(S) URL");
}

#[test]
fn redirect_uri_is_sent_as_registered() -> Result<()> {
    for registered in ["https://my-app.example", "https://My-App.example:443/cb"] {
        let authority = MockAuthority::default();
        let config = OAuthClientConfig::new("my-app", "my-secret", registered)?;
        let client = OAuthClient::with_transport(config, authority.clone());

        let request = client.authorization_url(["record:read"], None)?;
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        assert_eq!(query["redirect_uri"], registered);

        authority.respond(200, TOKEN_BODY);
        client.exchange_code_for_token("code-123")?;
        let sent = authority.requests();
        assert_eq!(sent[0].form["redirect_uri"], registered);
    }
    Ok(())
}

#[test]
fn authorization_code_flow() -> Result<()> {
    let authority = MockAuthority::default();
    let client = client(&authority);

    let request = client.authorization_url(["record:read", "note:write"], None)?;
    assert_eq!(request.state.as_str().len(), 32);
    assert!(authority.requests().is_empty());

    authority.respond(200, TOKEN_BODY);
    let token = client.exchange_code_for_token("code-123")?;

    let sent = authority.requests();
    assert_eq!(sent.len(), 1);
    let sent = &sent[0];
    assert_eq!(sent.method, Method::POST);
    assert_eq!(sent.url, "https://api.verity.io/oauth/token");
    assert_eq!(
        sent.content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(sent.accept.as_deref(), Some("application/json"));
    assert_eq!(sent.form["grant_type"], "authorization_code");
    assert_eq!(sent.form["code"], "code-123");
    assert_eq!(sent.form["redirect_uri"], "https://my-app.example/callback");
    assert_eq!(sent.form["client_id"], "my-app");
    assert_eq!(sent.form["client_secret"], "my-secret");

    assert_eq!(token.access_token().expose(), "access-1");
    assert_eq!(token.refresh_token().map(RefreshToken::expose), Some("refresh-1"));
    assert_eq!(token.expires_in(), Some(DurationSecs(3600)));
    assert_eq!(
        token.expires_at(),
        Some(token.created_at() + DurationSecs(3600))
    );
    assert_eq!(token.scope().to_string(), "note:write record:read");
    assert!(!token.is_expired());
    assert!(token.client().is_some());
    assert_eq!(token.authorization_header(), "Bearer access-1");

    Ok(())
}

#[test]
fn sandbox_endpoints_are_used() -> Result<()> {
    let authority = MockAuthority::default();
    let config = config().with_endpoints(Endpoints::from_bases(
        "http://localhost:4000",
        "http://localhost:4001/api",
    )?);
    let client = OAuthClient::with_transport(config, authority.clone());

    let request = client.authorization_url(["task:read"], None)?;
    assert!(request
        .url
        .as_str()
        .starts_with("http://localhost:4000/authorize?"));

    authority.respond(200, TOKEN_BODY);
    client.exchange_code_for_token("code")?;
    assert_eq!(authority.requests()[0].url, "http://localhost:4001/api/oauth/token");
    Ok(())
}

#[test]
fn refresh_keeps_refresh_token_when_not_rotated() -> Result<()> {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.respond(200, TOKEN_BODY);
    let original = client.exchange_code_for_token("code")?;

    authority.respond(
        200,
        r#"{"access_token":"access-2","expires_in":60,"scope":"record:read"}"#,
    );
    let refreshed = original.refresh()?;

    let sent = authority.requests();
    let form = &sent[1].form;
    assert_eq!(form["grant_type"], "refresh_token");
    assert_eq!(form["refresh_token"], "refresh-1");
    assert_eq!(form["client_id"], "my-app");
    assert_eq!(form["client_secret"], "my-secret");

    assert_eq!(refreshed.access_token().expose(), "access-2");
    assert_eq!(refreshed.refresh_token().map(RefreshToken::expose), Some("refresh-1"));
    assert_eq!(refreshed.expires_in(), Some(DurationSecs(60)));
    assert_eq!(refreshed.scope().to_string(), "record:read");

    // the original value is untouched
    assert_eq!(original.access_token().expose(), "access-1");
    Ok(())
}

#[test]
fn refresh_adopts_rotated_refresh_token() -> Result<()> {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.respond(200, TOKEN_BODY);
    let original = client.exchange_code_for_token("code")?;

    authority.respond(200, r#"{"access_token":"access-2","refresh_token":"refresh-2"}"#);
    let refreshed = original.refresh()?;

    assert_eq!(refreshed.refresh_token().map(RefreshToken::expose), Some("refresh-2"));
    assert_eq!(refreshed.expires_at(), None);
    assert!(!refreshed.is_expired());
    Ok(())
}

#[test]
fn client_error_is_authentication_failure() {
    let authority = MockAuthority::default();
    authority.respond(401, r#"{"error":"invalid_grant"}"#);

    let err = client(&authority).exchange_code_for_token("stale").unwrap_err();
    assert!(err.is_authentication());
    match err {
        TokenRequestError::Authentication { status, body } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn server_error_is_unexpected_status() {
    let authority = MockAuthority::default();
    authority.respond(503, "maintenance");

    let err = client(&authority)
        .refresh_token(&RefreshToken::new("refresh-1"))
        .unwrap_err();
    assert!(matches!(
        err,
        TokenRequestError::UnexpectedStatus { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
    ));
}

#[test]
fn transport_failures_are_distinguished() {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.push(Reply::Timeout);
    let err = client.exchange_code_for_token("code").unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_connection());

    authority.push(Reply::Connection);
    let err = client.exchange_code_for_token("code").unwrap_err();
    assert!(err.is_connection());
    assert!(!err.is_timeout());

    // exactly one attempt each
    assert_eq!(authority.requests().len(), 2);
}

#[test]
fn malformed_token_responses_fail() {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.respond(200, "<html>not json</html>");
    let err = client.exchange_code_for_token("code").unwrap_err();
    assert!(matches!(err, TokenRequestError::ResponseBody(_)));

    authority.respond(200, r#"{"token_type":"Bearer"}"#);
    let err = client.exchange_code_for_token("code").unwrap_err();
    assert!(matches!(err, TokenRequestError::ResponseBody(_)));

    authority.respond(200, r#"{"access_token":"a","token_type":"mac"}"#);
    let err = client.exchange_code_for_token("code").unwrap_err();
    assert!(matches!(
        err,
        TokenRequestError::InvalidToken(InvalidToken::UnsupportedTokenType(_))
    ));

    authority.respond(200, r#"{"access_token":""}"#);
    let err = client.exchange_code_for_token("code").unwrap_err();
    assert!(matches!(
        err,
        TokenRequestError::InvalidToken(InvalidToken::EmptyAccessToken)
    ));
}

#[test]
fn revocation_is_best_effort() {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.respond(200, "");
    assert!(client.revoke_token("access-1"));
    let sent = authority.requests();
    assert_eq!(sent[0].url, "https://api.verity.io/oauth/revoke");
    assert_eq!(sent[0].form["token"], "access-1");

    authority.respond(500, "boom");
    assert!(!client.revoke_token("access-1"));

    authority.push(Reply::Connection);
    assert!(!client.revoke_token(&String::from("access-1")));

    authority.respond(400, "");
    let outcome = client.revoke_token_with_outcome("access-1");
    assert!(matches!(
        outcome,
        RevocationOutcome::Rejected { status } if status == StatusCode::BAD_REQUEST
    ));

    authority.push(Reply::Timeout);
    let outcome = client.revoke_token_with_outcome("access-1");
    assert!(matches!(outcome, RevocationOutcome::Failed(ref err) if err.is_timeout()));
}

#[test]
fn token_revokes_its_access_token() -> Result<()> {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.respond(200, TOKEN_BODY);
    let token = client.exchange_code_for_token("code")?;

    authority.respond(500, "unavailable");
    let token = match token.revoke() {
        Err(NotRevoked::Refused(token)) => *token,
        other => panic!("expected a refused revocation, got {:?}", other),
    };
    assert_eq!(token.authorization_header(), "Bearer access-1");

    authority.respond(200, "");
    token.revoke()?;
    let sent = authority.requests();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2].form["token"], "access-1");
    Ok(())
}

#[test]
fn introspection_is_typed() -> Result<()> {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.respond(
        200,
        r#"{"active":true,"scope":["note:read"],"client_id":"my-app","exp":1700000000,"token_type":"Bearer","workspace_id":"ws-1"}"#,
    );
    let info = client.introspect_token("access-1")?;

    let sent = authority.requests();
    assert_eq!(sent[0].url, "https://api.verity.io/oauth/introspect");
    assert_eq!(sent[0].form["token"], "access-1");

    assert!(info.active);
    assert_eq!(info.scope.to_string(), "note:read");
    assert_eq!(info.exp, Some(UnixTime(1_700_000_000)));
    assert_eq!(info.extra["workspace_id"], "ws-1");

    authority.respond(403, "forbidden");
    let err = client.introspect_token("access-1").unwrap_err();
    assert!(err.is_authentication());
    Ok(())
}

#[test]
fn shared_token_refreshes_once_under_contention() -> Result<()> {
    let authority = MockAuthority::with_latency(Duration::from_millis(50));
    let client = client(&authority);

    let expired = Token::builder("access-0")
        .refresh_token("refresh-0")
        .created_at(UnixTime::from(std::time::SystemTime::now()) - DurationSecs(3700))
        .expires_in(DurationSecs(3600))
        .client(client)
        .build()?;
    assert!(expired.is_expired());

    authority.respond(200, TOKEN_BODY);
    let shared = SharedToken::new(expired);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || shared.refresh_if_expiring(DEFAULT_EXPIRY_THRESHOLD))
        })
        .collect();

    for handle in handles {
        let token = handle.join().unwrap()?;
        assert_eq!(token.access_token().expose(), "access-1");
    }

    assert_eq!(authority.requests().len(), 1);
    Ok(())
}

#[test]
fn shared_token_is_cleared_by_revocation() -> Result<()> {
    let authority = MockAuthority::default();
    let client = client(&authority);

    authority.respond(200, TOKEN_BODY);
    let shared = SharedToken::new(client.exchange_code_for_token("code")?);

    authority.respond(503, "");
    assert!(!shared.revoke()?);
    assert!(shared.current().is_some());

    authority.respond(200, "");
    assert!(shared.revoke()?);
    assert!(shared.current().is_none());

    assert_eq!(shared.revoke().unwrap_err(), InvalidToken::Revoked);
    assert!(matches!(
        shared.refresh().unwrap_err(),
        TokenRequestError::InvalidToken(InvalidToken::Revoked)
    ));
    Ok(())
}
