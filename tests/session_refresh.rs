use boxoffice::application_impl::*;
use boxoffice::application_port::*;
use boxoffice::domain_model::*;
use boxoffice::domain_port::*;
use boxoffice::infra_http::*;
use boxoffice::infra_memory::*;
use futures_util::future::join_all;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warp::Filter;
use warp::Reply;
use warp::http::StatusCode;

const EMAIL: &str = "fan@example.com";
const PASSWORD: &str = "front-row";

#[derive(Default)]
struct AuthServer {
    serial: u64,
    access: HashSet<String>,
    refresh: HashSet<String>,
    refresh_calls: usize,
    bearers_seen: Vec<Option<String>>,
}

type Shared = Arc<Mutex<AuthServer>>;

impl AuthServer {
    fn issue(&mut self) -> Value {
        self.serial += 1;
        let access = format!("T{}", self.serial);
        let refresh = format!("R{}", self.serial);
        self.access.insert(access.clone());
        self.refresh.insert(refresh.clone());
        json!({
            "token": access,
            "refreshToken": refresh,
            "tokenType": "Bearer",
            "userId": 7,
            "email": EMAIL,
            "name": "Fan",
            "expiresIn": 900,
        })
    }
}

fn status(body: Value, code: StatusCode) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&body), code).into_response()
}

async fn spawn_server(shared: Shared) -> SocketAddr {
    let with_state = warp::any().map(move || shared.clone());

    let login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state.clone())
        .map(|body: Value, state: Shared| {
            if body["email"] != EMAIL || body["password"] != PASSWORD {
                return status(json!({ "message": "bad credentials" }), StatusCode::UNAUTHORIZED);
            }
            let issued = state.lock().unwrap().issue();
            status(issued, StatusCode::OK)
        });

    let refresh = warp::path!("api" / "auth" / "refresh-token")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state.clone())
        .and_then(|body: Value, state: Shared| async move {
            state.lock().unwrap().refresh_calls += 1;
            tokio::time::sleep(Duration::from_millis(100)).await;
            let presented = body["refreshToken"].as_str().unwrap_or_default().to_owned();
            let mut server = state.lock().unwrap();
            let reply = if server.refresh.remove(&presented) {
                status(server.issue(), StatusCode::OK)
            } else {
                status(json!({ "message": "invalid refresh token" }), StatusCode::UNAUTHORIZED)
            };
            Ok::<_, Infallible>(reply)
        });

    let bookings = warp::path!("api" / "bookings" / "user")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_state.clone())
        .map(|auth: Option<String>, state: Shared| {
            let bearer = auth.and_then(|v| v.strip_prefix("Bearer ").map(str::to_owned));
            let mut server = state.lock().unwrap();
            server.bearers_seen.push(bearer.clone());
            match bearer {
                Some(token) if server.access.contains(&token) => status(json!([]), StatusCode::OK),
                _ => status(json!({ "message": "expired" }), StatusCode::UNAUTHORIZED),
            }
        });

    let (addr, server) =
        warp::serve(login.or(refresh).or(bookings)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn endpoints(addr: SocketAddr) -> ServiceEndpoints {
    let base = format!("http://{addr}");
    ServiceEndpoints {
        auth: format!("{base}/api/auth"),
        inventory: format!("{base}/api/inventory/events"),
        waiting_room: format!("{base}/waiting-room"),
        booking: format!("{base}/api/bookings"),
    }
}

async fn setup() -> (Shared, Arc<SessionClient>, Arc<MemoryCredentialStore>, ServiceEndpoints) {
    let shared = Shared::default();
    let addr = spawn_server(shared.clone()).await;
    let endpoints = endpoints(addr);
    let store = Arc::new(MemoryCredentialStore::new());
    let transport = Arc::new(ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap());
    let session = Arc::new(SessionClient::new(
        transport,
        store.clone(),
        SessionConfig::new(endpoints.clone()),
    ));
    (shared, session, store, endpoints)
}

async fn login(session: &SessionClient) {
    session
        .login(LoginInput {
            email: EMAIL.to_owned(),
            password: PASSWORD.to_owned(),
        })
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn burst_of_expired_requests_shares_one_refresh() {
    let (shared, session, store, endpoints) = setup().await;
    login(&session).await;
    assert_eq!(store.raw(ACCESS_TOKEN_KEY).as_deref(), Some("T1"));
    shared.lock().unwrap().access.clear();

    let handles = (0..5).map(|_| {
        let session = session.clone();
        let url = format!("{}/user", endpoints.booking);
        tokio::spawn(async move { session.send(HttpRequest::get(url)).await })
    });
    let results = join_all(handles).await;

    for result in results {
        assert_eq!(result.unwrap().unwrap().status, 200);
    }
    let server = shared.lock().unwrap();
    assert_eq!(server.refresh_calls, 1);
    let replayed = server
        .bearers_seen
        .iter()
        .filter(|b| b.as_deref() == Some("T2"))
        .count();
    assert_eq!(replayed, 5);
    assert_eq!(store.raw(ACCESS_TOKEN_KEY).as_deref(), Some("T2"));
    assert_eq!(store.raw(REFRESH_TOKEN_KEY).as_deref(), Some("R2"));
}

#[tokio::test]
async fn no_refresh_token_means_no_refresh_call() {
    let (shared, session, store, endpoints) = setup().await;

    let result = session
        .send(HttpRequest::get(format!("{}/user", endpoints.booking)))
        .await;

    match result {
        Err(SessionError::SessionExpired(response)) => assert_eq!(response.status, 401),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(shared.lock().unwrap().refresh_calls, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn rejected_refresh_is_not_retried() {
    let (shared, session, store, endpoints) = setup().await;
    login(&session).await;
    {
        let mut server = shared.lock().unwrap();
        server.access.clear();
        server.refresh.clear();
    }

    let result = session
        .send(HttpRequest::get(format!("{}/user", endpoints.booking)))
        .await;

    let error = result.unwrap_err();
    assert!(error.is_not_authenticated());
    assert_eq!(shared.lock().unwrap().refresh_calls, 1);
    assert!(store.is_empty());
    assert!(!session.state().is_authenticated());
}

#[tokio::test]
async fn wrong_password_is_a_plain_rejection() {
    let (shared, session, _store, _endpoints) = setup().await;

    let result = session
        .login(LoginInput {
            email: EMAIL.to_owned(),
            password: "nope".to_owned(),
        })
        .await;

    assert!(matches!(result, Err(SessionError::Unauthorized(_))));
    assert_eq!(shared.lock().unwrap().refresh_calls, 0);
}
