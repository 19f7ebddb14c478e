//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. One process serves the
//! routes of its configured role.

use citizenwater_core::{
    MemoryObservationStore, MemoryRewardStore, ObservationStore, RewardLedger, RewardStore,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{JwtValidator, MemoryUserStore, UserStore};
use crate::config::{Args, Role};
use crate::db::{MongoClient, MongoObservationStore, MongoRewardStore, MongoUserStore};
use crate::routes::{
    self, auth_routes::AUTH_PREFIX, cors_preflight, not_found_response,
    observations::OBSERVATIONS_PREFIX, rewards::REWARDS_PREFIX, BoxBody,
};
use crate::services::{ObservationSource, RewardFeed};
use crate::types::ServiceError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Store backend name reported by /health
    pub backend: &'static str,
    pub jwt: JwtValidator,
    pub users: Arc<dyn UserStore>,
    pub observations: Arc<dyn ObservationStore>,
    pub ledger: Arc<RewardLedger>,
    /// Where stored observations are credited
    pub reward_feed: RewardFeed,
    /// Where ledger rebuilds read observations from
    pub observation_source: ObservationSource,
    /// Client for gateway forwarding and service-to-service calls
    pub http: reqwest::Client,
    pub started_at: Instant,
}

impl AppState {
    /// Create AppState backed by in-memory stores
    pub fn new(args: Args) -> Result<Self, ServiceError> {
        Self::assemble(
            args,
            "memory",
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryObservationStore::new()),
            Arc::new(MemoryRewardStore::new()),
        )
    }

    /// Create AppState with MongoDB stores for the services this role runs
    pub async fn with_mongo(args: Args, mongo: &MongoClient) -> Result<Self, ServiceError> {
        let role = args.role;

        let users: Arc<dyn UserStore> = if role.serves_auth() {
            Arc::new(MongoUserStore::new(mongo).await?)
        } else {
            Arc::new(MemoryUserStore::new())
        };
        let observations: Arc<dyn ObservationStore> = if role.serves_observations() {
            Arc::new(MongoObservationStore::new(mongo).await?)
        } else {
            Arc::new(MemoryObservationStore::new())
        };
        let rewards: Arc<dyn RewardStore> = if role.serves_rewards() {
            Arc::new(MongoRewardStore::new(mongo).await?)
        } else {
            Arc::new(MemoryRewardStore::new())
        };

        Self::assemble(args, "mongodb", users, observations, rewards)
    }

    fn assemble(
        args: Args,
        backend: &'static str,
        users: Arc<dyn UserStore>,
        observations: Arc<dyn ObservationStore>,
        rewards: Arc<dyn RewardStore>,
    ) -> Result<Self, ServiceError> {
        let jwt = match &args.jwt_secret {
            Some(secret) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?,
            None if args.dev_mode => JwtValidator::new_dev(args.jwt_expiry_seconds),
            None => {
                return Err(ServiceError::Config(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(args.request_timeout_ms))
            .build()
            .map_err(|e| ServiceError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let ledger = Arc::new(RewardLedger::new(rewards));

        let reward_feed = match (args.role, &args.rewards_url) {
            (Role::All, _) => RewardFeed::Local(Arc::clone(&ledger)),
            (Role::Observations, Some(url)) => RewardFeed::Remote {
                client: http.clone(),
                rewards_url: url.clone(),
            },
            _ => RewardFeed::Disabled,
        };

        let observation_source = match (args.role, &args.observations_url) {
            (Role::All, _) => ObservationSource::Local(Arc::clone(&observations)),
            (Role::Rewards, Some(url)) => ObservationSource::Remote {
                client: http.clone(),
                observations_url: url.clone(),
            },
            _ => ObservationSource::Unavailable,
        };

        Ok(Self {
            args,
            backend,
            jwt,
            users,
            observations,
            ledger,
            reward_feed,
            observation_source,
            http,
            started_at: Instant::now(),
        })
    }
}

/// Bind the configured address and serve forever
pub async fn run(state: Arc<AppState>) -> Result<(), ServiceError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "citizenwater listening on {} as role {}",
        state.args.listen, state.args.role
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - admin checks disabled");
    }
    if state.args.role.serves_observations() {
        info!(
            "Observations stored in {}, reward feed: {}",
            state.observations.backend(),
            state.reward_feed.describe()
        );
    }
    if state.args.role.serves_rewards() {
        info!(
            "Rewards stored in {}, observation source: {}",
            state.ledger.backend(),
            state.observation_source.describe()
        );
    }

    serve(listener, state).await
}

/// Accept connections on an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServiceError> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// `path` is `prefix` or lies below it
fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    mut req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let role = state.args.role;

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(cors_preflight());
    }

    if path == "/health" || path == "/healthz" {
        return Ok(routes::common::to_boxed(routes::health_check(state)));
    }

    if role.serves_gateway() && under(&path, routes::gateway::GATEWAY_PREFIX) {
        if path == "/gateway/health" && method == Method::GET {
            return Ok(routes::gateway_health(state).await);
        }
        if role == Role::Gateway {
            return Ok(routes::forward_request(req, state).await);
        }

        // Combined process: answer gateway paths with the local handlers
        match routes::local_uri(&req) {
            Some(uri) => *req.uri_mut() = uri,
            None => return Ok(not_found_response(&path)),
        }
    }

    Ok(dispatch_api(req, state).await)
}

async fn dispatch_api(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let path = req.uri().path().to_string();
    let role = state.args.role;

    let response = if role.serves_auth() && under(&path, AUTH_PREFIX) {
        routes::handle_auth_request(req, state).await
    } else if role.serves_observations() && under(&path, OBSERVATIONS_PREFIX) {
        routes::handle_observation_request(req, state).await
    } else if role.serves_rewards() && under(&path, REWARDS_PREFIX) {
        routes::handle_rewards_request(req, state).await
    } else {
        None
    };

    response.unwrap_or_else(|| not_found_response(&path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["citizenwater"];
        argv.extend_from_slice(extra);
        let mut args = Args::parse_from(argv);
        args.mongodb_uri = None;
        args
    }

    #[test]
    fn test_under_prefix() {
        assert!(under("/api/rewards", "/api/rewards"));
        assert!(under("/api/rewards/all", "/api/rewards"));
        assert!(!under("/api/rewardsx", "/api/rewards"));
        assert!(!under("/api", "/api/rewards"));
    }

    #[tokio::test]
    async fn test_combined_role_wires_locally() {
        let state = AppState::new(args(&["--dev-mode"])).unwrap();
        assert!(matches!(state.reward_feed, RewardFeed::Local(_)));
        assert!(matches!(state.observation_source, ObservationSource::Local(_)));
        assert_eq!(state.backend, "memory");
    }

    #[tokio::test]
    async fn test_split_roles_wire_remotely() {
        let state = AppState::new(args(&[
            "--dev-mode",
            "--role",
            "observations",
            "--rewards-url",
            "http://rewards:8083",
        ]))
        .unwrap();
        assert!(matches!(state.reward_feed, RewardFeed::Remote { .. }));
        assert!(matches!(state.observation_source, ObservationSource::Unavailable));

        let state = AppState::new(args(&["--dev-mode", "--role", "rewards"])).unwrap();
        assert!(matches!(state.reward_feed, RewardFeed::Disabled));
        assert!(matches!(state.observation_source, ObservationSource::Unavailable));
    }

    #[test]
    fn test_production_without_secret_rejected() {
        let result = AppState::new(args(&["--role", "auth"]));
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
