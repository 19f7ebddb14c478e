//! Configuration for citizenwater
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::fmt;
use std::net::SocketAddr;

/// Which service this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Registration, login and token validation
    Auth,
    /// Observation submission and queries
    Observations,
    /// Reward ledger and leaderboard
    Rewards,
    /// Forwards /gateway/* to the other services
    Gateway,
    /// Auth, observations and rewards in one process, gateway answered locally
    All,
}

impl Role {
    pub fn serves_auth(self) -> bool {
        matches!(self, Role::Auth | Role::All)
    }

    pub fn serves_observations(self) -> bool {
        matches!(self, Role::Observations | Role::All)
    }

    pub fn serves_rewards(self) -> bool {
        matches!(self, Role::Rewards | Role::All)
    }

    pub fn serves_gateway(self) -> bool {
        matches!(self, Role::Gateway | Role::All)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Auth => "auth",
            Role::Observations => "observations",
            Role::Rewards => "rewards",
            Role::Gateway => "gateway",
            Role::All => "all",
        };
        f.write_str(name)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Citizen Science Water services
#[derive(Parser, Debug, Clone)]
#[command(name = "citizenwater")]
#[command(
    about = "Citizen science water quality services: auth, observations, rewards and gateway"
)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Service role for this process
    #[arg(long, env = "ROLE", value_enum, default_value_t = Role::All)]
    pub role: Role,

    /// Enable development mode (relaxes admin checks, allows a default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI (in-memory stores when absent)
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "citizenwater")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Base URL of the auth service
    #[arg(long, env = "AUTH_URL")]
    pub auth_url: Option<String>,

    /// Base URL of the observation service
    #[arg(long, env = "OBSERVATIONS_URL")]
    pub observations_url: Option<String>,

    /// Base URL of the rewards service
    #[arg(long, env = "REWARDS_URL")]
    pub rewards_url: Option<String>,

    /// Timeout for outbound service calls in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.role == Role::Gateway {
            let missing: Vec<&str> = [
                ("AUTH_URL", &self.auth_url),
                ("OBSERVATIONS_URL", &self.observations_url),
                ("REWARDS_URL", &self.rewards_url),
            ]
            .into_iter()
            .filter(|(_, url)| url.is_none())
            .map(|(name, _)| name)
            .collect();

            if !missing.is_empty() {
                return Err(format!("Gateway role requires {}", missing.join(", ")));
            }
        }

        Ok(())
    }

    /// Short name of the storage backend in use
    pub fn backend_name(&self) -> &'static str {
        if self.mongodb_uri.is_some() {
            "mongodb"
        } else {
            "memory"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["citizenwater"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&["--role", "rewards"]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--role",
            "rewards",
            "--jwt-secret",
            "a-secret-that-is-long-enough-0123456789",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_gateway_requires_upstreams() {
        let args = parse(&["--dev-mode", "--role", "gateway", "--auth-url", "http://auth:8081"]);
        let err = args.validate().unwrap_err();
        assert!(err.contains("OBSERVATIONS_URL"));
        assert!(err.contains("REWARDS_URL"));
        assert!(!err.contains("AUTH_URL,"));
    }

    #[test]
    fn test_dev_mode_all_roles() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(args.role.serves_auth());
        assert!(args.role.serves_gateway());
        assert_eq!(args.backend_name(), "memory");
    }
}
