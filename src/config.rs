use clap::Parser;
use std::path::PathBuf;

pub const DEV_TOKEN_SECRET: &str = "rollcall-dev-secret";

/// Attendance sidecar: JSON requests on stdin, responses and events on stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "rollcalld", version)]
pub struct Args {
    /// Data directory to open at startup.
    #[arg(long, env = "ROLLCALL_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// HMAC key for bearer tokens.
    #[arg(long, env = "ROLLCALL_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    #[arg(long, env = "ROLLCALL_TOKEN_TTL_HOURS", default_value_t = 168)]
    pub token_ttl_hours: i64,

    /// How long a group's fetched history may be served from memory.
    #[arg(long, env = "ROLLCALL_HISTORY_CACHE_TTL_SECS", default_value_t = 30)]
    pub history_cache_ttl_secs: u64,
}

impl Args {
    pub fn token_secret(&self) -> String {
        match &self.token_secret {
            Some(s) if !s.is_empty() => s.clone(),
            _ => {
                tracing::warn!("no token secret configured; using the development secret");
                DEV_TOKEN_SECRET.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let args = Args::try_parse_from(["rollcalld"]).expect("parse");
        assert_eq!(args.token_ttl_hours, 168);
        assert_eq!(args.history_cache_ttl_secs, 30);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "rollcalld",
            "--workspace",
            "/tmp/rc",
            "--token-secret",
            "s3cret",
            "--history-cache-ttl-secs",
            "0",
        ])
        .expect("parse");
        assert_eq!(args.workspace, Some(PathBuf::from("/tmp/rc")));
        assert_eq!(args.token_secret(), "s3cret");
        assert_eq!(args.history_cache_ttl_secs, 0);
    }
}
