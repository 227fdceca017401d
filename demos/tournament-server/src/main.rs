use std::sync::atomic::{AtomicU64, Ordering};

use gauntlet::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Development authenticator
// ---------------------------------------------------------------------------

/// Lets everyone in. A numeric token becomes the user id; anything else
/// gets a fresh one.
struct DevAuth {
    next_guest: AtomicU64,
}

impl DevAuth {
    fn new() -> Self {
        Self {
            next_guest: AtomicU64::new(1_000_000),
        }
    }
}

impl Authenticator for DevAuth {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        let user_id = token
            .parse()
            .unwrap_or_else(|_| self.next_guest.fetch_add(1, Ordering::Relaxed));
        Ok(Identity {
            user_id,
            display_name: String::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

struct Settings {
    addr: String,
    seed: Option<u64>,
    config: TournamentConfig,
}

/// Reads `PORT`, `GAUNTLET_SEED`, and `GAUNTLET_RESOLUTION` through `var`.
fn settings_from(var: impl Fn(&str) -> Option<String>) -> Settings {
    let port = var("PORT")
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);
    let seed = var("GAUNTLET_SEED").and_then(|s| s.parse().ok());
    let resolution = match var("GAUNTLET_RESOLUTION").as_deref() {
        Some("server") => Resolution::ServerSimulated,
        _ => Resolution::ClientReported,
    };
    Settings {
        addr: format!("0.0.0.0:{port}"),
        seed,
        config: TournamentConfig {
            resolution,
            ..TournamentConfig::default()
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = settings_from(|key| std::env::var(key).ok());
    tracing::info!(addr = %settings.addr, resolution = ?settings.config.resolution, "starting tournament server");

    let mut builder = GauntletServerBuilder::new()
        .bind(&settings.addr)
        .tournament_config(settings.config);
    if let Some(seed) = settings.seed {
        builder = builder.seed(seed);
    }
    let server = builder.build(DevAuth::new()).await?;

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_auth_numeric_token_becomes_user_id() {
        let identity = DevAuth::new().authenticate("77").await.unwrap();
        assert_eq!(identity.user_id, 77);
        assert!(identity.display_name.is_empty());
    }

    #[tokio::test]
    async fn test_dev_auth_blank_token_gets_distinct_guest_ids() {
        let auth = DevAuth::new();
        let a = auth.authenticate("").await.unwrap();
        let b = auth.authenticate("guest").await.unwrap();
        assert_ne!(a.user_id, b.user_id);
    }

    #[test]
    fn test_settings_from_defaults_without_env() {
        let settings = settings_from(|_| None);
        assert_eq!(settings.addr, "0.0.0.0:3000");
        assert_eq!(settings.seed, None);
        assert_eq!(settings.config.resolution, Resolution::ClientReported);
    }

    #[test]
    fn test_settings_from_reads_port_seed_and_resolution() {
        let settings = settings_from(|key| match key {
            "PORT" => Some("9001".into()),
            "GAUNTLET_SEED" => Some("5".into()),
            "GAUNTLET_RESOLUTION" => Some("server".into()),
            _ => None,
        });
        assert_eq!(settings.addr, "0.0.0.0:9001");
        assert_eq!(settings.seed, Some(5));
        assert_eq!(settings.config.resolution, Resolution::ServerSimulated);
    }
}
