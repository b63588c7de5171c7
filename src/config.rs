use anyhow::Context;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Default)]
pub struct DiscordConfig {
    /// Lookups and pings are skipped without a token.
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub ssm_role_id: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to the staff records Postgres instance")?;

        let max_connections = match optional_var("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {value}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            max_connections,
            discord: DiscordConfig {
                bot_token: optional_var("DISCORD_BOT_TOKEN"),
                channel_id: optional_var("DISCORD_CHANNEL_ID"),
                ssm_role_id: optional_var("SSM_ROLE_ID"),
            },
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
