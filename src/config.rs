use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Channels the bot watches for inbound posts.
    pub source_channel_ids: Vec<i64>,
    /// Channel extracted codes are republished to.
    pub target_channel_id: i64,
    /// Users allowed to issue bot commands.
    #[serde(default)]
    pub admin_user_ids: Vec<u64>,
}

/// Literal text around the relayed codes. Configurable, so the formatter
/// escapes it before sending (the codes themselves never need escaping).
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_footer")]
    pub footer: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            header: default_header(),
            footer: default_footer(),
        }
    }
}

fn default_header() -> String {
    "New codes spotted:".to_string()
}

fn default_footer() -> String {
    "Tap a code to copy it.".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.source_channel_ids.is_empty() {
            bail!("source_channel_ids must list at least one channel");
        }
        if self
            .telegram
            .source_channel_ids
            .contains(&self.telegram.target_channel_id)
        {
            bail!("target_channel_id must not be one of the source channels");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            source_channel_ids = [-1001, -1002]
            target_channel_id = -1009
            admin_user_ids = [42]

            [relay]
            header = "Fresh codes"
            footer = "Redeem fast"
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.source_channel_ids, vec![-1001, -1002]);
        assert_eq!(config.telegram.target_channel_id, -1009);
        assert_eq!(config.telegram.admin_user_ids, vec![42]);
        assert_eq!(config.relay.header, "Fresh codes");
        assert_eq!(config.relay.footer, "Redeem fast");
    }

    #[test]
    fn test_relay_section_and_admins_are_optional() {
        let config = parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            source_channel_ids = [-1001]
            target_channel_id = -1009
            "#,
        )
        .unwrap();

        assert!(config.telegram.admin_user_ids.is_empty());
        assert_eq!(config.relay.header, "New codes spotted:");
        assert_eq!(config.relay.footer, "Tap a code to copy it.");
    }

    #[test]
    fn test_empty_source_list_is_rejected() {
        let err = parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            source_channel_ids = []
            target_channel_id = -1009
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_target_in_sources_is_rejected() {
        let err = parse(
            r#"
            [telegram]
            bot_token = "123:abc"
            source_channel_ids = [-1001, -1009]
            target_channel_id = -1009
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not be one of the source"));
    }
}
