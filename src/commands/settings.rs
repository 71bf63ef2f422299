//! `settings` subcommand: edit the draft, then commit it.

use anyhow::Result;

use crate::commands::AppContext;
use crate::gateway::url::normalize_relay_base;
use crate::gateway::GatewayConfig;

/// Field changes requested on the command line. `None` leaves a field as is;
/// an empty string clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct SettingsEdit {
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub relay_url: Option<String>,
    pub access_id: Option<String>,
    pub access_secret: Option<String>,
    pub auto_post: Option<bool>,
    pub output_channel_id: Option<String>,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl SettingsEdit {
    pub fn is_empty(&self) -> bool {
        self.bot_token.is_none()
            && self.channel_id.is_none()
            && self.relay_url.is_none()
            && self.access_id.is_none()
            && self.access_secret.is_none()
            && self.auto_post.is_none()
            && self.output_channel_id.is_none()
    }

    pub fn apply(&self, draft: &mut GatewayConfig) {
        if let Some(token) = &self.bot_token {
            draft.bot_token = token.trim().to_string();
        }
        if let Some(channel) = &self.channel_id {
            draft.channel_id = channel.trim().to_string();
        }
        if let Some(url) = &self.relay_url {
            draft.relay_url = normalize_relay_base(url);
        }
        if let Some(id) = &self.access_id {
            draft.access_id = optional(id);
        }
        if let Some(secret) = &self.access_secret {
            draft.access_secret = optional(secret);
        }
        if let Some(auto_post) = self.auto_post {
            draft.auto_post = auto_post;
        }
        if let Some(output) = &self.output_channel_id {
            draft.output_channel_id = optional(output);
        }
        if draft.relay_url.trim().is_empty() {
            draft.relay_url = normalize_relay_base("");
        }
    }
}

/// Human-readable view with secrets masked.
pub fn render(config: &GatewayConfig) -> String {
    let mask = |v: &Option<String>| match v {
        Some(_) => "****".to_string(),
        None => "-".to_string(),
    };
    format!(
        "  Bot token:      {}\n  Channel:        {}\n  Relay URL:      {}\n  Access id:      {}\n  Access secret:  {}\n  Auto-post:      {}\n  Output channel: {}",
        config.masked_token(),
        config.channel_id,
        config.relay_url,
        config.access_id.as_deref().unwrap_or("-"),
        mask(&config.access_secret),
        if config.auto_post { "on" } else { "off" },
        config.target_channel(),
    )
}

pub fn show(ctx: &AppContext) -> Result<()> {
    println!("📁 Storage: {}", ctx.store.dir().display());
    match ctx.store.load_committed() {
        Some(config) => println!("\n✅ Active configuration:\n{}", render(&config)),
        None => println!("\n⚪ No active configuration"),
    }
    match ctx.store.load_draft() {
        Some(draft) if Some(&draft) != ctx.store.load_committed().as_ref() => {
            println!("\n📝 Uncommitted draft:\n{}", render(&draft))
        }
        Some(_) => {}
        None => println!("\n📝 No draft"),
    }
    Ok(())
}

pub fn edit(ctx: &AppContext, changes: &SettingsEdit) -> Result<()> {
    if changes.is_empty() {
        anyhow::bail!("Nothing to change; pass at least one field (see `settings edit --help`)");
    }
    let draft = ctx.store.edit_draft(|draft| changes.apply(draft))?;
    println!("📝 Draft saved:\n{}", render(&draft));
    if let Err(e) = draft.validate() {
        println!("⚠️  Draft is incomplete: {}", e);
    } else {
        println!("Run `settings commit` to activate it.");
    }
    Ok(())
}

pub fn commit(ctx: &AppContext) -> Result<()> {
    let config = ctx.store.commit()?;
    println!("✅ Configuration committed:\n{}", render(&config));
    Ok(())
}

pub fn discard(ctx: &AppContext) -> Result<()> {
    if ctx.store.discard_draft()? {
        println!("🗑️  Draft discarded");
    } else {
        println!("No draft to discard");
    }
    Ok(())
}

pub fn clear(ctx: &AppContext) -> Result<()> {
    if ctx.store.clear()? {
        println!("🗑️  Active configuration removed");
    } else {
        println!("No active configuration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_normalizes_and_clears() {
        let mut draft = GatewayConfig {
            access_id: Some("old".into()),
            ..Default::default()
        };
        SettingsEdit {
            bot_token: Some("  tok  ".into()),
            channel_id: Some("42".into()),
            relay_url: Some("relay.example.com".into()),
            access_id: Some(String::new()),
            auto_post: Some(true),
            ..Default::default()
        }
        .apply(&mut draft);

        assert_eq!(draft.bot_token, "tok");
        assert_eq!(draft.relay_url, "https://relay.example.com/api/discord");
        assert_eq!(draft.access_id, None);
        assert!(draft.auto_post);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn untouched_relay_url_gets_default() {
        let mut draft = GatewayConfig::default();
        SettingsEdit {
            channel_id: Some("42".into()),
            ..Default::default()
        }
        .apply(&mut draft);
        assert_eq!(draft.relay_url, "http://localhost:3001/api/discord");
    }

    #[test]
    fn render_masks_secrets() {
        let config = GatewayConfig {
            bot_token: "abcdefgh1234".into(),
            channel_id: "42".into(),
            relay_url: "http://localhost:3001/api/discord".into(),
            access_id: Some("cid".into()),
            access_secret: Some("topsecret".into()),
            ..Default::default()
        };
        let text = render(&config);
        assert!(!text.contains("abcdefgh"));
        assert!(!text.contains("topsecret"));
        assert!(text.contains("****1234"));
        assert!(text.contains("Output channel: 42"));
    }

    #[test]
    fn empty_edit_detected() {
        assert!(SettingsEdit::default().is_empty());
        assert!(!SettingsEdit {
            auto_post: Some(false),
            ..Default::default()
        }
        .is_empty());
    }
}
