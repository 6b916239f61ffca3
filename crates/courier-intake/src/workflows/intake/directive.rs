//! Classification of inbound text and button payloads.

use super::domain::ApplicationId;
use super::moderation::ModerationAction;

/// Classified inbound text or callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Start,
    Cancel,
    Stats,
    Moderate {
        action: ModerationAction,
        application_id: ApplicationId,
    },
    /// A moderation command without a usable id; carries the usage hint.
    Malformed { usage: String },
    Reply(String),
}

impl Directive {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let mut parts = trimmed.split_whitespace();
        let command = match parts.next() {
            Some(word) if word.starts_with('/') => command_name(word),
            _ => return Directive::Reply(text.to_string()),
        };

        match command {
            "start" => Directive::Start,
            "cancel" => Directive::Cancel,
            "stats" => Directive::Stats,
            verb => match ModerationAction::from_verb(verb) {
                Some(action) => match parts.next().and_then(|raw| raw.parse::<i64>().ok()) {
                    Some(id) => Directive::Moderate {
                        action,
                        application_id: ApplicationId(id),
                    },
                    None => Directive::Malformed {
                        usage: format!("Use: /{verb} <application id>"),
                    },
                },
                None => Directive::Reply(text.to_string()),
            },
        }
    }

    /// Button payloads attached to moderation cards. Unknown payloads yield `None`.
    pub fn from_callback(data: &str) -> Option<Self> {
        ModerationAction::parse_callback(data).map(|(action, application_id)| {
            Directive::Moderate {
                action,
                application_id,
            }
        })
    }
}

/// `/start@bot_name` is addressed to this bot as well.
fn command_name(word: &str) -> &str {
    let name = &word[1..];
    name.split_once('@').map_or(name, |(name, _)| name)
}
