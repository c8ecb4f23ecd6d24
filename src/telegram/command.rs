//! Bot command token parsing

/// Normalize the text covered by a `bot_command` entity into a command token:
/// everything before the first space, lowercased.
pub fn parse_command(entity_text: &str) -> String {
    entity_text
        .split(' ')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Resolve `/cmd@BotName` against the configured bot username.
///
/// Returns the bare command when it is addressed to us, `None` when it names
/// another bot. Without a configured username the token is returned untouched.
pub fn strip_mention<'a>(command: &'a str, bot_username: Option<&str>) -> Option<&'a str> {
    let Some(username) = bot_username else {
        return Some(command);
    };
    let username = username.trim_start_matches('@');
    match command.split_once('@') {
        Some((name, target)) if target.eq_ignore_ascii_case(username) => Some(name),
        Some(_) => None,
        None => Some(command),
    }
}

/// Registered command names are stored with their leading slash.
pub fn normalize_registered(command: &str) -> String {
    if command.starts_with('/') {
        command.to_string()
    } else {
        format!("/{command}")
    }
}
