//! Deterministic context-key derivation (§4.5 "Context keying").

/// Derive the isolated conversation surface key for a message.
///
/// `thread_id` takes precedence over `channel_id`, which takes precedence
/// over falling back to a per-user DM key (§8 scenario 2).
#[must_use]
pub fn context_key(
    _guild_id: Option<&str>,
    channel_id: Option<&str>,
    thread_id: Option<&str>,
    user_id: &str,
) -> String {
    if let Some(thread_id) = thread_id {
        format!("thread:{thread_id}")
    } else if let Some(channel_id) = channel_id {
        format!("channel:{channel_id}")
    } else {
        format!("dm:{user_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::context_key;

    #[test]
    fn scenario_2_channel_key() {
        assert_eq!(context_key(Some("G"), Some("C"), None, "U"), "channel:C");
    }

    #[test]
    fn scenario_2_dm_key_when_nothing_else_present() {
        assert_eq!(context_key(None, None, None, "U"), "dm:U");
    }

    #[test]
    fn scenario_2_thread_key_overrides_channel() {
        assert_eq!(context_key(Some("G"), Some("C"), Some("T"), "U"), "thread:T");
    }
}
