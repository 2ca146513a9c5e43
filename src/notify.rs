//! External notification for completed locks.
//!
//! The configured command runs once per completed lock with `%s` replaced by
//! the hex transaction hash. It runs on a detached thread so no engine or
//! host critical section is ever held across process creation; failures are
//! logged and never touch engine state.

use crate::types::Hash256;
use std::process::Command;

pub fn spawn_lock_notify(command_template: &str, tx_hash: Hash256) {
    if command_template.is_empty() {
        return;
    }

    let command = command_template.replace("%s", &hex::encode(tx_hash));
    std::thread::spawn(move || {
        match Command::new("sh").arg("-c").arg(&command).status() {
            Ok(status) if status.success() => {
                tracing::debug!("🔔 Lock notify command completed: {}", command);
            }
            Ok(status) => {
                tracing::warn!("⚠️ Lock notify command exited with {}: {}", status, command);
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to launch lock notify command {}: {}", command, e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_template_is_a_noop() {
        spawn_lock_notify("", [1; 32]);
    }

    #[test]
    fn test_hash_substitution() {
        let command = "echo %s".replace("%s", &hex::encode([0xabu8; 32]));
        assert!(command.ends_with(&"ab".repeat(32)));
    }
}
