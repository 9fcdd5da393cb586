use std::env;
use std::path::Path;

/// Resolve the current actor identity per spec §4.6, in order:
/// `FLOW_ACTOR` env, VCS `user.email`, VCS `user.name`, `USER` env, `"unknown"`.
pub fn current_actor(repo_root: &Path) -> String {
    if let Some(v) = non_empty_env("FLOW_ACTOR") {
        return v;
    }
    if let Some(email) = crate::vcs::config_value(repo_root, "user.email") {
        if !email.is_empty() {
            return email;
        }
    }
    if let Some(name) = crate::vcs::config_value(repo_root, "user.name") {
        if !name.is_empty() {
            return name;
        }
    }
    if let Some(v) = non_empty_env("USER") {
        return v;
    }
    "unknown".to_string()
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn flow_actor_env_takes_priority() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("FLOW_ACTOR", "alice");
        }
        let actor = current_actor(Path::new("/nonexistent-repo-root"));
        assert_eq!(actor, "alice");
        unsafe {
            env::remove_var("FLOW_ACTOR");
        }
    }

    #[test]
    fn falls_back_to_unknown_with_no_signals() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::remove_var("FLOW_ACTOR");
            env::remove_var("USER");
        }
        let actor = current_actor(Path::new("/nonexistent-repo-root"));
        assert_eq!(actor, "unknown");
    }
}
