use std::collections::BTreeMap;
use std::env;

/// Best-effort host/CI context stamped onto records. Missing values are
/// simply absent; collection never fails.
#[must_use]
pub fn collect_context() -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();

    if env_var("GITHUB_ACTIONS").is_some_and(|v| v == "true" || v == "1") {
        entries.insert("ci".into(), "github_actions".into());
        insert(&mut entries, "ci_repository", env_var("GITHUB_REPOSITORY"));
        insert(&mut entries, "ci_sha", env_var("GITHUB_SHA"));
        insert(&mut entries, "ci_ref", env_var("GITHUB_REF"));
    } else if env_var("GITLAB_CI").is_some() {
        entries.insert("ci".into(), "gitlab_ci".into());
        insert(&mut entries, "ci_repository", env_var("CI_PROJECT_PATH"));
        insert(&mut entries, "ci_sha", env_var("CI_COMMIT_SHA"));
        insert(&mut entries, "ci_ref", env_var("CI_COMMIT_REF_NAME"));
    } else if env_var("CIRCLECI").is_some() {
        entries.insert("ci".into(), "circleci".into());
        insert(
            &mut entries,
            "ci_repository",
            env_var("CIRCLE_PROJECT_REPONAME"),
        );
        insert(&mut entries, "ci_sha", env_var("CIRCLE_SHA1"));
        insert(&mut entries, "ci_ref", env_var("CIRCLE_BRANCH"));
    }

    if let Some(commit) = env_var("GIT_COMMIT").or_else(|| entries.get("ci_sha").cloned()) {
        entries.insert("git_commit".into(), commit);
    }
    if let Some(reference) = env_var("GIT_REF").or_else(|| entries.get("ci_ref").cloned()) {
        entries.insert("git_ref".into(), reference);
    }
    if let Some(host) = env_var("HOSTNAME").or_else(|| env_var("COMPUTERNAME")) {
        entries.insert("host".into(), host);
    }

    entries
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn insert(map: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v);
    }
}
