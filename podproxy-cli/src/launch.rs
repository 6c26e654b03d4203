use podproxy_common::{ENV_PREFIX, MAX_NAME_LEN};
use std::collections::BTreeMap;

/// Hex digits of randomness at the end of generated worker names
pub const WORKER_SUFFIX_LEN: usize = 8;

/// Keep only the variables a worker pod should inherit.
pub fn collect_prefixed_envs<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Build a pod name of the form `<node>-worker-<random>`.
///
/// The node part is lowercased, anything outside `[a-z0-9]` becomes `-`,
/// and it is shortened so the whole name stays a valid pod name.
pub fn generate_worker_name(node: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..WORKER_SUFFIX_LEN];

    let sanitized: String = node
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();

    let budget = MAX_NAME_LEN - "-worker-".len() - WORKER_SUFFIX_LEN;
    let prefix: String = sanitized.chars().take(budget).collect();
    let prefix = prefix.trim_matches('-');

    if prefix.is_empty() {
        format!("worker-{}", suffix)
    } else {
        format!("{}-worker-{}", prefix, suffix)
    }
}
