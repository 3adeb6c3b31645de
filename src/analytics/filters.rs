use regex::Regex;
use std::sync::LazyLock;

/// Pattern source shared with the warehouse queries, which lower-case the
/// contributor before matching.
pub const BLACKLIST_PATTERN: &str = "(copilot|claude|codex)";

static REPO_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("valid regex"));

static BLACKLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){BLACKLIST_PATTERN}")).expect("valid regex")
});

/// `owner/name` made only of `[A-Za-z0-9_.-]`.
pub fn is_valid_repo_name(name: &str) -> bool {
    REPO_NAME.is_match(name)
}

/// Bot and agent identities excluded from candidate lists and contributor counts.
pub fn is_blacklisted(name: &str) -> bool {
    BLACKLIST.is_match(name)
}

/// Names that pass the pattern check, in input order.
pub fn valid_repo_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| is_valid_repo_name(name))
        .map(str::to_string)
        .collect()
}
