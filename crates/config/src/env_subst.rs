//! Placeholder expansion applied to raw config text and path values.

use std::path::{Path, PathBuf};

/// Replace `${ENV_VAR}` placeholders with values from the process environment.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Replace `${ENV_VAR}` placeholders using `lookup`, so tests don't have to
/// mutate the process environment.
pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            // `${}` or an unterminated placeholder: keep the literal text.
            _ => {
                out.push_str("${");
                rest = after;
            },
        }
    }

    out.push_str(rest);
    out
}

/// Expand a leading `~` or `~/` to `home`. Other paths are returned unchanged.
pub fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "UASP_HOME" => Some("/srv/uasp".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("dir = \"${UASP_HOME}/skills\"", lookup),
            "dir = \"/srv/uasp/skills\""
        );
    }

    #[test]
    fn substitutes_multiple_and_empty() {
        assert_eq!(
            substitute_env_with("${UASP_HOME}:${EMPTY}:${UASP_HOME}", lookup),
            "/srv/uasp::/srv/uasp"
        );
    }

    #[test]
    fn leaves_unknown_and_malformed() {
        assert_eq!(substitute_env_with("${NOPE}", lookup), "${NOPE}");
        assert_eq!(substitute_env_with("${}", lookup), "${}");
        assert_eq!(substitute_env_with("tail ${UASP", lookup), "tail ${UASP");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }

    #[test]
    fn expands_tilde_only_at_start() {
        let home = Path::new("/home/dev");
        assert_eq!(
            expand_home(Path::new("~/.agents/skills"), Some(home)),
            PathBuf::from("/home/dev/.agents/skills")
        );
        assert_eq!(expand_home(Path::new("~"), Some(home)), home);
        assert_eq!(
            expand_home(Path::new("/abs/~/x"), Some(home)),
            PathBuf::from("/abs/~/x")
        );
        assert_eq!(
            expand_home(Path::new("~/x"), None),
            PathBuf::from("~/x")
        );
    }
}
