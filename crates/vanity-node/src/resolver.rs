//! Package resolution and the `go-import` page.

use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use vanity_types::PackageResolution;

use crate::api::{ApiError, AppState};

/// Removes a `:port` suffix from a `Host` header value.
///
/// Bracketed IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Looks up `host + path`. Unknown, and disabled, packages are all
/// [`ApiError::PackageNotFound`] so that callers cannot tell them apart.
pub async fn resolve(state: &AppState, host: &str, path: &str) -> Result<PackageResolution, ApiError> {
    let key = format!("{}{path}", strip_port(host));

    match state.registry.resolve_package(&key).await {
        Ok(package) if package.disabled => {
            tracing::debug!(path = %key, "Package is disabled");
            Err(ApiError::PackageNotFound(key))
        }
        Ok(package) => Ok(package),
        Err(err) if err.is_not_found() => {
            tracing::debug!(path = %key, reason = %err, "Package lookup missed");
            Err(ApiError::PackageNotFound(key))
        }
        Err(source) => {
            tracing::error!(path = %key, error = %source, "Package registry lookup failed");
            Err(ApiError::Registry { path: key, source })
        }
    }
}

/// Like [`resolve`], but a missing package is `Ok(None)`.
pub async fn resolve_optional(
    state: &AppState,
    host: &str,
    path: &str,
) -> Result<Option<PackageResolution>, ApiError> {
    match resolve(state, host, path).await {
        Ok(package) => Ok(Some(package)),
        Err(ApiError::PackageNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Repo root advertised in `go-import`.
///
/// Pinned packages point back at this service so that every fetch goes
/// through the ref rewriting proxy.
pub fn go_import_root(package: &PackageResolution, scheme: &str) -> String {
    if package.is_pinned() {
        format!("{scheme}://{}", package.import_prefix)
    } else {
        package.repo_root.clone()
    }
}

#[derive(Template)]
#[template(path = "package.html")]
struct PackageTemplate<'a> {
    import_prefix: &'a str,
    vcs: &'a str,
    repo_root: &'a str,
    go_source: &'a str,
    redirect_url: &'a str,
}

/// Serves the `go-import` page for `host + path`.
pub async fn serve(state: &AppState, host: &str, path: &str) -> Result<Response, ApiError> {
    let package = resolve(state, host, path).await?;
    let repo_root = go_import_root(&package, state.settings.scheme());

    let page = PackageTemplate {
        import_prefix: &package.import_prefix,
        vcs: package.vcs.as_str(),
        repo_root: &repo_root,
        go_source: &package.go_source,
        redirect_url: package.redirect_url.as_deref().unwrap_or_default(),
    }
    .render()?;

    Ok(Html(page).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanity_types::{PinnedRef, Vcs};

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
        assert_eq!(strip_port("[::1]"), "[::1]");
        assert_eq!(strip_port("example.com:"), "example.com");
    }

    #[test]
    fn test_go_import_root_unpinned() {
        let package = PackageResolution::new("example.com/foo", Vcs::Git, "https://github.com/a/foo");
        assert_eq!(go_import_root(&package, "https"), "https://github.com/a/foo");
    }

    #[test]
    fn test_go_import_root_pinned() {
        let package = PackageResolution::new("example.com/foo", Vcs::Git, "https://github.com/a/foo")
            .with_pin(PinnedRef::branch("v2").unwrap());
        assert_eq!(go_import_root(&package, "https"), "https://example.com/foo");
        assert_eq!(go_import_root(&package, "http"), "http://example.com/foo");
    }

    #[test]
    fn test_template_renders_meta_tags() {
        let page = PackageTemplate {
            import_prefix: "example.com/foo",
            vcs: "git",
            repo_root: "https://github.com/a/foo",
            go_source: "example.com/foo https://github.com/a/foo https://github.com/a/foo/tree/master{/dir} https://github.com/a/foo/blob/master{/dir}/{file}#L{line}",
            redirect_url: "https://docs.example.com",
        }
        .render()
        .unwrap();

        assert!(page.contains(
            r#"<meta name="go-import" content="example.com/foo git https://github.com/a/foo">"#
        ));
        assert!(page.contains(r#"<meta name="go-source" content="example.com/foo https://github.com/a/foo"#));
        assert!(page.contains(r#"<meta http-equiv="refresh" content="0; url=https://docs.example.com">"#));
    }

    #[test]
    fn test_template_omits_empty_fields() {
        let page = PackageTemplate {
            import_prefix: "example.com/foo",
            vcs: "hg",
            repo_root: "https://hg.example.org/foo",
            go_source: "",
            redirect_url: "",
        }
        .render()
        .unwrap();

        assert!(!page.contains("go-source"));
        assert!(!page.contains("http-equiv"));
        assert!(page.contains("go get example.com/foo"));
    }

    #[test]
    fn test_template_escapes_html() {
        let page = PackageTemplate {
            import_prefix: "example.com/foo",
            vcs: "git",
            repo_root: "https://github.com/a/foo\"><script>",
            go_source: "",
            redirect_url: "",
        }
        .render()
        .unwrap();

        assert!(!page.contains("<script>"));
    }
}
