use reqwest::Url;

/// How URI reference lines in a manifest body are transformed.
pub enum RewriteMode<'a> {
    /// Make every reference absolute against the upstream URL that was
    /// just fetched, carrying its token query parameters. The client then
    /// talks to the CDN directly, already authenticated.
    TokenBacked { base: &'a Url },
    /// Route every reference back through the relay's channel-scoped
    /// path, so the client's follow-up requests hit this relay again.
    StaticProxied {
        upstream_base: &'a str,
        channel_id: &'a str,
        proxy_dir: &'a str,
    },
}

/// Rewrite a manifest body line by line.
///
/// Directive (`#`) and blank lines pass through verbatim (trailing `\r`
/// stripped); only URI reference lines are transformed. Line order is
/// preserved.
pub fn rewrite_manifest(body: &str, mode: &RewriteMode) -> String {
    let mut out = Vec::new();

    for raw in body.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() || line.starts_with('#') {
            out.push(line.to_string());
        } else {
            out.push(rewrite_line(line, mode));
        }
    }

    out.join("\n")
}

fn rewrite_line(line: &str, mode: &RewriteMode) -> String {
    match mode {
        RewriteMode::TokenBacked { base } => rewrite_token_line(line, base),
        RewriteMode::StaticProxied {
            upstream_base,
            channel_id,
            proxy_dir,
        } => rewrite_proxied_line(line, upstream_base, channel_id, proxy_dir),
    }
}

fn is_absolute(line: &str) -> bool {
    line.starts_with("http://") || line.starts_with("https://")
}

fn rewrite_token_line(line: &str, base: &Url) -> String {
    let token_query = base.query().unwrap_or("");

    if is_absolute(line) {
        // Already absolute; a missing query string means it still needs
        // the token. One that carries a query is assumed authenticated.
        if !line.contains('?') && !token_query.is_empty() {
            return format!("{line}?{token_query}");
        }
        return line.to_string();
    }

    match base.join(line) {
        Ok(resolved) => {
            if resolved.query().is_none() && !token_query.is_empty() {
                format!("{resolved}?{token_query}")
            } else {
                resolved.to_string()
            }
        }
        // Unresolvable reference; hand it through rather than drop the line.
        Err(_) => line.to_string(),
    }
}

fn rewrite_proxied_line(line: &str, upstream_base: &str, channel_id: &str, proxy_dir: &str) -> String {
    if is_absolute(line) {
        if let Some(rest) = line.strip_prefix(upstream_base) {
            return format!("/{channel_id}/{rest}");
        }
        // Unexpected prefix; map by trailing filename so same-directory
        // segments still resolve.
        let leaf = line.rsplit('/').next().unwrap_or(line);
        return format!("/{channel_id}/{leaf}");
    }

    if line.starts_with('/') {
        return line.to_string();
    }

    format!("{proxy_dir}{line}")
}
