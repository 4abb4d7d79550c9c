//! Target URL normalization and URI template expansion (RFC 6570, level 3).

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::RequestError;

const HTTPS_PREFIX: &str = "https://";
const HTTP_PREFIX: &str = "http://";

/// Characters escaped in simple expansions: everything but unreserved.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Characters escaped in reserved expansions (`{+var}`, `{#var}`).
const RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'%');

/// Require an explicit scheme and collapse repeated slashes in the path.
///
/// Only the part before any query or fragment is touched.
///
/// # Errors
///
/// Returns [`RequestError::UrlSchemeMissing`] when `url` starts with neither
/// `http://` nor `https://`.
pub fn normalize_url(url: &str) -> Result<String, RequestError> {
    let prefix = if url.starts_with(HTTPS_PREFIX) {
        HTTPS_PREFIX
    } else if url.starts_with(HTTP_PREFIX) {
        HTTP_PREFIX
    } else {
        return Err(RequestError::UrlSchemeMissing);
    };

    let rest = &url[prefix.len()..];
    let split = rest.find(['?', '#']).unwrap_or(rest.len());
    let (path, tail) = rest.split_at(split);

    let mut normalized = String::with_capacity(url.len());
    normalized.push_str(prefix);
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        normalized.push(c);
    }
    normalized.push_str(tail);
    Ok(normalized)
}

struct Operator {
    first: &'static str,
    separator: &'static str,
    named: bool,
    if_empty: &'static str,
    allowed: &'static AsciiSet,
}

const fn operator(symbol: Option<char>) -> Option<Operator> {
    let op = match symbol {
        None => Operator { first: "", separator: ",", named: false, if_empty: "", allowed: UNRESERVED },
        Some('+') => Operator { first: "", separator: ",", named: false, if_empty: "", allowed: RESERVED },
        Some('#') => Operator { first: "#", separator: ",", named: false, if_empty: "", allowed: RESERVED },
        Some('.') => Operator { first: ".", separator: ".", named: false, if_empty: "", allowed: UNRESERVED },
        Some('/') => Operator { first: "/", separator: "/", named: false, if_empty: "", allowed: UNRESERVED },
        Some(';') => Operator { first: ";", separator: ";", named: true, if_empty: "", allowed: UNRESERVED },
        Some('?') => Operator { first: "?", separator: "&", named: true, if_empty: "=", allowed: UNRESERVED },
        Some('&') => Operator { first: "&", separator: "&", named: true, if_empty: "=", allowed: UNRESERVED },
        Some(_) => return None,
    };
    Some(op)
}

/// Expand `{name}` expressions in `template` with `params`.
///
/// Supports the simple, reserved, fragment, label, path, path-parameter and
/// query operators with `:N` prefix modifiers.
///
/// # Errors
///
/// [`RequestError::InvalidPathTemplate`] for unbalanced braces, unknown
/// operators or malformed variable names. Variables without a value are
/// left out of the expansion.
pub fn expand_template(
    template: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, RequestError> {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(['{', '}']) {
        if rest[start..].starts_with('}') {
            return Err(RequestError::InvalidPathTemplate(format!(
                "unmatched '}}' in {template}"
            )));
        }
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            RequestError::InvalidPathTemplate(format!("unclosed expression in {template}"))
        })?;
        expand_expression(&after[..end], params, &mut expanded)?;
        rest = &after[end + 1..];
    }

    expanded.push_str(rest);
    Ok(expanded)
}

fn expand_expression(
    expression: &str,
    params: &BTreeMap<String, String>,
    out: &mut String,
) -> Result<(), RequestError> {
    let invalid = |reason: &str| RequestError::InvalidPathTemplate(format!("{reason}: {{{expression}}}"));

    let symbol = expression.chars().next().filter(|c| !is_varchar(*c));
    let op = operator(symbol).ok_or_else(|| invalid("unsupported operator"))?;
    let varlist = symbol.map_or(expression, |c| &expression[c.len_utf8()..]);
    if varlist.is_empty() {
        return Err(invalid("empty expression"));
    }

    let mut first = true;
    for varspec in varlist.split(',') {
        let (name, prefix) = parse_varspec(varspec).ok_or_else(|| invalid("malformed variable"))?;
        let Some(value) = params.get(name) else {
            continue;
        };
        let value = match prefix {
            Some(len) => value.chars().take(len).collect::<String>(),
            None => value.clone(),
        };

        out.push_str(if first { op.first } else { op.separator });
        first = false;

        if op.named {
            out.push_str(name);
            if value.is_empty() {
                out.push_str(op.if_empty);
                continue;
            }
            out.push('=');
        }
        out.extend(utf8_percent_encode(&value, op.allowed));
    }
    Ok(())
}

fn parse_varspec(varspec: &str) -> Option<(&str, Option<usize>)> {
    let varspec = varspec.strip_suffix('*').unwrap_or(varspec);
    let (name, prefix) = match varspec.split_once(':') {
        Some((name, len)) => {
            let len: usize = len.parse().ok().filter(|n| (1..10_000).contains(n))?;
            (name, Some(len))
        }
        None => (varspec, None),
    };
    (!name.is_empty() && name.chars().all(is_varchar)).then_some((name, prefix))
}

const fn is_varchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '%')
}
