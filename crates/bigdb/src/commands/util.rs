//! Shared helpers for command handlers.

use std::io::{IsTerminal, Read};
use std::path::Path;

use bigdb_api::{BigDbClient, Literal, PathNode, RequestOptions};
use serde_json::Value;

use crate::cli::{BodyArgs, PathArgs};
use crate::error::CliError;

/// Build a node from a field-style path.
///
/// A leading `controller/` is optional. Plain segments go through
/// `child` (underscores become hyphens); segments carrying a bracketed
/// predicate are used verbatim. `--match` pairs are appended last.
pub fn node<'c>(client: &'c BigDbClient, args: &PathArgs) -> PathNode<'c> {
    let trimmed = args.path.trim_matches('/');
    let rest = trimmed
        .strip_prefix(bigdb_api::client::ROOT)
        .filter(|r| r.is_empty() || r.starts_with('/'))
        .unwrap_or(trimmed);

    let base = path_segments(rest)
        .into_iter()
        .filter(|s| !s.is_empty())
        .fold(client.root(), |node, segment| {
            if segment.contains('[') {
                node.segment(segment)
            } else {
                node.child(segment)
            }
        });

    base.matching(args.matches.iter().map(|(k, v)| (k.as_str(), literal(v))))
}

/// Split on `/` outside predicates; slashes inside `[...]` or a quoted
/// value belong to the segment.
fn path_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Interpret a `--match` value: booleans and integers are typed, the rest
/// are strings.
pub fn literal(raw: &str) -> Literal {
    match raw {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        _ => raw
            .parse::<i64>()
            .map_or_else(|_| Literal::from(raw), Literal::Int),
    }
}

pub fn request_options(args: &PathArgs) -> RequestOptions {
    args.param
        .iter()
        .fold(RequestOptions::new(), |opts, (k, v)| opts.param(k, v))
}

/// The request body from `--data` / `--data-file`, if any.
pub fn read_body(args: &BodyArgs) -> Result<Option<Value>, CliError> {
    let text = match (&args.data, &args.data_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) if path == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Ok(None),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

/// A body is mandatory for data mutations.
pub fn require_body(args: &BodyArgs) -> Result<Value, CliError> {
    read_body(args)?.ok_or_else(|| CliError::Validation {
        field: "--data".into(),
        reason: "a JSON body is required (use --data or --data-file)".into(),
    })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use bigdb_api::TransportConfig;

    use super::*;

    fn client() -> BigDbClient {
        BigDbClient::new(
            "http://127.0.0.1:8080".parse().unwrap(),
            &TransportConfig::default(),
        )
        .unwrap()
    }

    fn args(path: &str, matches: &[(&str, &str)]) -> PathArgs {
        PathArgs {
            path: path.into(),
            matches: matches
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            param: Vec::new(),
        }
    }

    #[test]
    fn field_style_paths() {
        let c = client();
        assert_eq!(
            node(&c, &args("core/switch_config", &[])).path(),
            "controller/core/switch-config"
        );
        assert_eq!(
            node(&c, &args("/controller/core/switch_config/", &[])).path(),
            "controller/core/switch-config"
        );
        assert_eq!(node(&c, &args("", &[])).path(), "controller");
        assert_eq!(
            node(&c, &args("controllers", &[])).path(),
            "controller/controllers"
        );
    }

    #[test]
    fn bracketed_segments_are_verbatim() {
        let c = client();
        assert_eq!(
            node(&c, &args("core/switch[name='leaf_1']/interface", &[])).path(),
            "controller/core/switch[name='leaf_1']/interface"
        );
    }

    #[test]
    fn slashes_inside_predicates_stay_in_segment() {
        let c = client();
        assert_eq!(
            node(&c, &args("core/interface[name='a/b_c']", &[])).path(),
            "controller/core/interface[name='a/b_c']"
        );
        assert_eq!(
            node(&c, &args("core/switch[name=\"x]/y\"]/port_group", &[])).path(),
            "controller/core/switch[name=\"x]/y\"]/port-group"
        );
    }

    #[test]
    fn matches_are_typed_and_ordered() {
        let c = client();
        let n = node(
            &c,
            &args("core/switch", &[("fabric_role", "leaf"), ("shutdown", "false"), ("port", "7")]),
        );
        assert_eq!(
            n.path(),
            "controller/core/switch[fabric-role='leaf'][shutdown='false'][port=7]"
        );
    }

    #[test]
    fn inline_body_parsed() {
        let body = BodyArgs {
            data: Some(r#"{"name": "leaf1"}"#.into()),
            data_file: None,
        };
        assert_eq!(read_body(&body).unwrap(), Some(serde_json::json!({ "name": "leaf1" })));

        let bad = BodyArgs {
            data: Some("{".into()),
            data_file: None,
        };
        assert!(matches!(read_body(&bad), Err(CliError::Json(_))));

        let none = BodyArgs {
            data: None,
            data_file: None,
        };
        assert!(matches!(require_body(&none), Err(CliError::Validation { .. })));
    }
}
