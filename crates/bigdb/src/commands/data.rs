//! Path-level verbs: get, schema, post, put, patch, delete, rpc.

use bigdb_api::BigDbClient;
use serde_json::Value;
use tracing::debug;

use crate::cli::{GlobalOpts, OutputFormat, PathArgs, RpcArgs, WriteArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn print_value(value: &Value, global: &GlobalOpts, format: OutputFormat) -> Result<(), CliError> {
    output::print_output(&output::render_value(format, value)?, global.quiet);
    Ok(())
}

fn print_optional(
    value: Option<&Value>,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    match value {
        Some(v) => print_value(v, global, format),
        None => Ok(()),
    }
}

pub async fn get(
    client: &BigDbClient,
    args: &PathArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let node = util::node(client, args);
    debug!(path = %node, "get");
    let value = node.get_with(&util::request_options(args)).await?;
    print_value(&value, global, format)
}

pub async fn schema(
    client: &BigDbClient,
    args: &PathArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let node = util::node(client, args);
    debug!(path = %node, "schema");
    let value = node.schema_with(&util::request_options(args)).await?;
    print_value(&value, global, format)
}

pub async fn post(
    client: &BigDbClient,
    args: WriteArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let body = util::require_body(&args.body)?;
    let node = util::node(client, &args.path);
    let result = node
        .post_with(&body, &util::request_options(&args.path))
        .await?;
    print_optional(result.as_ref(), global, format)
}

pub async fn put(
    client: &BigDbClient,
    args: WriteArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let body = util::require_body(&args.body)?;
    let node = util::node(client, &args.path);
    let result = node
        .put_with(&body, &util::request_options(&args.path))
        .await?;
    print_optional(result.as_ref(), global, format)
}

pub async fn patch(
    client: &BigDbClient,
    args: WriteArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let body = util::require_body(&args.body)?;
    let node = util::node(client, &args.path);
    let result = node
        .patch_with(&body, &util::request_options(&args.path))
        .await?;
    print_optional(result.as_ref(), global, format)
}

pub async fn delete(
    client: &BigDbClient,
    args: &PathArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let node = util::node(client, args);
    if !util::confirm(&format!("Delete {node}?"), global.yes)? {
        return Ok(());
    }
    let result = node.delete_with(&util::request_options(args)).await?;
    print_optional(result.as_ref(), global, format)
}

pub async fn rpc(
    client: &BigDbClient,
    args: RpcArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let body = util::read_body(&args.body)?;
    let node = util::node(client, &args.path);
    debug!(path = %node, "rpc");
    let result = node
        .rpc_with(body.as_ref(), &util::request_options(&args.path))
        .await?;
    print_optional(result.as_ref(), global, format)
}
