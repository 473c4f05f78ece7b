//! Command dispatch: bridges CLI args -> client calls -> output formatting.

pub mod config_cmd;
pub mod data;
pub mod switches;
pub mod util;

use bigdb_api::BigDbClient;

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &BigDbClient,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    match cmd {
        Command::Get(args) => data::get(client, &args.path, global, format).await,
        Command::Schema(args) => data::schema(client, &args.path, global, format).await,
        Command::Post(args) => data::post(client, args, global, format).await,
        Command::Put(args) => data::put(client, args, global, format).await,
        Command::Patch(args) => data::patch(client, args, global, format).await,
        Command::Delete(args) => data::delete(client, &args, global, format).await,
        Command::Rpc(args) => data::rpc(client, args, global, format).await,
        Command::Switches(args) => switches::handle(client, args, global, format).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "does not take a controller connection".into(),
        }),
    }
}
