//! Fabric switch commands.

use bigdb_api::{BigDbClient, Switch, SwitchConfig};
use tabled::Tabled;

use crate::cli::{GlobalOpts, OutputFormat, SwitchRef, SwitchesArgs, SwitchesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct SwitchRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "DPID")]
    dpid: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Leaf Group")]
    leaf_group: String,
}

impl From<&Switch> for SwitchRow {
    fn from(sw: &Switch) -> Self {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            name: field(&sw.name),
            dpid: field(&sw.dpid),
            role: field(&sw.fabric_role),
            leaf_group: field(&sw.leaf_group),
        }
    }
}

fn not_found(sel: &SwitchRef) -> CliError {
    let what = match (&sel.name, &sel.dpid) {
        (_, Some(dpid)) => format!("switch with dpid {dpid}"),
        (Some(name), None) => format!("switch '{name}'"),
        (None, None) => "switch".into(),
    };
    CliError::NotFound { what }
}

fn print_switches(
    switches: &[Switch],
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let out = output::render_list(format, switches, |sw: &Switch| SwitchRow::from(sw))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(
    client: &BigDbClient,
    args: SwitchesArgs,
    global: &GlobalOpts,
    format: OutputFormat,
) -> Result<(), CliError> {
    let fabric = client.fabric();

    match args.command {
        SwitchesCommand::List => {
            let switches = fabric.switches().await?;
            print_switches(&switches, global, format)
        }

        SwitchesCommand::Show(sel) => {
            let found = match (&sel.name, &sel.dpid) {
                (_, Some(dpid)) => fabric.switch_by_dpid(dpid).await?,
                (Some(name), None) => fabric.switch_by_name(name).await?,
                (None, None) => None,
            };
            let sw = found.ok_or_else(|| not_found(&sel))?;
            print_switches(std::slice::from_ref(&sw), global, format)
        }

        SwitchesCommand::Add {
            name,
            dpid,
            role,
            leaf_group,
        } => {
            let config = SwitchConfig {
                name,
                dpid,
                fabric_role: role,
                leaf_group,
            };
            match fabric.add_switch(&config).await? {
                Some(sw) => print_switches(std::slice::from_ref(&sw), global, format),
                None => {
                    if !global.quiet {
                        eprintln!("switch '{}' configured", config.name);
                    }
                    Ok(())
                }
            }
        }

        SwitchesCommand::Remove(sel) => {
            let label = sel.dpid.as_deref().or(sel.name.as_deref()).unwrap_or_default();
            if !util::confirm(&format!("Remove switch {label}?"), global.yes)? {
                return Ok(());
            }
            match (&sel.name, &sel.dpid) {
                (_, Some(dpid)) => fabric.remove_switch_by_dpid(dpid).await?,
                (Some(name), None) => fabric.remove_switch_by_name(name).await?,
                (None, None) => return Err(not_found(&sel)),
            }
            Ok(())
        }

        SwitchesCommand::Interfaces { dpid } => {
            let value = fabric.interfaces(&dpid).await?;
            output::print_output(&output::render_value(format, &value)?, global.quiet);
            Ok(())
        }

        SwitchesCommand::Connections { dpid } => {
            let value = fabric.connections(&dpid).await?;
            output::print_output(&output::render_value(format, &value)?, global.quiet);
            Ok(())
        }

        SwitchesCommand::Disconnect { dpid } => {
            if !util::confirm(&format!("Disconnect switch {dpid}?"), global.yes)? {
                return Ok(());
            }
            fabric.disconnect(&dpid).await?;
            Ok(())
        }
    }
}
