// Switch fabric operations
//
// Convenience layer over the generic path API for the fabric application:
// listing, adding, removing and resetting switches. Reads go through the
// fabric info tree; writes go through `core/switch-config`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::BigDbClient;
use crate::error::Error;
use crate::path::PathNode;

/// A switch as reported by the fabric info tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Switch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_group: Option<String>,
    /// Everything else the controller reports (connection state, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Configuration written when adding a switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SwitchConfig {
    pub name: String,
    pub dpid: Option<String>,
    pub fabric_role: Option<String>,
    pub leaf_group: Option<String>,
}

impl SwitchConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn dpid(mut self, dpid: impl Into<String>) -> Self {
        self.dpid = Some(dpid.into());
        self
    }

    pub fn fabric_role(mut self, role: impl Into<String>) -> Self {
        self.fabric_role = Some(role.into());
        self
    }

    pub fn leaf_group(mut self, group: impl Into<String>) -> Self {
        self.leaf_group = Some(group.into());
        self
    }
}

/// Fabric switch operations bound to a client.
#[derive(Debug, Clone, Copy)]
pub struct Fabric<'c> {
    client: &'c BigDbClient,
}

impl<'c> Fabric<'c> {
    pub fn new(client: &'c BigDbClient) -> Self {
        Self { client }
    }

    fn info(&self) -> PathNode<'c> {
        self.client
            .root()
            .child("applications")
            .child("bcf")
            .child("info")
            .child("fabric")
            .child("switch")
    }

    fn config(&self) -> PathNode<'c> {
        self.client.root().child("core").child("switch_config")
    }

    fn core_switch(&self, dpid: &str) -> PathNode<'c> {
        self.client
            .root()
            .child("core")
            .child("switch")
            .filter("dpid=$dpid", [("dpid", dpid)])
    }

    /// All switches known to the fabric.
    pub async fn switches(&self) -> Result<Vec<Switch>, Error> {
        self.info().get_as().await
    }

    pub async fn switch_by_name(&self, name: &str) -> Result<Option<Switch>, Error> {
        first(self.info().filter("name=$name", [("name", name)])).await
    }

    pub async fn switch_by_dpid(&self, dpid: &str) -> Result<Option<Switch>, Error> {
        first(self.info().filter("dpid=$dpid", [("dpid", dpid)])).await
    }

    /// Write the switch config, then read back what the fabric reports.
    pub async fn add_switch(&self, config: &SwitchConfig) -> Result<Option<Switch>, Error> {
        debug!(name = %config.name, "adding switch");
        self.config().put(config).await?;
        match self.switch_by_name(&config.name).await? {
            Some(sw) => Ok(Some(sw)),
            None => match config.dpid {
                Some(ref dpid) => self.switch_by_dpid(dpid).await,
                None => Ok(None),
            },
        }
    }

    pub async fn remove_switch_by_name(&self, name: &str) -> Result<(), Error> {
        debug!(%name, "removing switch");
        self.config()
            .filter("name=$name", [("name", name)])
            .delete()
            .await?;
        Ok(())
    }

    pub async fn remove_switch_by_dpid(&self, dpid: &str) -> Result<(), Error> {
        debug!(%dpid, "removing switch");
        self.config()
            .filter("dpid=$dpid", [("dpid", dpid)])
            .delete()
            .await?;
        Ok(())
    }

    /// Reset the switch's controller connection.
    pub async fn disconnect(&self, dpid: &str) -> Result<(), Error> {
        debug!(%dpid, "disconnecting switch");
        self.core_switch(dpid).child("disconnect").post(&true).await?;
        Ok(())
    }

    pub async fn interfaces(&self, dpid: &str) -> Result<Value, Error> {
        self.core_switch(dpid).child("interface").get().await
    }

    pub async fn connections(&self, dpid: &str) -> Result<Value, Error> {
        self.core_switch(dpid).child("connection").get().await
    }
}

async fn first(node: PathNode<'_>) -> Result<Option<Switch>, Error> {
    let switches: Vec<Switch> = node.get_as().await?;
    Ok(switches.into_iter().next())
}
