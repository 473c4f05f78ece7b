// Lazy navigation over the BigDB tree
//
// A `PathNode` is just a rendered path plus a borrowed client. Navigation
// builds new nodes without I/O; the terminal verbs hand the path to the
// client.

use std::fmt;
use std::future::IntoFuture;
use std::hash::{Hash, Hasher};
use std::ops::Div;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{BigDbClient, RequestOptions};
use crate::error::Error;
use crate::predicate::{Literal, Predicate, translate};

/// A location in the remote data tree.
///
/// ```no_run
/// # async fn demo(client: &bigdb_api::BigDbClient) -> Result<(), bigdb_api::Error> {
/// let leaf = client
///     .root()
///     .child("core")
///     .child("switch_config")
///     .matching([("name", "leaf1")]);
/// assert_eq!(leaf.path(), "controller/core/switch-config[name='leaf1']");
/// let _doc = leaf.get().await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct PathNode<'c> {
    path: String,
    client: &'c BigDbClient,
}

impl<'c> PathNode<'c> {
    pub fn new(path: impl Into<String>, client: &'c BigDbClient) -> Self {
        Self {
            path: path.into(),
            client,
        }
    }

    /// The rendered path, e.g. `controller/core/switch[dpid=1]`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client(&self) -> &'c BigDbClient {
        self.client
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// Descend by field-style name (`switch_config` becomes `switch-config`).
    pub fn child(&self, name: &str) -> Self {
        self.segment(&translate(name))
    }

    /// Descend by a segment used verbatim.
    pub fn segment(&self, name: &str) -> Self {
        Self::new(format!("{}/{name}", self.path), self.client)
    }

    /// Append a bracketed predicate to the last segment.
    ///
    /// `$name` / `${name}` placeholders are replaced by the encoded literal;
    /// `$$` is a literal dollar sign.
    pub fn filter<I, K, V>(&self, template: &str, substitutions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Literal>,
    {
        self.with_predicate(&Predicate::new(template, substitutions))
    }

    /// Append one equality predicate per pair, in iteration order.
    pub fn matching<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Literal>,
    {
        pairs.into_iter().fold(self.clone(), |node, (key, value)| {
            node.with_predicate(&Predicate::equals(key.as_ref(), value))
        })
    }

    fn with_predicate(&self, predicate: &Predicate) -> Self {
        Self::new(format!("{}{predicate}", self.path), self.client)
    }

    // ── Data namespace ───────────────────────────────────────────────

    pub async fn get(&self) -> Result<Value, Error> {
        self.get_with(&RequestOptions::default()).await
    }

    pub async fn get_with(&self, options: &RequestOptions) -> Result<Value, Error> {
        self.client.get(&self.path, options).await
    }

    /// GET and deserialize into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = self.get().await?;
        serde_json::from_value(value).map_err(|e| Error::Deserialization {
            message: format!("{e} (at {})", self.path),
            body: String::new(),
        })
    }

    pub async fn post(&self, data: &(impl Serialize + ?Sized)) -> Result<Option<Value>, Error> {
        self.post_with(data, &RequestOptions::default()).await
    }

    pub async fn post_with(
        &self,
        data: &(impl Serialize + ?Sized),
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.client.post(&self.path, data, options).await
    }

    pub async fn put(&self, data: &(impl Serialize + ?Sized)) -> Result<Option<Value>, Error> {
        self.put_with(data, &RequestOptions::default()).await
    }

    pub async fn put_with(
        &self,
        data: &(impl Serialize + ?Sized),
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.client.put(&self.path, data, options).await
    }

    pub async fn patch(&self, data: &(impl Serialize + ?Sized)) -> Result<Option<Value>, Error> {
        self.patch_with(data, &RequestOptions::default()).await
    }

    pub async fn patch_with(
        &self,
        data: &(impl Serialize + ?Sized),
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.client.patch(&self.path, data, options).await
    }

    pub async fn delete(&self) -> Result<Option<Value>, Error> {
        self.delete_with(&RequestOptions::default()).await
    }

    pub async fn delete_with(&self, options: &RequestOptions) -> Result<Option<Value>, Error> {
        self.client.delete(&self.path, options).await
    }

    // ── RPC / schema namespaces ──────────────────────────────────────

    pub async fn rpc(&self, data: Option<&Value>) -> Result<Option<Value>, Error> {
        self.rpc_with(data, &RequestOptions::default()).await
    }

    pub async fn rpc_with(
        &self,
        data: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Option<Value>, Error> {
        self.client.rpc(&self.path, data, options).await
    }

    pub async fn schema(&self) -> Result<Value, Error> {
        self.schema_with(&RequestOptions::default()).await
    }

    pub async fn schema_with(&self, options: &RequestOptions) -> Result<Value, Error> {
        self.client.schema(&self.path, options).await
    }
}

// ── Trait impls ──────────────────────────────────────────────────────

impl PartialEq for PathNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for PathNode<'_> {}

impl Hash for PathNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Debug for PathNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathNode({})", self.path)
    }
}

impl fmt::Display for PathNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// `node / "switch_config"` is `node.child("switch_config")`.
impl<'c> Div<&str> for PathNode<'c> {
    type Output = PathNode<'c>;

    fn div(self, name: &str) -> Self::Output {
        self.child(name)
    }
}

impl<'c> Div<&str> for &PathNode<'c> {
    type Output = PathNode<'c>;

    fn div(self, name: &str) -> Self::Output {
        self.child(name)
    }
}

/// Awaiting a node fetches it.
impl<'c> IntoFuture for PathNode<'c> {
    type Output = Result<Value, Error>;
    type IntoFuture = BoxFuture<'c, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.get().await })
    }
}

impl<'a, 'c> IntoFuture for &'a PathNode<'c> {
    type Output = Result<Value, Error>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.get())
    }
}
