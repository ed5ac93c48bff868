//! Minimal client for the destination store's hierarchical REST API.
//!
//! A [`DestinationRef`] points at one location in the destination tree.
//! Deriving a child never touches the network; every data operation is a
//! single request through the configured [`Transport`].

use std::{fmt, sync::Arc, time::Duration};

use envconfig::Envconfig;
use http::Method;
use serde::Serialize;
use serde_json::Value;

mod error;
mod memory;
mod transport;

pub use error::{DestError, DestResult};
pub use memory::MemoryTransport;
pub use transport::{HttpTransport, Transport};

#[derive(Envconfig, Clone, Debug)]
pub struct DestinationConfig {
    #[envconfig(from = "OMIG_DEST_URL")]
    pub url: Option<String>,
    #[envconfig(from = "OMIG_DEST_SECRET")]
    pub secret: Option<String>,
    #[envconfig(from = "OMIG_DEST_TIMEOUT_MS", default = "30000")]
    pub timeout_ms: u64,
}

impl DestinationConfig {
    /// Root reference over HTTP.
    pub fn connect(&self) -> DestResult<DestinationRef> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| DestError::config_error("OMIG_DEST_URL is not set"))?;
        let transport =
            HttpTransport::new(Duration::from_millis(self.timeout_ms))?;
        Ok(DestinationRef::new(
            url.clone(),
            self.secret.clone(),
            Arc::new(transport),
        ))
    }
}

#[derive(Clone)]
pub struct DestinationRef {
    location: String,
    secret: Option<String>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for DestinationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationRef")
            .field("location", &self.location)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish()
    }
}

impl DestinationRef {
    pub fn new<S: Into<String>>(
        location: S,
        secret: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            location: location.into(),
            secret,
            transport,
        }
    }

    /// Reference to a path below this one. Does not affect `self`.
    pub fn child(&self, path: &str) -> DestResult<Self> {
        if path.is_empty() {
            return Err(DestError::InvalidPath(
                "child() expected a non-empty path".into(),
            ));
        }
        let location = if self.location.ends_with('/') || path.starts_with('/')
        {
            format!("{}{}", self.location, path)
        } else {
            format!("{}/{}", self.location, path)
        };
        Ok(Self {
            location,
            secret: self.secret.clone(),
            transport: self.transport.clone(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Fully qualified request target, including the secret if any.
    pub fn url(&self) -> String {
        match &self.secret {
            Some(secret) => format!("{}.json?auth={}", self.location, secret),
            None => format!("{}.json", self.location),
        }
    }

    /// Stored value, or `Value::Null` when nothing is stored here.
    pub async fn get(&self) -> DestResult<Value> {
        self.transport.request(Method::GET, &self.url(), None).await
    }

    /// Overwrite the whole value at this reference.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> DestResult<Value> {
        self.send(Method::PUT, value).await
    }

    /// Merge the given fields without touching keys absent from `value`.
    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> DestResult<Value> {
        self.send(Method::PATCH, value).await
    }

    /// Create a child with a server generated key and return that key.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> DestResult<String> {
        let response = self.send(Method::POST, value).await?;
        response
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DestError::UnexpectedResponse(response.to_string()))
    }

    pub async fn delete(&self) -> DestResult<()> {
        self.transport
            .request(Method::DELETE, &self.url(), None)
            .await?;
        Ok(())
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        value: &T,
    ) -> DestResult<Value> {
        let body = serde_json::to_value(value)?;
        self.transport.request(method, &self.url(), Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(secret: Option<&str>) -> DestinationRef {
        DestinationRef::new(
            "https://myapp.example.com",
            secret.map(str::to_string),
            Arc::new(MemoryTransport::new()),
        )
    }

    #[test]
    fn test_urls_without_secret() {
        let r = root(None);
        assert_eq!(r.url(), "https://myapp.example.com.json");
        assert_eq!(
            r.child("foo").unwrap().child("/bar").unwrap().url(),
            "https://myapp.example.com/foo/bar.json"
        );
    }

    #[test]
    fn test_urls_with_secret() {
        let r = root(Some("someMagicString"));
        assert_eq!(
            r.url(),
            "https://myapp.example.com.json?auth=someMagicString"
        );
        assert_eq!(
            r.child("foo").unwrap().child("/bar").unwrap().url(),
            "https://myapp.example.com/foo/bar.json?auth=someMagicString"
        );
    }

    #[test]
    fn test_child_rejects_empty_path() {
        assert!(matches!(
            root(None).child(""),
            Err(DestError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_child_does_not_modify_parent() {
        let r = root(None);
        let _child = r.child("a/").unwrap().child("b").unwrap();
        assert_eq!(r.location(), "https://myapp.example.com");
        assert_eq!(_child.location(), "https://myapp.example.com/a/b");
    }

    #[test]
    fn test_debug_hides_secret() {
        let out = format!("{:?}", root(Some("topsecret")));
        assert!(!out.contains("topsecret"));
    }
}
