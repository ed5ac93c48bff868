use async_trait::async_trait;
use http::{Method, Uri};
use rand::{Rng, distr::Alphanumeric};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::{DestError, DestResult, Transport};

/// In-memory stand-in for the destination's REST tree.
///
/// Request paths are taken from the URL path with the `.json` suffix
/// removed; the host and the query string are ignored.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    root: Mutex<Value>,
    requests: Mutex<Vec<(Method, String)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<(Method, String)> {
        self.requests.lock().await.clone()
    }

    /// Snapshot of the value stored under `path` (segments joined by `/`).
    pub async fn value_at(&self, path: &str) -> Value {
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let root = self.root.lock().await;
        lookup(&root, &segments)
    }
}

fn parse_path(url: &str) -> DestResult<Vec<String>> {
    let uri: Uri = url.parse()?;
    let path = uri.path();
    let path = path.strip_suffix(".json").ok_or_else(|| {
        DestError::InvalidPath(format!("`{}` does not end in .json", path))
    })?;
    Ok(path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

fn push_key() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(19)
        .map(char::from)
        .collect();
    format!("-{}", suffix)
}

fn lookup(root: &Value, path: &[String]) -> Value {
    let mut cur = root;
    for seg in path {
        match cur.get(seg.as_str()) {
            Some(next) => cur = next,
            None => return Value::Null,
        }
    }
    match cur {
        Value::Object(map) if map.is_empty() => Value::Null,
        other => other.clone(),
    }
}

fn slot<'a>(root: &'a mut Value, path: &[String]) -> &'a mut Value {
    let mut cur = root;
    for seg in path {
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        cur = &mut cur[seg.as_str()];
    }
    cur
}

fn remove(root: &mut Value, path: &[String]) {
    let Some((last, parents)) = path.split_last() else {
        *root = Value::Null;
        return;
    };
    let mut cur = root;
    for seg in parents {
        match cur.get_mut(seg.as_str()) {
            Some(next) => cur = next,
            None => return,
        }
    }
    if let Some(map) = cur.as_object_mut() {
        map.remove(last.as_str());
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> DestResult<Value> {
        let path = parse_path(url)?;
        self.requests.lock().await.push((method.clone(), path.join("/")));
        let mut root = self.root.lock().await;
        let body = body.unwrap_or(Value::Null);
        match method {
            Method::GET => Ok(lookup(&root, &path)),
            Method::PUT => {
                if body.is_null() {
                    remove(&mut root, &path);
                } else {
                    *slot(&mut root, &path) = body.clone();
                }
                Ok(body)
            }
            Method::PATCH => {
                let Value::Object(fields) = &body else {
                    return Err(DestError::api_error(
                        400,
                        "patch expects an object",
                    ));
                };
                let target = slot(&mut root, &path);
                if !target.is_object() {
                    *target = Value::Object(Map::new());
                }
                for (key, value) in fields {
                    target[key.as_str()] = value.clone();
                }
                Ok(body)
            }
            Method::POST => {
                let key = push_key();
                let mut child = path;
                child.push(key.clone());
                *slot(&mut root, &child) = body;
                Ok(json!({ "name": key }))
            }
            Method::DELETE => {
                remove(&mut root, &path);
                Ok(Value::Null)
            }
            other => Err(DestError::api_error(
                405,
                format!("method {} not supported", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_strips_host_suffix_and_query() {
        let path =
            parse_path("https://x.example/data/foo/bar.json?auth=s").unwrap();
        assert_eq!(path, vec!["data", "foo", "bar"]);
        assert!(parse_path("https://x.example/data").is_err());
    }

    #[test]
    fn test_push_key_shape() {
        let key = push_key();
        assert_eq!(key.len(), 20);
        assert!(key.starts_with('-'));
    }

    #[test]
    fn test_remove_missing_path_is_noop() {
        let mut root = json!({"a": {"b": 1}});
        remove(&mut root, &["x".to_string(), "y".to_string()]);
        remove(&mut root, &["a".to_string(), "b".to_string()]);
        assert_eq!(root, json!({"a": {}}));
        assert_eq!(lookup(&root, &["a".to_string()]), Value::Null);
    }
}
