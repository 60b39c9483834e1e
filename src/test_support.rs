use crate::session::{ApiRequest, Method, SessionContext};
use crate::store::{KeyValueStore, MemoryStore, StoreError};
use crate::transport::{ApiResponse, Transport, TransportError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub attempt: u8,
    pub body: Option<Value>,
}

pub enum Reply {
    Json(u16, Value),
    Delayed(Duration, u16, Value),
    Fail(TransportError),
}

type Handler = Box<dyn Fn(&RecordedCall) -> Reply + Send + Sync>;

/// Transport double answering from a closure and recording every call.
pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&RecordedCall) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }
}

impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        context: &SessionContext,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let call = RecordedCall {
            method: request.method(),
            path: request.path().to_string(),
            bearer: context.bearer_token().map(str::to_string),
            attempt: request.attempt(),
            body: request.body().cloned(),
        };
        let reply = (self.handler)(&call);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);

        match reply {
            Reply::Json(status, body) => Ok(ApiResponse::new(status, body.to_string())),
            Reply::Delayed(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(ApiResponse::new(status, body.to_string()))
            }
            Reply::Fail(e) => Err(e),
        }
    }
}

/// Memory store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_sets: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fails `set_many` only; removals still go through.
    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        self.check()?;
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("read-only keychain")));
        }
        self.inner.set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check()?;
        self.inner.remove_many(keys)
    }
}

pub fn user_json(email: &str, user_type: &str) -> Value {
    serde_json::json!({
        "email": email,
        "full_name": "Test User",
        "user_type": user_type,
        "calendar_id": null,
        "team_id": "t1"
    })
}

pub fn credential_json(access: &str, refresh: &str) -> Value {
    serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "user": user_json("player@team.io", "player")
    })
}
