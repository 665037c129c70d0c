//! Scripted in-memory transport for tests.
//!
//! Responses are queued per method. Each call pops the front of its queue,
//! except that the last queued response is never popped: it keeps answering
//! every subsequent call. That makes "answer X once, then Y forever" and
//! "always answer X" equally short to write.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::transport::Transport;
use super::types::RpcErrorObject;
use crate::error::ClientError;

#[derive(Clone, Debug)]
enum Reply {
    Result(Value),
    Error(RpcErrorObject),
}

/// A [`Transport`] that replays scripted responses and records every call.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful `result` for `method`.
    pub fn push(&self, method: &str, result: Value) -> &Self {
        self.enqueue(method, Reply::Result(result))
    }

    /// Queues a JSON-RPC error for `method`.
    pub fn push_error(&self, method: &str, code: i64, message: &str, data: Option<Value>) -> &Self {
        self.enqueue(
            method,
            Reply::Error(RpcErrorObject {
                code,
                message: message.to_string(),
                data,
            }),
        )
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// The params of every call to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn enqueue(&self, method: &str, reply: Reply) -> &Self {
        self.replies
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.calls.lock().push((method.to_string(), params));

        let reply = {
            let mut replies = self.replies.lock();
            match replies.get_mut(method) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Result(value)) => Ok(value),
            Some(Reply::Error(err)) => Err(err.into_client_error()),
            None => Err(ClientError::Rpc {
                code: -32601,
                message: format!("the method {method} does not exist/is not available"),
                data: None,
                reason: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn last_reply_sticks() {
        let mock = MockTransport::new();
        mock.push("eth_blockNumber", json!("0x1"))
            .push("eth_blockNumber", json!("0x2"));

        assert_eq!(mock.request("eth_blockNumber", json!([])).await.unwrap(), "0x1");
        assert_eq!(mock.request("eth_blockNumber", json!([])).await.unwrap(), "0x2");
        assert_eq!(mock.request("eth_blockNumber", json!([])).await.unwrap(), "0x2");
        assert_eq!(mock.calls_to("eth_blockNumber").len(), 3);
    }

    #[tokio::test]
    async fn unscripted_method_is_not_found() {
        let mock = MockTransport::new();
        let err = mock.request("eth_foo", json!([])).await.unwrap_err();
        assert!(matches!(err, ClientError::Rpc { code: -32601, .. }));
    }

    #[tokio::test]
    async fn scripted_error_returned() {
        let mock = MockTransport::new();
        mock.push_error("eth_sendTransaction", 4001, "User rejected the request.", None);
        let err = mock
            .request("eth_sendTransaction", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rpc { code: 4001, .. }));
    }
}
