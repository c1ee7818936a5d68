//! Reply Generator Integration Tests
//!
//! Credential fallback through the public generator API.

use async_trait::async_trait;
use clonebot::generator::{GenerationBackend, GenerationError};
use clonebot::message::InputKind;
use clonebot::{ConversationKey, Credential, MemoryStore, ReplyGenerator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Succeeds only on the `good`-th call (1-based); 0 never succeeds
struct CountingBackend {
    good: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(
        &self,
        credential: &Credential,
        _prompt: &str,
    ) -> Result<String, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.good {
            Ok(format!("ok via {}", credential.expose()))
        } else {
            Err(GenerationError::Api {
                status: 503,
                body: "overloaded".to_string(),
            })
        }
    }
}

fn credentials(n: usize) -> Vec<Credential> {
    (1..=n).map(|i| Credential::new(format!("key-{}", i))).collect()
}

#[tokio::test]
async fn test_kth_credential_succeeds_after_k_calls() {
    for k in 1..=5 {
        let backend = Arc::new(CountingBackend {
            good: k,
            calls: AtomicUsize::new(0),
        });
        let generator =
            ReplyGenerator::new(Arc::new(MemoryStore::new()), backend.clone(), credentials(k));
        let key = ConversationKey::new("acct", "chat");

        let reply = generator.generate(&key, "hi", "Ali", InputKind::Text).await;
        assert_eq!(reply, format!("ok via key-{}", k));
        assert_eq!(backend.calls.load(Ordering::SeqCst), k);
    }
}

#[tokio::test]
async fn test_exhausted_credentials_yield_silence() {
    let backend = Arc::new(CountingBackend {
        good: 0,
        calls: AtomicUsize::new(0),
    });
    let generator = ReplyGenerator::new(Arc::new(MemoryStore::new()), backend.clone(), credentials(4));
    let key = ConversationKey::new("acct", "chat");

    let reply = generator.generate(&key, "hi", "Ali", InputKind::Text).await;
    assert!(reply.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
}
