//! 响应侧中间件
//!
//! 包装注册到传输上的处理器：处理器成功产出值后，若入站载荷带有 `awaitResult`，
//! 则以该键调用注册表的 `resolve`，把值路由回发送侧对应的挂起条目；
//! 同时原样返回该值，使直接调用方与关联等待方观察到同一结果。
//! 处理器失败原样向传输传播，不捕获、不包装，也不结算挂起条目。
//!
use crate::payload;
use crate::transport::MessageHandler;
use correlate_registry::PendingResultRegistry;
use std::sync::Arc;
use tracing::debug;

pub fn route_results(registry: Arc<PendingResultRegistry>, handler: MessageHandler) -> MessageHandler {
    Arc::new(move |event, data| {
        let registry = registry.clone();
        let handler = handler.clone();

        Box::pin(async move {
            let key = payload::inbound_key(data.as_ref());
            let value = (handler)(event, data).await?;

            if let Some(key) = key {
                let routed = registry.resolve(&key, value.clone());
                debug!(key = %key, routed, "handler result routed");
            }

            Ok(value)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::handler_fn;
    use correlate_registry::{RegistryConfig, ResultError};
    use serde_json::{Value, json};

    fn registry() -> Arc<PendingResultRegistry> {
        Arc::new(PendingResultRegistry::new(RegistryConfig::default()))
    }

    #[tokio::test]
    async fn resolves_matching_pending_entry_and_returns_value() {
        let registry = registry();
        let (key, pending) = registry.create(Some("k1".into()));

        let wrapped = route_results(
            registry.clone(),
            handler_fn(|event, _| async move { Ok(json!({ "echo": event })) }),
        );

        let direct = wrapped("ping".into(), Some(json!({"awaitResult": key})))
            .await
            .unwrap();
        assert_eq!(direct, json!({"echo": "ping"}));
        assert_eq!(pending.await, Ok(json!({"echo": "ping"})));
    }

    #[tokio::test]
    async fn payload_without_key_touches_nothing() {
        let registry = registry();
        let (_key, _pending) = registry.create(None);

        let wrapped = route_results(registry.clone(), handler_fn(|_, _| async { Ok(json!(1)) }));
        assert_eq!(wrapped("ping".into(), None).await.unwrap(), json!(1));
        assert_eq!(wrapped("ping".into(), Some(json!({"x": 1}))).await.unwrap(), json!(1));
        assert_eq!(registry.pending_keys().len(), 1);
    }

    #[tokio::test]
    async fn unknown_key_is_ignored() {
        let registry = registry();
        let wrapped = route_results(registry.clone(), handler_fn(|_, _| async { Ok(Value::Null) }));
        let out = wrapped("ping".into(), Some(json!({"awaitResult": "gone"}))).await;
        assert!(out.is_ok());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn handler_error_propagates_unchanged() {
        let registry = registry();
        let (key, pending) = registry.create(None);

        let wrapped = route_results(
            registry.clone(),
            handler_fn(|_, _| async { Err(anyhow::anyhow!("nope")) }),
        );
        let err = wrapped("ping".into(), Some(json!({"awaitResult": key.clone()})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(registry.is_pending(&key));

        registry.reject(&key, "gave up");
        assert_eq!(pending.await, Err(ResultError::rejected("gave up")));
    }
}
