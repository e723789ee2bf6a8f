/// 进程内 ping/pong 示例
/// 展示 注册处理器 -> emit 等待结果 -> 容量淘汰 的完整流程
///
/// 运行：RUST_LOG=debug cargo run -p correlate-channel --example ping_pong
use correlate_channel::correlate_registry::{PendingResultRegistry, RegistryConfig};
use correlate_channel::{ChannelError, Correlator, Dispatched, InMemoryTransport, handler_fn};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let transport = Arc::new(InMemoryTransport::default());
    let handle = transport.start()?;

    let ctx = Correlator::builder()
        .transport(transport.clone())
        .registry(Arc::new(PendingResultRegistry::new(
            RegistryConfig::builder().capacity(2).build(),
        )))
        .build();

    ctx.register(
        "ping",
        handler_fn(|_, data| async move { Ok(json!({ "pong": data })) }),
    )?;

    // 请求/响应
    let reply = ctx
        .emit("ping", Some(json!({"awaitResult": true, "msg": "hello"})))
        .await?;
    println!("reply: {reply:?}");

    // 显式关联键
    let reply = ctx
        .emit("ping", Some(json!({"awaitResult": "my-key"})))
        .await?;
    println!("reply for my-key: {reply:?}");

    // 重复注册
    if let Err(ChannelError::AlreadyRegistered { name }) =
        ctx.register("ping", handler_fn(|_, _| async { Ok(json!(null)) }))
    {
        println!("{name} is already registered");
    }

    // 无人应答的事件：超出容量后最旧的请求被淘汰
    let silent = ctx.channel("silent");
    let mut pendings = Vec::new();
    for _ in 0..3 {
        if let Dispatched::Awaiting(pending) = silent.dispatch(Some(json!({"awaitResult": true}))).await? {
            pendings.push(pending);
        }
    }
    let oldest = pendings.remove(0);
    let key = oldest.key().clone();
    println!("oldest request {key} -> {:?}", oldest.await);

    handle.shutdown();
    handle.join().await;
    Ok(())
}
