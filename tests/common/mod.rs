use brr::DeviceContext;
use std::sync::Arc;

/// A context with a working device, or `None` when the machine has no GPU.
pub async fn gpu() -> Option<Arc<DeviceContext>> {
    let ctx = DeviceContext::new();
    match ctx.device().await {
        Ok(_) => Some(ctx),
        Err(e) => {
            eprintln!("skipping: {}", e);
            None
        }
    }
}
