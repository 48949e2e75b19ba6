//! Doubles a large array on the GPU and compares timing with a CPU loop.
//!
//! Run with: cargo run --example doubling
//! Set RUST_LOG=brr=debug to watch buffer transitions.

use brr::prelude::*;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const N: usize = 1024 * 1024 * 8;
const ITERS: usize = 100;

async fn run_gpu_demo() -> brr::Result<()> {
    println!("=== GPU Doubling Demo ===\n");

    let gpu = DeviceContext::new();
    let info = gpu.adapter_info().await?;
    println!("✓ GPU device initialized");
    println!("  Device: {}", info.name);
    println!("  Backend: {:?}", info.backend);

    let mut a = gpu.alloc(DType::F32, N)?;
    let mut b = gpu.alloc(DType::F32, N)?;
    a.write(|data| {
        for (i, x) in data.iter_mut().enumerate() {
            *x = i as f32;
        }
    })
    .await?;

    // N is a multiple of 4, so the arrays can be viewed as vec4s.
    let kernel = gpu
        .compile(
            &[KernelArg::new("A", "vec4<f32>"), KernelArg::new("B", "vec4<f32>")],
            |ctx| {
                format!(
                    "    for (var i = global_invocation_index; i < {len}u; i += {stride}u) {{
        {b}[i] = {a}[i] * 2.0;
    }}",
                    len = N / 4,
                    stride = ctx.threads,
                    a = ctx.arg(0),
                    b = ctx.arg(1),
                )
            },
            KernelOptions::builder()
                .workgroup([256])
                .dispatch([256])
                .build()?,
        )
        .await?;

    // Warm-up moves both buffers into storage once.
    kernel.run(&mut [&mut a, &mut b]).await?;
    gpu.block().await?;

    let start = Instant::now();
    for _ in 0..ITERS {
        kernel.run(&mut [&mut a, &mut b]).await?;
    }
    gpu.block().await?;
    let gpu_time = start.elapsed();

    let a_ref: Vec<f32> = (0..N).map(|i| i as f32).collect();
    let mut b_ref = vec![0.0f32; N];
    let start = Instant::now();
    for _ in 0..ITERS {
        for (dst, src) in b_ref.iter_mut().zip(a_ref.iter()) {
            *dst = *src * 2.0;
        }
    }
    let cpu_time = start.elapsed();

    println!("\nDoubling {} floats, {} iterations", N, ITERS);
    println!("  GPU: {:.2}us/iter", gpu_time.as_secs_f64() * 1e6 / ITERS as f64);
    println!("  CPU: {:.2}us/iter", cpu_time.as_secs_f64() * 1e6 / ITERS as f64);

    let check = (N as f64).sqrt() as usize;
    let mismatches = b
        .read(|data| {
            data[..check]
                .iter()
                .zip(&b_ref[..check])
                .filter(|(x, y)| (**x - **y).abs() > 1e-4)
                .count()
        })
        .await?;

    if mismatches == 0 {
        println!("✓ First {} results match the CPU reference", check);
    } else {
        println!("⚠ {} of the first {} results differ", mismatches, check);
    }

    #[cfg(feature = "telemetry")]
    {
        use brr::telemetry::{LogExporter, MetricsExporter};
        LogExporter.export(&gpu.metrics().snapshot())?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run_gpu_demo().await {
        eprintln!("GPU demo failed: {}", e);
        eprintln!("This may be expected if no GPU is available.");
    }

    println!("\n=== Demo Complete ===");
}
