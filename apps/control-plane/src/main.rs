//! [apps/control-plane/src/main.rs]
//! Process entry point: load `.env`, bring up tracing, ignite the kernel,
//! then launch the scheduler daemon and the HTTP+WS server.

use nyx_control_plane::prelude::*;
use nyx_shared_telemetry::init_tracing;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing("nyx_control_plane");

    let config = Config::from_env();
    let kernel = ControlPlaneKernel::ignite(config).await;
    kernel.launch().await;
}
