use std::sync::Arc;

use bumpity::dice::DieMap;
use bumpity::server::{create_router, AppContext};

#[tokio::main]
async fn main() {
    bumpity::env_config::init_logging();
    let port = bumpity::env_config::server_port();
    bumpity::env_config::init_rayon_threads();
    println!("Starting bumpity API server...");

    let die_map = DieMap::standard();
    println!(
        "Named dice: {}",
        die_map.iter().map(|(name, _)| name).collect::<Vec<_>>().join(", ")
    );
    let ctx = Arc::new(AppContext::new(die_map));
    let app = create_router(ctx);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Failed to bind port {}: {}", port, err);
            std::process::exit(1);
        }
    };
    println!("Server is running on port {}. Press Ctrl+C to stop.", port);
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("Server error: {}", err);
        std::process::exit(1);
    }

    println!("\nStopping server...");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to install CTRL+C signal handler: {}", err);
        std::future::pending::<()>().await;
    }
}
