#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};

use axum::Router;
use service::{Endpoints, ServiceRegistry};
use tokio::net::TcpListener;
use uuid::Uuid;

pub struct MockServer {
    pub addr: SocketAddr,
}

impl MockServer {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.addr.ip(), self.addr.port())
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Both registries, every service pointed at this server.
    pub fn endpoints(&self) -> Endpoints {
        let port = self.addr.port().to_string();
        Endpoints::new(
            ServiceRegistry::new(
                "content",
                "http://127.0.0.1",
                [
                    ("database", port.clone()),
                    ("health", port.clone()),
                    ("nutrition_extract_single_grain", port.clone()),
                    ("nutrition_extract_multi_grain", port.clone()),
                ],
            ),
            ServiceRegistry::new(
                "inference",
                "http://127.0.0.1",
                [("disease", port.clone()), ("outline_Multi_Grain", port)],
            ),
        )
    }
}

pub async fn spawn(app: Router) -> anyhow::Result<MockServer> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("mock server error: {}", e);
        }
    });
    Ok(MockServer { addr })
}

/// Small fake JPEG on disk; returns its path.
pub async fn temp_image(bytes: &[u8]) -> anyhow::Result<std::path::PathBuf> {
    let path = std::env::temp_dir().join(format!("saferice_img_{}.jpg", Uuid::new_v4()));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
