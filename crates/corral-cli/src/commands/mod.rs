//! CLI commands

use std::io::Write;
use std::path::Path;

use corral_capi::{render_documents, CapiManifest, KubeObjectReader};
use corral_common::kube_utils::create_client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Error, Result};

pub mod docker;
pub mod generate;

/// Reader for the management cluster
pub async fn connect(kubeconfig: Option<&Path>) -> Result<KubeObjectReader> {
    let client = create_client(kubeconfig).await?;
    debug!(kubeconfig = ?kubeconfig, "connected to management cluster");
    Ok(KubeObjectReader::new(client))
}

/// Token cancelled on Ctrl-C
pub fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling outstanding reads");
            token.cancel();
        }
    });
    cancel
}

/// Read an input file
pub async fn read_input(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::read_file(path, e))
}

/// Write manifests to `out` as a YAML document stream
pub fn write_manifests(out: &mut impl Write, manifests: &[CapiManifest]) -> Result<()> {
    let stream = render_documents(manifests)?;
    out.write_all(stream.as_bytes())?;
    out.flush()?;
    Ok(())
}
