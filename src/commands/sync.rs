//! `arrsync sync`: apply the declaration to every (or one) server.

use crate::cli::SyncArgs;
use crate::compile::NoopCompiler;
use crate::config::{Declaration, DesiredConfig, ServerDecl};
use crate::sync::SyncEngine;
use anyhow::{Result, bail};
use reconcile::HttpTransport;

pub fn run(args: &SyncArgs) -> Result<()> {
    let declaration = Declaration::load(&args.config)?;

    let selected: Vec<(&String, &ServerDecl)> = match &args.server {
        Some(name) => match declaration.servers.get_key_value(name) {
            Some(entry) => vec![entry],
            None => bail!("no server {name:?} in {}", args.config.display()),
        },
        None => declaration.servers.iter().collect(),
    };

    let compiler = NoopCompiler;
    let mut failures = 0;
    for (name, server) in selected {
        log::info!("syncing {name} ({} at {})", server.kind, server.url);
        let transport =
            HttpTransport::new(&server.url, server.kind.api_path(), &server.api_key);
        let engine = SyncEngine::new(&transport, server.kind, &compiler);
        let desired = DesiredConfig::new(server.resources.clone());

        if let Err(e) = engine.sync(&desired) {
            log::error!("{name}: {e:#}");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} server(s) failed to sync");
    }
    Ok(())
}
