//! `arrsync doctor`: connectivity check against every declared server.

use crate::cli::DoctorArgs;
use crate::config::Declaration;
use anyhow::{Result, bail};
use reconcile::{HttpTransport, RetryConfig, Transport};

pub fn run(args: &DoctorArgs) -> Result<()> {
    let declaration = Declaration::load(&args.config)?;

    let mut failures = 0;
    for (name, server) in &declaration.servers {
        // A doctor run should report promptly, not sit in a retry loop
        let transport = HttpTransport::new(&server.url, server.kind.api_path(), &server.api_key)
            .with_retry(RetryConfig::no_retry());

        match transport.ping() {
            Ok(()) => println!("ok    {name} ({} at {})", server.kind, server.url),
            Err(e) => {
                println!("FAIL  {name} ({} at {}): {e}", server.kind, server.url);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} server(s) unreachable");
    }
    Ok(())
}
