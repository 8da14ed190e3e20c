use callkpi::{Application, Config, config::Args, runner::SelfCheck, telemetry};
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// Cancel the run on SIGTERM or Ctrl+C
async fn shutdown_signal(cancel: CancellationToken) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, cancelling report run..."),
        _ = terminate => tracing::info!("Received SIGTERM, cancelling report run..."),
    }
    cancel.cancel();
}

fn print_self_check(check: &SelfCheck) {
    match &check.tenants {
        Ok(tenants) => println!("Garages ({}): {}", tenants.len(), tenants.join(", ")),
        Err(e) => println!("Garages: ERROR {e}"),
    }
    match &check.date_range {
        Ok(Some((first, last))) => println!("Données disponibles : {first} à {last}"),
        Ok(None) => println!("Données disponibles : aucun appel"),
        Err(e) => println!("Données disponibles : ERROR {e}"),
    }
    match &check.mail_transport {
        Ok(true) => println!("Mail transport: OK"),
        Ok(false) => println!("Mail transport: unreachable"),
        Err(e) => println!("Mail transport: ERROR {e}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before anything else that might build a TLS client
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    tracing::debug!("{:?}", args);

    let app = Application::new(config).await?;

    if args.test {
        let check = app.self_check().await;
        print_self_check(&check);
        app.shutdown().await;
        telemetry::shutdown_telemetry();
        anyhow::ensure!(check.is_healthy(), "self-check failed");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let result = app.run(cancel).await;
    app.shutdown().await;
    telemetry::shutdown_telemetry();

    let summary = result?;
    for path in &summary.reports_written {
        println!("{}", path.display());
    }

    anyhow::ensure!(
        summary.is_success(),
        "{} report job(s) failed",
        summary.failures.len()
    );
    Ok(())
}
