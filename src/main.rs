use clap::Parser;
use log::{error, info};
use slideshot::cdp::{CdpRenderer, SharedBrowser};
use slideshot::config::Cli;
use slideshot::orchestrator::SlideOrchestrator;
use slideshot::server::{self, AppState};
use slideshot::template::TemplateResolver;
use slideshot::upload::CloudinaryClient;
use std::sync::Arc;

async fn run(cli: Cli) -> slideshot::Result<()> {
    cli.validate()?;

    let render_config = cli.render_config();
    let browser = Arc::new(SharedBrowser::new(render_config.clone()));
    if cli.eager_browser {
        browser.warm_up().await?;
    }

    let state = Arc::new(AppState {
        orchestrator: SlideOrchestrator::new(
            TemplateResolver::new(cli.templates_dir.clone()),
            Arc::new(CdpRenderer::new(browser.clone(), render_config)),
        ),
        host: Arc::new(CloudinaryClient::new(cli.cloudinary_api_base.clone())?),
        default_account: cli.default_account(),
        max_body_bytes: cli.max_body_bytes,
    });

    let addr = cli.bind_addr();
    let http = server::bind(&addr)?;
    let accept = server::spawn_accept_loop(http.clone(), state, tokio::runtime::Handle::current());
    info!("Slideshot running on {}", addr);

    shutdown_signal().await;
    info!("Shutting down");
    http.unblock();
    match tokio::task::spawn_blocking(move || accept.join()).await {
        Ok(Ok(())) => {}
        _ => error!("Accept loop did not stop cleanly"),
    }
    browser.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        error!("{}", e);
        std::process::exit(1);
    }
}
