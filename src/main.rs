use std::{
    io::{self, Write},
    process,
    sync::Arc,
    time::Duration,
};

use marquee::{
    application::{contract::Contracts, error::AppError},
    config,
    infra::{
        error::InfraError,
        gateway::Gateway,
        http::{self, ApiState},
        ledger::{EventQueue, MemoryLedger},
        telemetry,
    },
};
use serde_json::{Value, json};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const SOURCE: &str = "marquee::main";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let gateway = build_gateway(&settings)?;

    match command {
        config::Command::Serve(_) => run_serve(&settings, gateway).await,
        config::Command::Invoke(args) => run_invoke(&gateway, &args),
        config::Command::History(args) => run_history(&gateway, &args),
    }
}

fn build_gateway(settings: &config::Settings) -> Result<Gateway, AppError> {
    let events = Arc::new(EventQueue::new_with_limit(settings.ledger.event_capacity));
    let ledger = match settings.ledger.journal_path.as_deref() {
        Some(path) => MemoryLedger::open(path, events).map_err(InfraError::from)?,
        None => {
            info!(
                target = SOURCE,
                "no journal configured; ledger state lives in memory only"
            );
            MemoryLedger::in_memory(events)
        }
    };
    Ok(Gateway::new(Arc::new(ledger), Contracts::new(settings.query)))
}

async fn run_serve(settings: &config::Settings, gateway: Gateway) -> Result<(), AppError> {
    let max_event_batch = settings.ledger.event_capacity;
    let router = http::build_router(ApiState::new(gateway, max_event_batch));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = SOURCE,
        addr = %settings.server.addr,
        "gateway listening"
    );

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(settings.server.graceful_shutdown) => {
            warn!(
                target = SOURCE,
                grace_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; closing open connections"
            );
        }
    }

    info!(target = SOURCE, "gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = SOURCE, error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = SOURCE, "shutdown requested; draining connections");
}

async fn drain_deadline(grace: Duration) {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

fn run_invoke(gateway: &Gateway, args: &config::InvokeArgs) -> Result<(), AppError> {
    let invocation = gateway.invoke(&args.contract, &args.operation, &args.args)?;
    let rendered = serde_json::to_string_pretty(&invocation)
        .map_err(|err| AppError::unexpected(format!("failed to encode result: {err}")))?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(())
}

fn run_history(gateway: &Gateway, args: &config::HistoryArgs) -> Result<(), AppError> {
    let components: Vec<&str> = args.components.iter().map(String::as_str).collect();
    let revisions = gateway.history(&args.tag, &components, args.limit)?;

    let mut stdout = io::stdout().lock();
    for revision in &revisions {
        let value = serde_json::from_slice::<Value>(&revision.value).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&revision.value).into_owned())
        });
        let line = json!({
            "tx_id": revision.tx_id,
            "timestamp": revision.timestamp,
            "is_delete": revision.is_delete,
            "value": value,
        });
        writeln!(stdout, "{line}").map_err(|err| AppError::from(InfraError::from(err)))?;
    }

    info!(
        target = SOURCE,
        tag = %args.tag,
        revisions = revisions.len(),
        "history exported"
    );
    Ok(())
}
