//! Recolor - preview room photos repainted with catalog paint colors.

mod adapters;
mod cassette;
mod cli;
mod config;
mod context;
mod error;
mod image_ref;
mod model;
mod orchestrator;
mod output;
mod ports;
mod prompt;
mod rate_limit;
mod request;
mod server;
#[cfg(test)]
mod testing;

use std::path::Path;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::adapters::live::clock::TokioClock;
use crate::cli::{ApplyArgs, Cli, Command, ServeArgs};
use crate::config::Config;
use crate::context::{RecordingSession, ServiceContext};
use crate::error::RecolorError;
use crate::model::{detect_provider, resolve_model};
use crate::orchestrator::{ColorApplicationOrchestrator, OrchestratorSettings};
use crate::output::{
    load_image_ref, read_source_image, resolve_output_path, save_image, validate_format,
};
use crate::request::{ColorApplicationRequest, Failure, FailureKind};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "recolor=debug,tower_http=debug" } else { "recolor=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<(), RecolorError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    let config = Config::load(&config_path).map_err(RecolorError::Config)?;

    match cli.command {
        Command::Apply(args) => run_apply(args, &config).await,
        Command::Serve(args) => run_serve(args, &config).await,
    }
}

fn build_orchestrator(
    config: &Config,
    model: Option<&str>,
) -> Result<(ColorApplicationOrchestrator, Option<RecordingSession>), RecolorError> {
    let requested = model.unwrap_or(&config.provider.model);
    let resolved = resolve_model(requested);
    let provider = detect_provider(&resolved).map_err(RecolorError::InvalidArgument)?;
    tracing::debug!(model = %resolved, requested, ?provider, "resolved model");

    let (ctx, session) = ServiceContext::from_env(provider, config)?;
    let orchestrator = ColorApplicationOrchestrator::new(
        ctx.provider,
        Arc::new(TokioClock::new()),
        OrchestratorSettings {
            model: resolved,
            generation: config.generation,
            limits: config.input_limits(),
            policy: config.policy(),
        },
    );
    Ok((orchestrator, session))
}

async fn run_apply(args: ApplyArgs, config: &Config) -> Result<(), RecolorError> {
    validate_format(&args.format).map_err(RecolorError::InvalidArgument)?;
    let request = ColorApplicationRequest {
        source_image: read_source_image(Path::new(&args.image))?,
        element_label: args.element.clone(),
        target_color_hex: args.color.clone(),
        color_name: args.color_name.clone(),
    };
    // Reject bad input before asking for credentials.
    if let Err(detail) = request.validate(config.input_limits()) {
        return Err(RecolorError::Failed(Failure::new(FailureKind::InvalidInput, detail)));
    }

    let (orchestrator, session) = build_orchestrator(config, args.model.as_deref())?;
    let result = orchestrator.apply(request).await;

    let outcome = match (result.image_ref, result.error) {
        (Some(image_ref), _) => {
            let (data, mime) = load_image_ref(&image_ref).await?;
            let path =
                resolve_output_path(args.output.as_deref(), &args.element, &args.color, &args.format);
            save_image(&data, &mime, &args.format, &path)?;
            eprintln!("Saved: {}", path.display());
            Ok(())
        }
        (None, Some(failure)) => Err(RecolorError::Failed(failure)),
        (None, None) => Err(RecolorError::MalformedResponse("no image and no error".into())),
    };

    finish_recording(session);
    outcome
}

async fn run_serve(args: ServeArgs, config: &Config) -> Result<(), RecolorError> {
    let (orchestrator, session) = build_orchestrator(config, args.model.as_deref())?;
    let orchestrator = orchestrator.with_rate_limit(config.rate_limiter());

    let host = args.host.as_deref().unwrap_or(&config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let outcome = server::serve(&addr, server::router(Arc::new(orchestrator))).await;
    finish_recording(session);
    outcome
}

fn finish_recording(session: Option<RecordingSession>) {
    if let Some(session) = session {
        match session.finish() {
            Ok(path) => eprintln!("Cassette saved: {}", path.display()),
            Err(e) => eprintln!("Warning: failed to save cassette: {e}"),
        }
    }
}
