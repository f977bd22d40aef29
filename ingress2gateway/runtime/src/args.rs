use crate::{
    emitter::{Emitter, Target},
    ingress_nginx::{self, Storage},
    output::{self, OutputFormat},
    read,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "ingress2gateway",
    about = "Converts ingress-nginx Ingresses into Gateway API resources"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress2gateway=info,warn",
        env = "INGRESS2GATEWAY_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    /// A YAML or JSON manifest holding Ingresses and Services. May be given
    /// more than once.
    #[clap(long = "input-file", required = true)]
    input_files: Vec<PathBuf>,

    #[clap(long, default_value = "nginx")]
    ingress_class: String,

    /// Only converts resources in this namespace.
    #[clap(long)]
    namespace: Option<String>,

    /// Either `standard` or `envoy-gateway`.
    #[clap(long, default_value = "standard")]
    emitter: Target,

    /// Either `yaml` or `json`.
    #[clap(long, default_value = "yaml")]
    output: OutputFormat,

    /// Writes the converted resources even when some Ingresses could not be
    /// converted.
    #[clap(long)]
    allow_errors: bool,
}

impl Args {
    #[inline]
    pub fn parse_and_run() -> Result<()> {
        Self::parse().run()
    }

    pub fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            input_files,
            ingress_class,
            namespace,
            emitter,
            output,
            allow_errors,
        } = self;

        init_log(log_level, log_format)?;

        let mut ingresses = Vec::new();
        let mut services = Vec::new();
        for path in &input_files {
            let resources = read::read_file(path)?;
            ingresses.extend(resources.ingresses);
            services.extend(resources.services);
        }
        info!(
            ingresses = ingresses.len(),
            services = services.len(),
            files = input_files.len(),
            "Read resources"
        );

        let storage = Storage::new(&ingress_class, namespace.as_deref(), ingresses, services);
        let (mut conversion, mut errors) = ingress_nginx::to_ir(&storage);
        let (resources, emit_errors) = emitter.emit(
            &conversion.ir,
            &conversion.intents,
            &mut conversion.notifications,
        );
        errors.extend(emit_errors);
        for error in &errors {
            conversion
                .notifications
                .error(error.to_string(), error.object.clone());
        }
        info!(
            provider = ingress_nginx::NAME,
            %emitter,
            resources = resources.len(),
            errors = errors.len(),
            "Converted"
        );

        if errors.is_empty() || allow_errors {
            output::write_resources(std::io::stdout().lock(), &resources, output)
                .context("failed to write resources")?;
        }
        output::write_notifications(std::io::stderr().lock(), &conversion.notifications)
            .context("failed to write notifications")?;

        if !errors.is_empty() && !allow_errors {
            bail!(
                "{} errors found; fix them or pass --allow-errors to write a partial conversion",
                errors.len()
            );
        }
        Ok(())
    }
}

/// Logs to stderr so that stdout only carries the converted resources.
fn init_log(filter: kubert::LogFilter, format: kubert::LogFormat) -> Result<()> {
    use tracing_subscriber::prelude::*;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        kubert::LogFormat::Plain => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
        kubert::LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    Ok(())
}
