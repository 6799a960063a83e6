use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use squadcast_handler::config::{HandlerConfig, PartialHandlerConfig};
use squadcast_handler::event::Event;
use squadcast_handler::logging::init_logging;
use squadcast_handler::notifications::service::HandlerService;
use squadcast_handler::version::{HANDLER_NAME, VERSION};

/// Sends Sensu events to Squadcast via the Incident Webhook.
///
/// The event is read as JSON from stdin.
#[derive(Parser, Debug)]
#[command(name = HANDLER_NAME, version = VERSION, about, long_about = None)]
struct Args {
    /// The URL for the Squadcast API
    #[arg(short = 'a', long, env = "SENSU_SQUADCAST_APIURL", hide_env_values = true)]
    api_url: Option<String>,

    /// The template to use for the incident name
    #[arg(short, long, env = "SENSU_SQUADCAST_MESSAGE")]
    message: Option<String>,

    /// The template to use for the incident description
    #[arg(short, long, env = "SENSU_SQUADCAST_DESCRIPTION")]
    description: Option<String>,

    /// The template file to use for the incident description
    #[arg(short, long, env = "SENSU_SQUADCAST_TEMPLATE")]
    template: Option<String>,

    /// Request timeout in seconds (0 disables it)
    #[arg(long = "timeout", env = "SENSU_SQUADCAST_TIMEOUT")]
    timeout_secs: Option<u64>,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "SENSU_SQUADCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Ignore option overrides from entity and check annotations
    #[arg(long)]
    no_annotation_overrides: bool,

    /// Directory for JSON log files
    #[arg(long, env = "SENSU_SQUADCAST_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> PartialHandlerConfig {
        PartialHandlerConfig {
            api_url: self.api_url.clone(),
            message: self.message.clone(),
            description: self.description.clone(),
            template: self.template.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok(); // Load .env before clap reads the environment
    let args = Args::parse();

    let _log_guard = init_logging(args.log_dir.as_deref());
    info!(version = VERSION, "Starting {}.", HANDLER_NAME);

    let config = match HandlerConfig::load(args.config.as_deref(), args.overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load handler configuration.");
            return ExitCode::FAILURE;
        }
    };

    let event = match Event::from_reader(std::io::stdin().lock()) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Failed to read event from stdin.");
            return ExitCode::FAILURE;
        }
    };

    let service = match HandlerService::from_config(config) {
        Ok(service) => service.with_annotation_overrides(!args.no_annotation_overrides),
        Err(e) => {
            error!(error = %e, "Failed to initialise the Squadcast sender.");
            return ExitCode::FAILURE;
        }
    };
    info!(
        message_template = %service.config().message,
        template_file = %service.config().template,
        "Handling event."
    );

    match service.handle(&event).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(stage = %e.stage(), error = %e, "Handler failed.");
            ExitCode::FAILURE
        }
    }
}
