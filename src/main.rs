use medroute::{
    agents::ConciergeService,
    cli::{output::Output, Cli, Commands},
    memory::{format_memory_context, LocalJsonStore, MemoryManager},
    types::{AppError, ExecuteRequest, Result},
    utils::{toml_config::LoggingConfig, MedrouteConfig},
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let config = match MedrouteConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            output.error(&e.to_string());
            output.hint("pass --config <path> or create medroute.toml");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging, cli.verbose);

    match run(cli.command, &config, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            output.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout is reserved for command output
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(command: Commands, config: &MedrouteConfig, output: &Output) -> Result<()> {
    match command {
        Commands::Ask {
            patient,
            json,
            message,
        } => {
            let service = ConciergeService::from_config(config).await?;
            let response = service
                .execute(ExecuteRequest {
                    patient_id: patient,
                    message: message.join(" "),
                })
                .await?;

            if json {
                let body = serde_json::to_string_pretty(&response)
                    .map_err(|e| AppError::Internal(format!("Failed to encode response: {}", e)))?;
                println!("{}", body);
            } else {
                for entry in &response.messages {
                    output.entry(entry);
                }
                if let Some(answer) = response.final_answer() {
                    output.answer(answer);
                }
            }
        }

        Commands::Memory { patient } => {
            let memory = MemoryManager::new(Arc::new(LocalJsonStore::new(&config.memory.root)))
                .with_files(&config.memory.memory_file, &config.memory.profiles_file);
            let bundle = memory.load_bundle(patient).await?;

            output.header(&format!("Memory for patient {}", patient));
            if bundle.is_empty() {
                output.info("Nothing stored yet");
                return Ok(());
            }
            if let Some(updated) = bundle.last_updated {
                output.kv("last_updated", &updated.to_rfc3339());
            }
            output.kv("verified", &bundle.is_verified().to_string());
            output.newline();
            println!("{}", format_memory_context(&bundle));
        }

        Commands::Config { validate } => {
            if validate {
                config.validate()?;
                output.success("Configuration is valid");
            }
            output.header("Configuration");
            output.kv("database", &config.database.path.display().to_string());
            output.kv("memory", &config.memory.root.display().to_string());
            let provider = config.provider()?;
            output.kv("provider", provider.name());
            output.kv("model", provider.model());
            output.kv("max_hops", &config.orchestration.max_hops.to_string());
            output.kv(
                "max_tool_iterations",
                &config.orchestration.max_tool_iterations.to_string(),
            );
        }
    }

    Ok(())
}
