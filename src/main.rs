use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use statechat::cli::output::Output;
use statechat::cli::{Cli, Commands};
use statechat::utils::toml_config::{LoggingConfig, StatechatConfig};
use statechat::{
    load_workflow_file, Backends, ConsoleFrontend, DisabledSnippetDatabase, Frontend, Provider,
    PythonExecutor, SilentFrontend, SnippetDatabase, WorkflowRunner,
};

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match &cli.command {
        Commands::Validate { workflow } => {
            init_tracing(&LoggingConfig::default(), cli.verbose);
            validate(&output, workflow)
        }
        Commands::Run {
            workflow,
            json,
            quiet,
        } => {
            let config = load_config(&cli.config)?;
            init_tracing(&config.logging, cli.verbose);
            run(&output, &config, workflow, *json, *quiet || *json, !cli.no_color).await
        }
        Commands::Index { dir } => {
            let config = load_config(&cli.config)?;
            init_tracing(&config.logging, cli.verbose);
            index(&output, &config, dir).await
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<StatechatConfig> {
    StatechatConfig::load_or_default(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn validate(output: &Output, workflow: &Path) -> anyhow::Result<()> {
    match load_workflow_file(workflow) {
        Ok(program) => {
            output.success(&format!("{} is valid", workflow.display()));
            output.program_summary(&program);
            Ok(())
        }
        Err(e) => {
            output.error(&e.to_string());
            bail!("{} failed validation", workflow.display())
        }
    }
}

async fn run(
    output: &Output,
    config: &StatechatConfig,
    workflow: &Path,
    json: bool,
    quiet: bool,
    colored: bool,
) -> anyhow::Result<()> {
    let program = Arc::new(
        load_workflow_file(workflow)
            .with_context(|| format!("Failed to load workflow {}", workflow.display()))?,
    );

    let provider = Provider::from_config(&config.llm)?;
    info!(provider = provider.name(), model = provider.model(), "Using LLM provider");

    let frontend: Arc<dyn Frontend> = if quiet {
        Arc::new(SilentFrontend::default())
    } else {
        Arc::new(ConsoleFrontend::new(colored))
    };

    let backends = Backends {
        llm: provider.create_client()?,
        snippets: open_snippets(config, &provider).await?,
        executor: Arc::new(PythonExecutor::from_config(&config.execution)),
        frontend,
    };

    if !json {
        output.banner();
        output.info(&format!(
            "Running {} with {} ({})",
            workflow.display(),
            provider.name(),
            provider.model()
        ));
        output.newline();
    }

    let mut runner = WorkflowRunner::new(program, backends, config.runner_options())?;
    let report = runner.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output.report(&report);
    }

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{} of {} agents failed", failed, report.agents.len());
    }
    Ok(())
}

#[cfg(feature = "ares-vector")]
async fn open_snippets(
    config: &StatechatConfig,
    provider: &Provider,
) -> anyhow::Result<Arc<dyn SnippetDatabase>> {
    if config.retrieval.index_path.is_none() {
        info!("No snippet index configured, rtfm() is disabled");
        return Ok(Arc::new(DisabledSnippetDatabase));
    }

    let database =
        statechat::VectorSnippetDatabase::open(&config.retrieval, provider.create_embedder()?)
            .await?;
    info!(snippets = database.len(), "Snippet index opened");
    Ok(Arc::new(database))
}

#[cfg(not(feature = "ares-vector"))]
async fn open_snippets(
    _config: &StatechatConfig,
    _provider: &Provider,
) -> anyhow::Result<Arc<dyn SnippetDatabase>> {
    Ok(Arc::new(DisabledSnippetDatabase))
}

#[cfg(feature = "ares-vector")]
async fn index(output: &Output, config: &StatechatConfig, dir: &Path) -> anyhow::Result<()> {
    let Some(index_path) = &config.retrieval.index_path else {
        bail!("retrieval.index_path must be set to build a snippet index");
    };
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let provider = Provider::from_config(&config.llm)?;
    let database =
        statechat::VectorSnippetDatabase::open(&config.retrieval, provider.create_embedder()?)
            .await?;

    output.info(&format!(
        "Indexing {} into {}",
        dir.display(),
        index_path.display()
    ));
    let stats = database.index_directory(dir).await?;
    database.persist().await?;

    if stats.documents == 0 {
        output.warning(&format!("No readable files found under {}", dir.display()));
    }

    output.success(&format!(
        "Indexed {} documents as {} snippets ({} stored)",
        stats.documents,
        stats.snippets,
        database.len()
    ));
    Ok(())
}

#[cfg(not(feature = "ares-vector"))]
async fn index(_output: &Output, _config: &StatechatConfig, _dir: &Path) -> anyhow::Result<()> {
    bail!("statechat was built without the `ares-vector` feature")
}
