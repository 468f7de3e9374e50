use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::{
    config::{AppConfig, Credentials, ProviderKind},
    controller::Controller,
    ollama::OllamaClient,
    prompts::{assemble_prompt, PromptSource},
    shell,
    styles::resolve_style,
};

#[derive(Debug, Parser)]
#[command(name = "bingen", version, about = "Generate images with Bing Image Creator, optionally enriching prompts with Ollama")]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "BINGEN_CONFIG")]
    pub config: Option<PathBuf>,
    /// Directory for saved images and the generation log
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    pub ollama_host: Option<String>,
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderKind>,
    #[arg(long, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive session (default)
    Shell,
    /// List models offered by the Ollama server
    Models,
    /// List the style catalog
    Styles,
    /// Print the prompt that would be submitted
    Prompt(PromptArgs),
    /// Generate once and print the image URLs
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
pub struct StyleArgs {
    /// Catalog style by name or number, or "custom"
    #[arg(long)]
    pub style: Option<String>,
    /// Free-text style; overrides --style
    #[arg(long)]
    pub custom_style: Option<String>,
    /// Ollama model used to enrich the prompt
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Args)]
pub struct PromptArgs {
    pub phrase: String,
    #[command(flatten)]
    pub style: StyleArgs,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    pub phrase: String,
    #[command(flatten)]
    pub style: StyleArgs,
    /// Number of images to request (1-4)
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub count: u8,
    /// Save every returned image
    #[arg(long)]
    pub save_all: bool,
}

impl Cli {
    /// Configuration with command-line flags applied last.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut cfg = AppConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(host) = &self.ollama_host {
            cfg.ollama.host = host.clone();
        }
        if let Some(kind) = self.provider {
            cfg.provider = kind;
        }
        Ok(cfg)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let cfg = cli.load_config()?;
    tracing::debug!(?cfg, "configuration loaded");

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let (mut controller, events) = Controller::new(cfg, Credentials::default());
            controller.load_environment();
            controller.refresh_models().await;
            shell::run(controller, events).await
        }
        Commands::Models => {
            let client = OllamaClient::new(&cfg.ollama);
            let models = client
                .list_models()
                .await
                .with_context(|| format!("listing models from {}", client.host()))?;
            if models.is_empty() {
                println!("no models installed");
            }
            for m in models {
                println!("{m}");
            }
            Ok(())
        }
        Commands::Styles => {
            let mut n = 1;
            for cat in cfg.catalog().categories() {
                println!("--- {} ---", cat.name);
                for s in &cat.styles {
                    println!("{n:>3}. {s}");
                    n += 1;
                }
            }
            Ok(())
        }
        Commands::Prompt(args) => {
            let catalog = cfg.catalog();
            let selection = match &args.style.style {
                Some(s) => catalog
                    .parse_selection(s)
                    .with_context(|| format!("unknown style '{s}'"))?,
                None => catalog.default_selection(&cfg.default_style),
            };
            let style = resolve_style(&selection, args.style.custom_style.as_deref().unwrap_or(""));
            let client = OllamaClient::new(&cfg.ollama);
            let out = assemble_prompt(&client, args.phrase.trim(), &style, args.style.model.as_deref()).await;
            if let PromptSource::Fallback { model, reason } = &out.source {
                eprintln!("enrichment with {model} failed ({reason}); using direct prompt");
            }
            println!("{}", out.text);
            Ok(())
        }
        Commands::Generate(args) => generate_once(cfg, args).await,
    }
}

async fn generate_once(cfg: AppConfig, args: GenerateArgs) -> Result<()> {
    let (mut c, mut events) = Controller::new(cfg, Credentials::from_env());
    if let Some(style) = &args.style.style {
        if !c.select_style(style) {
            report(&mut c);
            bail!("unknown style '{style}'");
        }
    }
    if let Some(custom) = &args.style.custom_style {
        c.set_custom_style(custom);
    }
    if let Some(model) = &args.style.model {
        c.refresh_models().await;
        c.select_model(Some(model));
    }
    c.set_image_count(args.count);

    if !c.generate(&args.phrase).await {
        report(&mut c);
        bail!("generation did not start");
    }
    while let Some(event) = events.recv().await {
        let done = event.is_terminal();
        c.handle_event(event).await;
        report(&mut c);
        if done {
            break;
        }
    }
    if c.browser().is_empty() {
        bail!("no images were generated");
    }

    for url in c.browser().urls() {
        if url.starts_with("data:") {
            println!("{}…", &url[..url.len().min(48)]);
        } else {
            println!("{url}");
        }
    }

    if args.save_all {
        loop {
            c.save_current().await;
            report(&mut c);
            if !c.show_next().await {
                break;
            }
            report(&mut c);
        }
    }
    Ok(())
}

fn report(c: &mut Controller) {
    for line in c.status_mut().take_unseen() {
        eprintln!("{line}");
    }
}
