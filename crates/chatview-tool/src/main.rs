mod cli;

use std::io::Write;
use std::process::ExitCode;

use chatview_common::ChatViewError;
use chatview_config::ChatViewConfig;
use chatview_theme::theme::resolve_file;
use chatview_theme::{DirThemeProvider, ProviderKind, ThemeBundle, ThemeId, ThemeProvider};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};

fn load_config(args: &Args) -> ChatViewConfig {
    let loaded = match &args.config {
        Some(path) => {
            tracing::info!("Using config override: {}", path.display());
            chatview_config::load_from_path(path)
        }
        None => chatview_config::load_config(),
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        ChatViewConfig::default()
    })
}

fn provider(args: &Args, config: &ChatViewConfig) -> DirThemeProvider {
    let mut roots = args.search_paths.clone();
    roots.extend(config.themes.resolved_search_paths());
    let kind = if args.group {
        ProviderKind::GroupChat
    } else {
        ProviderKind::OneToOne
    };
    tracing::debug!(?roots, "theme search paths");
    DirThemeProvider::new(roots, kind)
}

fn run(args: &Args) -> chatview_common::Result<()> {
    let config = load_config(args);
    let provider = provider(args, &config);
    let mut out = std::io::stdout().lock();

    match &args.command {
        Command::List { theme_type } => {
            let themes = provider.list_themes(theme_type);
            if themes.is_empty() {
                tracing::warn!("No '{theme_type}' themes found");
            }
            for id in themes {
                writeln!(out, "{id}")?;
            }
        }
        Command::Inspect { id } => {
            let id = ThemeId::parse(id)?;
            let bundle = ThemeBundle::resolve(&provider, &id)?;
            let show = |p: &Option<std::path::PathBuf>| {
                p.as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(missing)".to_string())
            };
            writeln!(out, "id:          {id}")?;
            writeln!(out, "bundle:      {}", bundle.base_path.display())?;
            writeln!(out, "adapter dir: {}", show(&bundle.adapter_dir))?;
            writeln!(out, "util.js:     {}", show(&bundle.util_script))?;
            writeln!(out, "adapter.js:  {}", show(&bundle.adapter_script))?;
            let screenshot = resolve_file(&bundle.base_path, "screenshot.png", false);
            writeln!(out, "screenshot:  {}", show(&screenshot))?;
            writeln!(out, "group chat:  {}", provider.kind().is_group_capable())?;
        }
        Command::Cat {
            id,
            path,
            case_insensitive,
        } => {
            let id = ThemeId::parse(id)?;
            let bundle = ThemeBundle::resolve(&provider, &id)?;
            let case_insensitive = *case_insensitive || config.runtime.case_insensitive_fs;
            let file = resolve_file(&bundle.base_path, path, case_insensitive).ok_or_else(|| {
                ChatViewError::Other(format!("{path}: not found in theme '{id}'"))
            })?;
            tracing::debug!(file = %file.display(), "serving theme file");
            out.write_all(&std::fs::read(&file)?)?;
        }
        Command::Config => {
            writeln!(out, "{}", chatview_config::config_to_json(&config))?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("chatview=info");
    let directive: Result<Directive, _> = log_directive
        .parse()
        .or_else(|_| "chatview=info".parse());
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = directive {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
