use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;

use tiddly_recipe::CompiledRecipe;
use tiddly_server::{Config, TiddlyServer};
use tiddly_store::InMemoryStore;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(load_config(&cli.config)?, args).await,
        Command::Config(args) => {
            let config = if args.defaults {
                Config::default()
            } else {
                load_config(&cli.config)?
            };
            cmd_config(&config)
        }
        Command::Check => cmd_check(&load_config(&cli.config)?),
    }
}

fn load_config(path: &Option<std::path::PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

async fn cmd_serve(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if args.cors {
        config.server.permissive_cors = true;
    }
    let addr = config.server.bind_addr;

    let server = TiddlyServer::new(config, Arc::new(InMemoryStore::new()));
    if !args.no_seed {
        let seeded = server.seed().await.context("seeding configured bags and recipes")?;
        if seeded > 0 {
            println!("{} Seeded {} bags and recipes", "✓".green(), seeded.to_string().bold());
        }
    }

    println!("{} Tiddly Store on {}", "▶".green().bold(), addr.to_string().bold());
    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("server failed")?;
    println!("{} Stopped.", "■".yellow());
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("rendering configuration")?;
    print!("{rendered}");
    Ok(())
}

fn cmd_check(config: &Config) -> anyhow::Result<()> {
    for bag in &config.bags {
        bag.validate()
            .with_context(|| format!("bag {:?} is invalid", bag.name))?;
    }
    for recipe in &config.recipes {
        recipe
            .validate()
            .with_context(|| format!("recipe {:?} is invalid", recipe.name))?;
        CompiledRecipe::compile(recipe.clone())
            .with_context(|| format!("recipe {:?} has an invalid filter", recipe.name))?;
        for entry in &recipe.entries {
            if !config.bags.iter().any(|b| b.name == entry.bag) {
                println!(
                    "  {} recipe {} references unseeded bag {}",
                    "warning:".yellow(),
                    recipe.name.bold(),
                    entry.bag.cyan()
                );
            }
        }
    }

    println!("{} Configuration OK", "✓".green().bold());
    println!("  Bind: {}", config.server.bind_addr.to_string().bold());
    println!("  Tokens: {}", config.server.tokens.len());
    println!(
        "  Superuser role: {}",
        config
            .policy
            .superuser_role
            .as_deref()
            .unwrap_or("none")
            .cyan()
    );
    println!("  Bags: {}", names(config.bags.iter().map(|b| b.name.as_str())));
    println!("  Recipes: {}", names(config.recipes.iter().map(|r| r.name.as_str())));
    Ok(())
}

fn names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<_> = names.collect();
    if names.is_empty() {
        "-".dimmed().to_string()
    } else {
        names.join(", ")
    }
}
