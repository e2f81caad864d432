use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use engagement_core::{
    config::load_settings_with, AnalyticsOutcome, DeleteOutcome, EngagementRuntime, FormOutcome,
    InitOptions, PresetFormData, ReactionOutcome, ReactionWidget, SearchOutcome, SearchTrigger,
    SubmitOutcome,
};
use shared::domain::{ItemId, PresetId, ReactionKind, SearchScope, WidgetId};
use tracing_subscriber::EnvFilter;

mod console;

#[derive(Parser, Debug)]
#[command(about = "Drive the engagement runtime against a live content service")]
struct Cli {
    /// Settings file; defaults to ./engagement.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<String>,
    /// Extra cookie for the service origin, e.g. `sessionid=abc`. Repeatable.
    #[arg(long = "cookie")]
    cookies: Vec<String>,
    /// Answer yes to confirmation prompts.
    #[arg(long)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Search {
        keyword: Option<String>,
        #[arg(long, default_value = "all", value_parser = parse_scope)]
        scope: SearchScope,
        #[arg(long)]
        discount_only: bool,
        #[arg(long)]
        news_category: Option<String>,
        #[arg(long)]
        product_category: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        min_price: Option<String>,
        #[arg(long)]
        max_price: Option<String>,
        #[arg(long, value_parser = parse_preset)]
        preset: Option<PresetId>,
    },
    Recent,
    PresetForm {
        #[arg(long, value_parser = parse_preset)]
        id: Option<PresetId>,
    },
    PresetSubmit {
        #[arg(long, value_parser = parse_preset)]
        id: Option<PresetId>,
        /// Form field as `name=value`. Repeatable.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    PresetDelete {
        #[arg(value_parser = parse_preset)]
        id: PresetId,
    },
    React {
        item: String,
        kind: String,
        /// Reaction endpoint of the item, relative to the base url.
        #[arg(long)]
        url: String,
    },
    Analytics,
}

fn parse_scope(raw: &str) -> Result<SearchScope, String> {
    SearchScope::parse(raw).ok_or_else(|| format!("unknown scope '{raw}'"))
}

fn parse_preset(raw: &str) -> Result<PresetId, String> {
    PresetId::parse(raw).ok_or_else(|| format!("invalid preset id '{raw}'"))
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_settings_with(path, |key| std::env::var(key).ok())?,
        None => engagement_core::load_settings()?,
    };
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }

    let (runtime, transport) =
        EngagementRuntime::connect(&settings, console::Console::ports(cli.yes))?;
    for cookie in &cli.cookies {
        transport.add_cookie(cookie);
    }
    runtime.init(InitOptions::default()).await?;

    match cli.command {
        Command::Search {
            keyword,
            scope,
            discount_only,
            news_category,
            product_category,
            brand,
            min_price,
            max_price,
            preset,
        } => {
            runtime
                .search()
                .edit_form(|form| {
                    form.keyword = keyword.unwrap_or_default();
                    form.scope = scope;
                    form.discount_only = discount_only;
                    form.news_category = news_category.unwrap_or_default();
                    form.product_category = product_category.unwrap_or_default();
                    form.brand = brand.unwrap_or_default();
                    form.min_price = min_price.unwrap_or_default();
                    form.max_price = max_price.unwrap_or_default();
                })
                .await;
            let outcome = match preset {
                Some(preset) => runtime.apply_preset(preset).await,
                None => runtime.search().execute(SearchTrigger::Submit).await,
            };
            if let SearchOutcome::Failed(err) = outcome {
                bail!("search failed: {err}");
            }
        }
        Command::Recent => {
            if let SearchOutcome::Failed(err) = runtime.search().refresh_recent().await {
                bail!("recent searches failed: {err}");
            }
        }
        Command::PresetForm { id } => {
            if let FormOutcome::Failed(err) = runtime.presets().load_form(id).await {
                bail!("preset form failed: {err}");
            }
        }
        Command::PresetSubmit { id, fields } => {
            if let FormOutcome::Failed(err) = runtime.presets().load_form(id).await {
                bail!("preset form failed: {err}");
            }
            let mut fields = fields;
            if let Some(id) = id {
                if !fields.iter().any(|(name, _)| name == "id") {
                    fields.push(("id".to_string(), id.to_string()));
                }
            }
            match runtime.presets().submit(PresetFormData::new(fields)).await {
                SubmitOutcome::Saved(id) => println!("saved preset id={id}"),
                SubmitOutcome::Ignored => bail!("preset form was not open"),
                SubmitOutcome::Failed(err) => bail!("preset submit failed: {err}"),
            }
        }
        Command::PresetDelete { id } => match runtime.presets().delete(id).await {
            DeleteOutcome::Deleted => {}
            DeleteOutcome::Declined => println!("delete cancelled"),
            DeleteOutcome::Ignored => bail!("another delete is in progress"),
            DeleteOutcome::Failed(err) => bail!("preset delete failed: {err}"),
        },
        Command::React { item, kind, url } => {
            let widget = WidgetId::new(format!("cli-{item}"));
            let kind = ReactionKind::new(kind);
            runtime
                .reactions()
                .bind(vec![ReactionWidget {
                    widget: widget.clone(),
                    item: ItemId::new(item),
                    react_url: url,
                    kinds: vec![kind.clone()],
                    counts: BTreeMap::new(),
                }])
                .await;
            match runtime.reactions().click(&widget, kind).await {
                ReactionOutcome::Confirmed(_) => {}
                ReactionOutcome::Ignored => bail!("reaction widget was not bound"),
                ReactionOutcome::Rejected => bail!("reaction rejected by the service"),
                ReactionOutcome::Failed(err) => bail!("reaction failed: {err}"),
            }
        }
        Command::Analytics => match runtime.analytics().load().await {
            AnalyticsOutcome::Rendered => {}
            AnalyticsOutcome::Skipped => {
                bail!("analytics are only loaded for staff viewers (set is_staff = true)")
            }
            AnalyticsOutcome::Failed(err) => bail!("analytics failed: {err}"),
        },
    }

    Ok(())
}
