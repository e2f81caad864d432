use std::sync::Arc;

use async_trait::async_trait;
use engagement_core::{
    analytics::AnalyticsRender,
    ports::{
        AnalyticsView, ConfirmPrompt, Listing, Navigator, Notice, NoticeLevel, Notifier, Ports,
        PresetView, ReactionView, SearchView,
    },
    presets::{PresetEntry, PresetOption},
    reactions::ReactionDisplay,
    search::{RecentEntry, SearchRender},
};
use shared::domain::{PresetId, WidgetId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use url::Url;

/// Prints every view update to stdout.
pub struct Console {
    assume_yes: bool,
}

impl Console {
    pub fn ports(assume_yes: bool) -> Ports {
        let console = Arc::new(Self { assume_yes });
        Ports {
            search: console.clone(),
            presets: console.clone(),
            reactions: console.clone(),
            analytics: console.clone(),
            notifier: console.clone(),
            navigator: console.clone(),
            confirm: console,
        }
    }
}

fn print_listing<T>(title: &str, listing: &Listing<T>, line: impl Fn(&T) -> String) {
    println!("{title}:");
    match listing {
        Listing::Items(items) => {
            for item in items {
                println!("  - {}", line(item));
            }
        }
        Listing::Empty { placeholder } => println!("  {placeholder}"),
    }
}

impl SearchView for Console {
    fn set_loading(&self, loading: bool) {
        debug!("console: search loading={loading}");
    }

    fn render_results(&self, render: &SearchRender) {
        println!("{}", render.summary_line);
        print_listing("news", &render.news, |card| {
            let mut line = format!("[{}] {} <{}>", card.category, card.title, card.url);
            if let Some(views) = card.views {
                line.push_str(&format!(" views={views}"));
            }
            line
        });
        print_listing("products", &render.products, |card| {
            let mut line = format!("{} {} <{}>", card.name, card.price_label, card.url);
            if let Some(discount) = &card.discount_label {
                line.push_str(&format!(" ({discount})"));
            }
            if let Some(stock) = card.stock {
                line.push_str(&format!(" stock={stock}"));
            }
            line
        });
        self.render_recent(&render.recent);
    }

    fn render_recent(&self, recent: &Listing<RecentEntry>) {
        print_listing("recent", recent, |entry| entry.label.clone());
    }

    fn render_status(&self, line: &str) {
        println!("{line}");
    }
}

impl PresetView for Console {
    fn set_form_loading(&self, loading: bool) {
        debug!("console: preset form loading={loading}");
    }

    fn render_form(&self, markup: &str) {
        println!("{markup}");
    }

    fn close_form(&self) {
        debug!("console: preset form closed");
    }

    fn set_submit_enabled(&self, enabled: bool) {
        debug!("console: preset submit enabled={enabled}");
    }

    fn render_list(&self, entries: &[PresetEntry]) {
        println!("presets:");
        for entry in entries {
            println!("  {} {}", entry.preset.id, entry.preset.label);
        }
    }

    fn render_selector(&self, _options: &[PresetOption], selected: Option<PresetId>) {
        match selected {
            Some(id) => println!("selected preset: {id}"),
            None => println!("selected preset: none"),
        }
    }

    fn set_delete_pending(&self, preset: PresetId, pending: bool) {
        debug!("console: preset delete pending id={preset} pending={pending}");
    }
}

impl ReactionView for Console {
    fn render(&self, widget: &WidgetId, display: &ReactionDisplay) {
        if display.pending {
            return;
        }
        let controls = display
            .controls
            .iter()
            .map(|control| {
                let marker = if control.active { "*" } else { "" };
                format!("{}{marker}={}", control.kind, control.count)
            })
            .collect::<Vec<_>>()
            .join(" ");
        println!("{widget} [{}] {controls}", display.item);
    }
}

impl AnalyticsView for Console {
    fn render(&self, render: &AnalyticsRender) {
        print_listing("top queries", &render.top_queries, String::clone);
        print_listing("scopes", &render.scope_breakdown, String::clone);
    }

    fn show_loading_error(&self, message: &str) {
        eprintln!("{message}");
    }
}

impl Notifier for Console {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            NoticeLevel::Success | NoticeLevel::Info => println!("{}", notice.message),
        }
    }
}

impl Navigator for Console {
    fn redirect_to_login(&self, login: &Url) {
        eprintln!("sign in required: {login}");
    }
}

#[async_trait]
impl ConfirmPrompt for Console {
    async fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        println!("{message} [y/N]");
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(err) => {
                debug!("console: confirm read failed error={err}");
                false
            }
        }
    }
}
