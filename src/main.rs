//! Homeplate command line: inspect and edit a preferences file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homeplate::{
    AddedWidget, Config, ExtensionList, IconPack, InstalledExtension, PreferenceContext,
    ProviderId, ProviderInfo, WidgetId,
};

#[derive(Parser)]
#[command(name = "homeplate")]
#[command(about = "Home surface widget and appearance preferences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <config_dir>/homeplate/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Preferences file, overriding the configured one
    #[arg(long, value_name = "PATH")]
    prefs: Option<PathBuf>,

    /// Installed extension exposing a widget (repeatable, in order)
    #[arg(long = "extension", value_name = "NAME")]
    extensions: Vec<String>,

    /// Wallpaper image whose readability gates the blur effect
    #[arg(long, value_name = "PATH")]
    wallpaper: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print widgets and appearance preferences
    Show,

    /// Move the widget at position FROM to position TO
    Reorder { from: usize, to: usize },

    /// Add a host widget and append it to the order
    AddWidget {
        /// Provider as package/class (a class starting with '.' is relative)
        provider: String,

        /// Host-assigned widget instance id
        instance: i32,

        /// Label shown for the provider
        #[arg(long)]
        label: Option<String>,
    },

    /// Remove a host widget and drop it from the order
    RemoveWidget {
        /// Provider as package/class
        provider: String,
    },

    /// Enable or disable the plate blur effect
    Blur {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Use an installed icon pack, or default icons when omitted
    IconPack { package: Option<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homeplate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if let Some(prefs) = cli.prefs {
        config.storage.path = Some(prefs);
    }
    if let Some(wallpaper) = cli.wallpaper {
        config.wallpaper.path = Some(wallpaper);
    }

    let registry = Arc::new(ExtensionList::new(
        cli.extensions
            .iter()
            .map(|name| InstalledExtension::new(name.as_str(), true))
            .collect(),
    ));
    let context = PreferenceContext::open(&config, registry).with_context(|| {
        format!(
            "Failed to open preferences at {}",
            config.preferences_path().display()
        )
    })?;

    match cli.command {
        Commands::Show => show(&context),
        Commands::Reorder { from, to } => {
            context.widgets().order().move_entry(from, to)?;
            show_order(&context);
        }
        Commands::AddWidget {
            provider,
            instance,
            label,
        } => {
            let provider = ProviderId::parse(&provider)?;
            let info = ProviderInfo {
                label: label.unwrap_or_else(|| provider.class().to_string()),
                provider,
                min_width: 1,
                min_height: 1,
            };
            let widget = context
                .widgets()
                .add_android_widget_to_surface(info, instance)?;
            println!("Added {}", describe(&widget));
        }
        Commands::RemoveWidget { provider } => {
            let id = ProviderId::parse(&provider)?.widget_id();
            let removed = context.widgets().remove_android_widget_from_surface(&id)?;
            if removed.is_empty() {
                println!("No widget from {} is added", id);
            } else {
                for widget in &removed {
                    println!("Removed {}", describe(widget));
                }
            }
        }
        Commands::Blur { state } => {
            let requested = matches!(state, Toggle::On);
            let stored = context.appearance().set_blur_effect_enabled(requested)?;
            if requested && !stored {
                println!("Blur effect disabled: the wallpaper is not readable");
            } else {
                println!("Blur effect {}", if stored { "enabled" } else { "disabled" });
            }
        }
        Commands::IconPack { package } => {
            let appearance = context.appearance();
            match package {
                Some(package) => appearance.change_icon_pack(&package)?,
                None => appearance.use_default_icon_pack()?,
            }
            println!("Icon pack: {}", describe_icon_pack(&appearance.icon_pack()));
        }
    }

    Ok(())
}

fn show(context: &PreferenceContext) {
    show_order(context);

    let widgets = context.widgets();
    println!();
    println!("Added widgets:");
    for widget in widgets.added().all() {
        println!("  {}", describe(&widget));
    }

    let unresolved: Vec<WidgetId> = {
        let resolved = widgets.resolved();
        widgets
            .order()
            .current_order()
            .into_iter()
            .filter(|id| !resolved.iter().any(|w| w.id() == id))
            .collect()
    };
    if !unresolved.is_empty() {
        println!();
        println!("Unresolved (skipped):");
        for id in unresolved {
            println!("  {}", id);
        }
    }

    let appearance = context.appearance();
    println!();
    println!(
        "Blur effect: {} (wallpaper {})",
        if appearance.is_blur_effect_enabled() {
            "enabled"
        } else {
            "disabled"
        },
        if appearance.has_wallpaper_access() {
            "readable"
        } else {
            "not readable"
        }
    );
    println!(
        "Icon pack: {}",
        describe_icon_pack(&appearance.icon_pack())
    );
}

fn show_order(context: &PreferenceContext) {
    println!("Widget order:");
    for (position, id) in context.widgets().order().current_order().iter().enumerate() {
        println!("  {:>2}. {}", position, id);
    }
}

fn describe(widget: &AddedWidget) -> String {
    match widget {
        AddedWidget::Android {
            provider_id,
            instance_id,
        } => format!("{} (instance {})", provider_id, instance_id),
        AddedWidget::Extension { extension_name } => format!("{} (extension)", extension_name),
    }
}

fn describe_icon_pack(icon_pack: &IconPack) -> String {
    match icon_pack {
        IconPack::Default => "default".to_string(),
        IconPack::Installed { package } => package.clone(),
    }
}
