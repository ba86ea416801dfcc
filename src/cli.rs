//! Command-line front end over the cached client.

use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

use crate::api::params::InventoryQuery;
use crate::api::types::{
  CreateItem, CreateLabel, CreateLocation, DuplicateOptions, FieldValue, InventoryItem,
  NodeKind, UpdateItem, UpdateLocation,
};
use crate::api::{ApiClient, AuthApi};
use crate::cached_client::CachedInventoryClient;
use crate::config::Config;
use crate::session::{Session, SessionStore, SqliteStorage};
use crate::tree::LocationArena;
use crate::view::{InventoryView, LocationsView};

/// How often views are ticked while waiting for a result.
const TICK: Duration = Duration::from_millis(25);

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Run the backend-for-frontend server
  Serve,
  /// Log in and remember the session
  Login {
    username: String,
  },
  /// Forget the stored session
  Logout,
  /// Show the logged-in user
  Whoami,
  /// Inventory items
  Items {
    #[command(subcommand)]
    command: ItemsCommand,
  },
  /// Labels
  Labels {
    #[command(subcommand)]
    command: LabelsCommand,
  },
  /// Locations
  Locations {
    #[command(subcommand)]
    command: LocationsCommand,
  },
}

#[derive(Subcommand, Debug)]
pub enum ItemsCommand {
  /// List one page of items
  List(ListArgs),
  Show {
    id: String,
  },
  Create {
    #[arg(long)]
    name: String,
    #[arg(long)]
    location: String,
    #[arg(long, default_value_t = 1)]
    quantity: u32,
    #[arg(long = "label")]
    labels: Vec<String>,
    #[arg(long)]
    description: Option<String>,
  },
  /// Update fields from a JSON object, e.g. '{"quantity": 3}'
  Update {
    id: String,
    #[arg(long)]
    json: String,
  },
  Delete {
    id: String,
  },
  Duplicate {
    id: String,
    #[arg(long)]
    prefix: Option<String>,
    #[arg(long)]
    no_attachments: bool,
    #[arg(long)]
    no_custom_fields: bool,
    #[arg(long)]
    no_maintenance: bool,
  },
  /// Download the spreadsheet export
  Export {
    /// Defaults to the filename the service suggests
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

#[derive(Args, Debug)]
pub struct ListArgs {
  #[arg(long, default_value_t = 1)]
  page: u32,
  #[arg(long)]
  page_size: Option<u32>,
  /// Free-text search
  #[arg(short)]
  q: Option<String>,
  #[arg(long = "label")]
  labels: Vec<String>,
  #[arg(long = "location")]
  locations: Vec<String>,
  #[arg(long = "parent")]
  parents: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum LabelsCommand {
  List,
  Create {
    #[arg(long)]
    name: String,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum LocationsCommand {
  /// Show the location tree
  List {
    /// List every location without nesting
    #[arg(long)]
    flat: bool,
  },
  Show {
    id: String,
  },
  Create {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    parent: Option<String>,
  },
  Update {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    parent: Option<String>,
  },
  Delete {
    id: String,
  },
}

fn session_store() -> Result<SessionStore<SqliteStorage>> {
  Ok(SessionStore::new(SqliteStorage::open()?))
}

fn client(config: &Config) -> Result<CachedInventoryClient> {
  let session = session_store()?.restore()?;
  if !session.is_authenticated() {
    info!("No stored session, sending requests anonymously");
  }
  CachedInventoryClient::new(config, session)
}

/// Run everything except `serve`.
pub async fn run(command: Command, config: &Config) -> Result<()> {
  match command {
    Command::Serve => Err(eyre!("serve is handled by main")),
    Command::Login { username } => login(config, &username).await,
    Command::Logout => {
      session_store()?.clear()?;
      println!("Logged out");
      Ok(())
    }
    Command::Whoami => {
      let session = session_store()?.restore()?;
      match session.user() {
        Some(user) => println!("{}", user.username),
        None => println!("Not logged in"),
      }
      Ok(())
    }
    Command::Items { command } => items(config, command).await,
    Command::Labels { command } => labels(config, command).await,
    Command::Locations { command } => locations(config, command).await,
  }
}

async fn login(config: &Config, username: &str) -> Result<()> {
  let password = match Config::get_password() {
    Some(password) => password,
    None => {
      eprint!("Password: ");
      let mut line = String::new();
      std::io::stdin().lock().read_line(&mut line)?;
      line.trim_end_matches(['\r', '\n']).to_string()
    }
  };

  let auth = AuthApi::new(ApiClient::new(&config.api.url, config.api.timeout())?);
  let session: Session = auth.login(username, &password).await?;
  session_store()?.save(&session)?;
  println!("Logged in as {}", username);
  Ok(())
}

async fn items(config: &Config, command: ItemsCommand) -> Result<()> {
  let client = client(config)?;

  match command {
    ItemsCommand::List(args) => {
      let query = InventoryQuery {
        page: args.page,
        page_size: args.page_size.unwrap_or(config.inventory.page_size),
        q: args.q.unwrap_or_default(),
        labels: args.labels,
        locations: args.locations,
        parent_ids: args.parents,
      };
      let mut view = InventoryView::new(client.inventory_query(query), config.inventory.debounce());
      while view.query().is_loading() {
        tokio::time::sleep(TICK).await;
        view.tick(Instant::now());
      }
      if let Some(e) = view.query().error() {
        return Err(e.clone().into());
      }

      for item in view.items() {
        println!("{}", item_row(item));
      }
      println!(
        "page {}/{} ({} items)",
        view.page(),
        view.total_pages().max(1),
        view.total()
      );
    }
    ItemsCommand::Show { id } => {
      let item = client.item(&id).await?;
      print_item(&item);
    }
    ItemsCommand::Create {
      name,
      location,
      quantity,
      labels,
      description,
    } => {
      let payload = CreateItem {
        name,
        description,
        quantity,
        location_id: location,
        label_ids: labels,
        ..Default::default()
      };
      let missing = payload.missing_fields();
      if !missing.is_empty() {
        return Err(eyre!("Missing required fields: {}", missing.join(", ")));
      }
      let item = client.create_item(&payload).await?;
      println!("Created {} ({})", item.name, item.id);
    }
    ItemsCommand::Update { id, json } => {
      let payload: UpdateItem =
        serde_json::from_str(&json).map_err(|e| eyre!("Invalid update JSON: {}", e))?;
      let item = client.update_item(&id, &payload).await?;
      println!("Updated {} ({})", item.name, item.id);
    }
    ItemsCommand::Delete { id } => {
      client.delete_item(&id).await?;
      println!("Deleted {}", id);
    }
    ItemsCommand::Duplicate {
      id,
      prefix,
      no_attachments,
      no_custom_fields,
      no_maintenance,
    } => {
      let defaults = DuplicateOptions::default();
      let options = DuplicateOptions {
        copy_attachments: !no_attachments,
        copy_custom_fields: !no_custom_fields,
        copy_maintenance: !no_maintenance,
        copy_prefix: prefix.unwrap_or(defaults.copy_prefix),
      };
      let copy = client.duplicate_item(&id, &options).await?;
      println!("Created {} ({})", copy.name, copy.id);
    }
    ItemsCommand::Export { output } => {
      let file = client.export().await?;
      let path = output
        .or_else(|| file.filename().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("inventory.xlsx"));
      std::fs::write(&path, &file.bytes)
        .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
      println!("Saved {} ({} bytes)", path.display(), file.bytes.len());
    }
  }
  Ok(())
}

async fn labels(config: &Config, command: LabelsCommand) -> Result<()> {
  let client = client(config)?;

  match command {
    LabelsCommand::List => {
      for label in client.labels().await?.iter() {
        println!("{:<24} {:<10} {}", label.id, label.color, label.name);
      }
    }
    LabelsCommand::Create {
      name,
      color,
      description,
    } => {
      let label = client
        .create_label(&CreateLabel {
          name,
          color,
          description,
        })
        .await?;
      println!("Created label {} ({})", label.name, label.id);
    }
  }
  Ok(())
}

async fn locations(config: &Config, command: LocationsCommand) -> Result<()> {
  let client = client(config)?;

  match command {
    LocationsCommand::List { flat } => {
      let mut view = LocationsView::new(client.locations_query(!flat));
      settle_locations(&mut view).await?;
      for line in render_tree(view.arena()) {
        println!("{}", line);
      }
    }
    LocationsCommand::Show { id } => {
      let mut view = LocationsView::new(client.locations_query(true));
      let (detail, items) = tokio::join!(client.location(&id), client.location_items(&id));
      let detail = detail?;
      settle_locations(&mut view).await?;

      let path = if view.select(&id) {
        view
          .breadcrumbs()
          .iter()
          .map(|r| r.name.as_str())
          .collect::<Vec<_>>()
          .join(" / ")
      } else {
        detail.name.clone()
      };
      println!("{}", path);
      if !detail.description.is_empty() {
        println!("  {}", detail.description);
      }
      println!(
        "  {} items, total value {:.2}",
        detail.item_count, detail.total_price
      );
      for item in items?.items.iter() {
        println!("  {}", item_row(item));
      }
    }
    LocationsCommand::Create {
      name,
      description,
      parent,
    } => {
      let location = client
        .create_location(&CreateLocation {
          name,
          description,
          parent_id: parent,
        })
        .await?;
      println!("Created location {} ({})", location.name, location.id);
    }
    LocationsCommand::Update {
      id,
      name,
      description,
      parent,
    } => {
      let location = client
        .update_location(
          &id,
          &UpdateLocation {
            name,
            description,
            parent_id: parent,
          },
        )
        .await?;
      println!("Updated location {} ({})", location.name, location.id);
    }
    LocationsCommand::Delete { id } => {
      client.delete_location(&id).await?;
      println!("Deleted location {}", id);
    }
  }
  Ok(())
}

async fn settle_locations(view: &mut LocationsView) -> Result<()> {
  while view.query().is_loading() {
    tokio::time::sleep(TICK).await;
    view.tick();
  }
  match view.query().error() {
    Some(e) => Err(e.clone().into()),
    None => Ok(()),
  }
}

fn item_row(item: &InventoryItem) -> String {
  let location = item
    .location
    .as_ref()
    .map(|l| l.name.as_str())
    .unwrap_or("-");
  let labels: Vec<&str> = item.labels.iter().map(|l| l.name.as_str()).collect();
  format!(
    "{:<24} {:>4}  {:<32} {:<20} {}",
    item.id,
    item.quantity,
    truncate(&item.name, 32),
    truncate(location, 20),
    labels.join(", ")
  )
}

fn print_item(item: &InventoryItem) {
  println!("{} ({})", item.name, item.id);
  if let Some(description) = &item.description {
    println!("  {}", description);
  }
  println!("  quantity: {}", item.quantity);
  if let Some(location) = &item.location {
    println!("  location: {}", location.name);
  }
  if !item.labels.is_empty() {
    let labels: Vec<&str> = item.labels.iter().map(|l| l.name.as_str()).collect();
    println!("  labels: {}", labels.join(", "));
  }
  for field in &item.fields {
    let value = match &field.value {
      FieldValue::Text(v) => v.clone(),
      FieldValue::Number(v) => v.to_string(),
      FieldValue::Boolean(v) => v.to_string(),
      FieldValue::Other { field_type, raw } => {
        let shown: Vec<String> = raw.values().map(|v| v.to_string()).collect();
        format!("{} ({})", shown.join(", "), field_type)
      }
    };
    println!("  {}: {}", field.name, value);
  }
  if let Some(attachment) = item.primary_attachment() {
    println!("  photo: {}", attachment.path);
  }
  println!("  updated: {}", item.updated_at.format("%Y-%m-%d %H:%M"));
}

/// Indented tree lines; items are marked so they stand apart from locations.
fn render_tree(arena: &LocationArena) -> Vec<String> {
  arena
    .walk()
    .into_iter()
    .map(|(depth, record)| {
      let marker = match record.kind {
        NodeKind::Location => "+",
        NodeKind::Item => "-",
      };
      let count = record
        .item_count
        .map(|n| format!(" ({})", n))
        .unwrap_or_default();
      format!(
        "{}{} {}{}  [{}]",
        "  ".repeat(depth),
        marker,
        record.name,
        count,
        record.id
      )
    })
    .collect()
}

/// Truncate to `max_len` characters, marking the cut with "...".
fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}
