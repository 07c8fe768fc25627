//! Interactive client commands: parsing input lines and rendering results.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use causeway_replica::ReplicaSnapshot;
use causeway_types::{
    ItemDetails, ItemId, QueryParams, Rating, RatingParams, ReplicaId, ReplicaStatus, UserId,
};

/// Help text for the interactive client.
pub const HELP_TEXT: &str = r"
Commands:
  query  <item> [<user>]           Show an item, with the user's own rating
  submit <item> <user> <rating>    Rate an item for the first time
  update <item> <user> <rating>    Change an existing rating
  status <replica> <0|1|2>         Set a replica ACTIVE, OVERLOADED or OFFLINE
  replicas                         Show every replica's clocks and log
  reset                            Restore the front end's replica order
  help                             Show this help message
  quit                             Exit

Ratings range from 0.0 to 5.0.
";

/// One line of client input.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Query(QueryParams),
    Submit(RatingParams),
    Update(RatingParams),
    Status {
        replica: ReplicaId,
        status: ReplicaStatus,
    },
    Replicas,
    Reset,
    Help,
    Quit,
}

impl ClientCommand {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (name.to_lowercase().as_str(), args) {
            ("query" | "q", [item]) => Self::Query(QueryParams::new(item_id(item)?, None)),
            ("query" | "q", [item, user]) => {
                Self::Query(QueryParams::new(item_id(item)?, Some(user_id(user)?)))
            }
            ("submit" | "s", [item, user, rating]) => {
                Self::Submit(rating_params(item, user, rating)?)
            }
            ("update" | "u", [item, user, rating]) => {
                Self::Update(rating_params(item, user, rating)?)
            }
            ("status", [replica, code]) => Self::Status {
                replica: ReplicaId::new(number(replica, "replica")?),
                status: ReplicaStatus::from_code(number(code, "status code")?)?,
            },
            ("replicas", []) => Self::Replicas,
            ("reset", []) => Self::Reset,
            ("help" | "h" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            (other, _) => bail!("unrecognised input '{other}' with {} argument(s)", args.len()),
        };
        Ok(Some(command))
    }
}

fn number<T: std::str::FromStr>(word: &str, what: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    word.parse().with_context(|| format!("invalid {what} '{word}'"))
}

fn item_id(word: &str) -> Result<ItemId> {
    Ok(ItemId::new(number(word, "item")?))
}

fn user_id(word: &str) -> Result<UserId> {
    Ok(UserId::new(number(word, "user")?))
}

fn rating_params(item: &str, user: &str, rating: &str) -> Result<RatingParams> {
    let rating = Rating::new(number(rating, "rating")?)?;
    Ok(RatingParams::new(item_id(item)?, user_id(user)?, rating))
}

/// Renders query results for the terminal.
pub fn format_details(item: ItemId, details: &ItemDetails) -> String {
    if details.is_absent() {
        return format!("No item {item}.\n");
    }

    let mut out = String::new();
    match &details.item {
        Some(meta) => {
            let _ = writeln!(out, "{meta}");
            if !meta.genres.is_empty() {
                let _ = writeln!(out, "  Genres:  {}", meta.genres.join(", "));
            }
        }
        None => {
            let _ = writeln!(out, "Item {item} (no catalog entry)");
        }
    }

    let distribution = &details.distribution;
    match distribution.average() {
        Some(average) => {
            let _ = writeln!(
                out,
                "  Ratings: {} (average {average:.2})",
                distribution.total()
            );
            for (rating, count) in distribution.buckets() {
                let _ = writeln!(out, "    {rating}  {count}");
            }
        }
        None => {
            let _ = writeln!(out, "  Ratings: none");
        }
    }

    if let Some(rating) = details.user_rating {
        let _ = writeln!(out, "  Yours:   {rating}");
    }
    out
}

pub fn format_snapshot(snapshot: &ReplicaSnapshot) -> String {
    format!(
        "{}  {:<10}  replica {}  value {}  log {}  executed {}",
        snapshot.id,
        snapshot.status.to_string(),
        snapshot.replica_clock,
        snapshot.value_clock,
        snapshot.log_len,
        snapshot.executed
    )
}
