//! Loading the item catalog and seed ratings from CSV.
//!
//! Two files, both with a header row:
//!
//! ```text
//! items.csv    id,title,genres          1,Toy Story (1995),Adventure|Animation
//! ratings.csv  user,item,rating[,...]   1,1,4.0,964982703
//! ```
//!
//! Titles may be quoted and contain commas. A trailing `(year)` is split off
//! into [`Item::year`]. `(no genres listed)` yields an empty genre list.
//! Columns after the third in the ratings file are ignored.

use std::io::Read;
use std::path::Path;

use causeway_types::{Item, ItemId, Rating, UserId};
use csv::StringRecord;

use crate::error::{CatalogError, Result};

const NO_GENRES: &str = "(no genres listed)";

/// Item metadata and initial ratings, ready to seed a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub items: Vec<Item>,
    pub ratings: Vec<(UserId, ItemId, Rating)>,
}

impl Catalog {
    /// Reads both files from disk.
    pub fn load(items_path: &Path, ratings_path: &Path) -> Result<Self> {
        let items = csv::Reader::from_path(items_path).map_err(|source| CatalogError::Open {
            path: items_path.to_path_buf(),
            source,
        })?;
        let ratings =
            csv::Reader::from_path(ratings_path).map_err(|source| CatalogError::Open {
                path: ratings_path.to_path_buf(),
                source,
            })?;

        let catalog = Self {
            items: read_items(items)?,
            ratings: read_ratings(ratings)?,
        };
        tracing::info!(
            items = catalog.items.len(),
            ratings = catalog.ratings.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Reads both files from arbitrary readers.
    pub fn from_readers(items: impl Read, ratings: impl Read) -> Result<Self> {
        Ok(Self {
            items: read_items(csv::Reader::from_reader(items))?,
            ratings: read_ratings(csv::Reader::from_reader(ratings))?,
        })
    }
}

fn read_items<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);

        let id = field(&record, 0, line)?
            .parse::<u32>()
            .map_err(|e| CatalogError::invalid(line, format!("item id: {e}")))?;
        let (title, year) = split_title(field(&record, 1, line)?);
        let genres = parse_genres(field(&record, 2, line)?);

        items.push(Item {
            id: ItemId::new(id),
            title,
            year,
            genres,
        });
    }
    Ok(items)
}

fn read_ratings<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<(UserId, ItemId, Rating)>> {
    let mut ratings = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = line_of(&record);

        let user = field(&record, 0, line)?
            .parse::<u32>()
            .map_err(|e| CatalogError::invalid(line, format!("user id: {e}")))?;
        let item = field(&record, 1, line)?
            .parse::<u32>()
            .map_err(|e| CatalogError::invalid(line, format!("item id: {e}")))?;
        let value = field(&record, 2, line)?
            .parse::<f32>()
            .map_err(|e| CatalogError::invalid(line, format!("rating: {e}")))?;
        let rating = Rating::new(value).map_err(|e| CatalogError::invalid(line, e.to_string()))?;

        ratings.push((UserId::new(user), ItemId::new(item), rating));
    }
    Ok(ratings)
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

fn field(record: &StringRecord, index: usize, line: u64) -> Result<&str> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| CatalogError::invalid(line, format!("missing column {}", index + 1)))
}

/// Splits `"Name (1995)"` into `("Name", Some(1995))`.
fn split_title(raw: &str) -> (String, Option<u16>) {
    let raw = raw.trim();
    let parsed = raw
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once(" ("))
        .and_then(|(name, year)| {
            let year = year.parse::<u16>().ok()?;
            Some((name.trim().to_string(), year))
        });

    match parsed {
        Some((name, year)) if !name.is_empty() => (name, Some(year)),
        _ => (raw.to_string(), None),
    }
}

fn parse_genres(raw: &str) -> Vec<String> {
    if raw.is_empty() || raw == NO_GENRES {
        return Vec::new();
    }
    raw.split('|').map(str::to_string).collect()
}
