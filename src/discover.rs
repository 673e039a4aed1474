//! Schema discovery against the SODA metadata endpoint.
//!
//! Column selection is a two-phase contract: [`discover_columns`] plus
//! [`ColumnManifest::resolve`] settle a concrete column list up front, and
//! the paginator only ever works against that manifest.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use log::{debug, info, warn};
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;

use crate::{
    error::{FetchError, FetchResult},
    transport::Transport,
};

fn resource_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/resource/([a-z0-9]{4}-[a-z0-9]{4})\.json").expect("valid resource pattern")
    })
}

/// Extracts the `xxxx-xxxx` dataset id from a collection URL.
pub fn dataset_id(url: &str) -> Option<String> {
    resource_pattern()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn any_dataset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/(?:resource|api/views)/([a-z0-9]{4}-[a-z0-9]{4})\.json")
            .expect("valid dataset pattern")
    })
}

/// Dataset id named by either a collection or a metadata URL, for error context.
pub fn referenced_dataset_id(url: &str) -> Option<String> {
    any_dataset_pattern()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `https://<host>/api/views/<id>.json` for a collection URL on the same host.
pub fn metadata_url(url: &str) -> Option<String> {
    let id = dataset_id(url)?;
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Some(format!("{}://{authority}/api/views/{id}.json", parsed.scheme()))
}

#[derive(Debug, Deserialize)]
struct ViewMetadata {
    #[serde(default)]
    columns: Vec<ViewColumn>,
}

#[derive(Debug, Deserialize)]
struct ViewColumn {
    #[serde(rename = "fieldName")]
    field_name: Option<String>,
}

/// Field names currently published for the dataset behind `url`.
///
/// A URL that does not look like a SODA collection yields an empty set
/// ("schema unknown"); a failing metadata request is fatal.
pub fn discover_columns<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
) -> FetchResult<BTreeSet<String>> {
    if dataset_id(url).is_none() {
        debug!("'{url}' is not a SODA collection URL; schema unknown");
        return Ok(BTreeSet::new());
    }
    let meta_url = metadata_url(url).ok_or_else(|| FetchError::InvalidUrl {
        url: url.to_string(),
    })?;

    let body = transport.get_json(&meta_url, &[])?;
    let metadata: ViewMetadata =
        serde_json::from_value(body).map_err(|err| FetchError::Decode {
            url: meta_url.clone(),
            message: err.to_string(),
        })?;

    let fields: BTreeSet<String> = metadata
        .columns
        .into_iter()
        .filter_map(|c| c.field_name)
        .filter(|name| !name.is_empty())
        .collect();
    info!("Discovered {} field(s) from {meta_url}", fields.len());
    Ok(fields)
}

/// The concrete `$select`/`$order` settled before paging starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnManifest {
    pub select: Vec<String>,
    pub order_by: Option<String>,
    /// True when none of the desired columns existed and a single
    /// placeholder column was selected instead.
    pub fallback: bool,
}

impl ColumnManifest {
    /// Returns `None` when the schema is empty.
    ///
    /// Desired columns keep their requested order. When none survive, the
    /// lexicographically smallest schema field is selected so the query
    /// never asks for zero columns.
    pub fn resolve(
        schema: &BTreeSet<String>,
        desired: &[String],
        order_by: Option<&str>,
    ) -> Option<Self> {
        let first = schema.iter().next()?;

        let mut select: Vec<String> = Vec::new();
        for column in desired {
            if schema.contains(column) && !select.contains(column) {
                select.push(column.clone());
            }
        }

        let fallback = select.is_empty();
        if fallback {
            // TODO: confirm with dataset owners whether an empty selection should fail instead.
            warn!(
                "None of {desired:?} exist in the published schema; selecting '{first}' instead"
            );
            select.push(first.clone());
        }

        let order_by = order_by
            .filter(|col| schema.contains(*col))
            .map(str::to_string);

        Some(Self {
            select,
            order_by,
            fallback,
        })
    }

    pub fn select_clause(&self) -> String {
        self.select.join(", ")
    }

    pub fn order_clause(&self) -> Option<String> {
        self.order_by.as_ref().map(|col| format!("{col} DESC"))
    }
}
