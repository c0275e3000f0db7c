//! Filtered CRUD against the backend tables, authorised per request.

use crate::supabase_client::read_json;
use crate::{AuthError, AuthResult, RequestAuthorizer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// Tables the client reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Properties,
    BoardingHouses,
    Profiles,
    Bookings,
    Favorites,
    Notifications,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Properties,
        Table::BoardingHouses,
        Table::Profiles,
        Table::Bookings,
        Table::Favorites,
        Table::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Properties => "properties",
            Table::BoardingHouses => "boarding_houses",
            Table::Profiles => "profiles",
            Table::Bookings => "bookings",
            Table::Favorites => "favorites",
            Table::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|table| table.as_str() == s.trim())
            .ok_or_else(|| AuthError::Validation(format!("Unknown table: {s}")))
    }
}

/// REST client whose every request goes through a [`RequestAuthorizer`].
///
/// Under the anonymous key row-level rules may hide rows, so an empty result
/// is not an error.
#[derive(Clone)]
pub struct RestClient {
    http_client: reqwest::Client,
    base_url: Url,
    authorizer: RequestAuthorizer,
}

impl RestClient {
    pub fn new(http_client: reqwest::Client, base_url: Url, authorizer: RequestAuthorizer) -> Self {
        Self {
            http_client,
            base_url,
            authorizer,
        }
    }

    /// `<base>/rest/v1/<table>?col=eq.value&...`
    pub fn table_url(&self, table: Table, filters: &[(&str, &str)]) -> AuthResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AuthError::Config(format!("invalid backend URL: {}", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(["rest", "v1", table.as_str()]);
        }
        if !filters.is_empty() {
            let mut query = url.query_pairs_mut();
            for (column, value) in filters {
                query.append_pair(column, &format!("eq.{value}"));
            }
        }
        Ok(url)
    }

    pub async fn select(&self, table: Table, filters: &[(&str, &str)]) -> AuthResult<Vec<Value>> {
        let url = self.table_url(table, filters)?;
        debug!(table = %table, filters = filters.len(), "Selecting rows");
        let request = self
            .http_client
            .get(url)
            .header("Accept", "application/json");
        let response = self.authorizer.authorize(request).send().await?;
        read_json(response, &format!("Failed to load {table}")).await
    }

    pub async fn insert(&self, table: Table, row: &Value) -> AuthResult<Vec<Value>> {
        let url = self.table_url(table, &[])?;
        debug!(table = %table, "Inserting row");
        let request = self
            .http_client
            .post(url)
            .header("Prefer", "return=representation")
            .json(row);
        let response = self.authorizer.authorize(request).send().await?;
        read_json(response, &format!("Failed to save to {table}")).await
    }

    /// Patch every row matching `filters`. An empty filter list is refused
    /// rather than updating the whole table.
    pub async fn update(
        &self,
        table: Table,
        filters: &[(&str, &str)],
        changes: &Value,
    ) -> AuthResult<Vec<Value>> {
        if filters.is_empty() {
            return Err(AuthError::Validation(
                "Refusing to update without a filter".to_string(),
            ));
        }
        let url = self.table_url(table, filters)?;
        debug!(table = %table, filters = filters.len(), "Updating rows");
        let request = self
            .http_client
            .patch(url)
            .header("Prefer", "return=representation")
            .json(changes);
        let response = self.authorizer.authorize(request).send().await?;
        read_json(response, &format!("Failed to update {table}")).await
    }
}
