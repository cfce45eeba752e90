/// PostgREST query builder
///
/// Builds `/rest/v1/<table>` requests with PostgREST's filter syntax
/// (`column=eq.value`, `order=column.desc`, ...). Every write asks for
/// `Prefer: return=representation` so callers get the affected rows back and
/// can tell "nothing matched" apart from success.
///
/// Updates and deletes without at least one filter are refused before any
/// request is sent.

use super::client::{send_json, Scope, SupabaseClient, SupabaseError};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parameters that are not row filters
const NON_FILTER_PARAMS: &[&str] = &["select", "order", "limit", "offset", "on_conflict"];

impl SupabaseClient {
    /// Starts a query against `table`
    pub fn from(&self, table: &str) -> Query<'_> {
        Query {
            client: self,
            table: table.to_string(),
            params: Vec::new(),
        }
    }
}

/// A pending PostgREST request
#[derive(Debug, Clone)]
pub struct Query<'a> {
    client: &'a SupabaseClient,
    table: String,
    params: Vec<(String, String)>,
}

impl<'a> Query<'a> {
    fn set(mut self, key: &str, value: String) -> Self {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_string(), value));
        self
    }

    fn filter(mut self, column: &str, value: String) -> Self {
        self.params.push((column.to_string(), value));
        self
    }

    /// Columns to return (`*` by default)
    pub fn select(self, columns: &str) -> Self {
        self.set("select", columns.to_string())
    }

    /// `column = value`
    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, format!("eq.{}", value.to_string()))
    }

    /// `column >= value`
    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, format!("gte.{}", value.to_string()))
    }

    /// `column <= value`
    pub fn lte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, format!("lte.{}", value.to_string()))
    }

    /// Case-insensitive substring match
    pub fn ilike(self, column: &str, term: &str) -> Self {
        self.filter(column, format!("ilike.*{}*", sanitize_term(term)))
    }

    /// `column IN (values)`
    pub fn in_<T: ToString>(self, column: &str, values: &[T]) -> Self {
        let list = values
            .iter()
            .map(|v| format!("\"{}\"", v.to_string().replace('"', "")))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("in.({})", list))
    }

    /// Case-insensitive substring match on any of `columns`
    pub fn search(self, columns: &[&str], term: &str) -> Self {
        let term = sanitize_term(term);
        if term.is_empty() || columns.is_empty() {
            return self;
        }
        let alternatives = columns
            .iter()
            .map(|c| format!("{}.ilike.*{}*", c, term))
            .collect::<Vec<_>>()
            .join(",");
        self.filter("or", format!("({})", alternatives))
    }

    /// Sort order
    pub fn order(self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.set("order", format!("{}.{}", column, direction))
    }

    /// Maximum number of rows
    pub fn limit(self, count: usize) -> Self {
        self.set("limit", count.to_string())
    }

    /// Rows to skip
    pub fn offset(self, count: usize) -> Self {
        self.set("offset", count.to_string())
    }

    fn has_filters(&self) -> bool {
        self.params
            .iter()
            .any(|(k, _)| !NON_FILTER_PARAMS.contains(&k.as_str()))
    }

    fn path(&self) -> String {
        format!("rest/v1/{}", self.table)
    }

    fn query_params(&self) -> Vec<(String, String)> {
        let mut params = self.params.clone();
        if !params.iter().any(|(k, _)| k == "select") {
            params.push(("select".to_string(), "*".to_string()));
        }
        params
    }

    /// Fetches every matching row
    pub async fn fetch<T: DeserializeOwned>(self, scope: &Scope) -> Result<Vec<T>, SupabaseError> {
        tracing::debug!(table = %self.table, "PostgREST select");
        let req = self
            .client
            .request(Method::GET, &self.path(), scope)?
            .query(&self.query_params());
        send_json(req).await
    }

    /// Fetches the first matching row
    pub async fn fetch_optional<T: DeserializeOwned>(
        self,
        scope: &Scope,
    ) -> Result<Option<T>, SupabaseError> {
        let rows: Vec<T> = self.limit(1).fetch(scope).await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts `body` (an object or an array of objects)
    pub async fn insert<T, B>(self, scope: &Scope, body: &B) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::debug!(table = %self.table, "PostgREST insert");
        let req = self
            .client
            .request(Method::POST, &self.path(), scope)?
            .query(&self.query_params())
            .header("Prefer", "return=representation")
            .json(body);
        send_json(req).await
    }

    /// Inserts a single row and returns it
    pub async fn insert_one<T, B>(self, scope: &Scope, body: &B) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let table = self.table.clone();
        let rows: Vec<T> = self.insert(scope, body).await?;
        rows.into_iter().next().ok_or_else(|| {
            SupabaseError::Decode(format!("insert into {} returned no rows", table))
        })
    }

    /// Inserts or merges on the `on_conflict` columns
    pub async fn upsert<T, B>(
        self,
        scope: &Scope,
        body: &B,
        on_conflict: &str,
    ) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::debug!(table = %self.table, on_conflict, "PostgREST upsert");
        let query = self.set("on_conflict", on_conflict.to_string());
        let req = query
            .client
            .request(Method::POST, &query.path(), scope)?
            .query(&query.query_params())
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(body);
        send_json(req).await
    }

    /// Updates matching rows and returns them
    pub async fn update<T, B>(self, scope: &Scope, body: &B) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        if !self.has_filters() {
            return Err(SupabaseError::Config(format!(
                "refusing unfiltered update on {}",
                self.table
            )));
        }
        tracing::debug!(table = %self.table, "PostgREST update");
        let req = self
            .client
            .request(Method::PATCH, &self.path(), scope)?
            .query(&self.query_params())
            .header("Prefer", "return=representation")
            .json(body);
        send_json(req).await
    }

    /// Deletes matching rows and returns them
    pub async fn delete<T: DeserializeOwned>(self, scope: &Scope) -> Result<Vec<T>, SupabaseError> {
        if !self.has_filters() {
            return Err(SupabaseError::Config(format!(
                "refusing unfiltered delete on {}",
                self.table
            )));
        }
        tracing::debug!(table = %self.table, "PostgREST delete");
        let req = self
            .client
            .request(Method::DELETE, &self.path(), scope)?
            .query(&self.query_params())
            .header("Prefer", "return=representation");
        send_json(req).await
    }
}

/// Strips characters that carry meaning in PostgREST filter values
fn sanitize_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, '*' | ',' | '(' | ')' | '"' | '%'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::SupabaseConfig;

    fn client() -> SupabaseClient {
        SupabaseClient::new(SupabaseConfig {
            url: "http://localhost:54321".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: None,
            jwt_secret: None,
            storage_bucket: "documents".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_filters_are_encoded() {
        let client = client();
        let query = client
            .from("activities")
            .eq("regional", "Norte")
            .gte("data", "2024-01-01")
            .order("data", false)
            .limit(10);

        let params = query.query_params();
        assert!(params.contains(&("regional".to_string(), "eq.Norte".to_string())));
        assert!(params.contains(&("data".to_string(), "gte.2024-01-01".to_string())));
        assert!(params.contains(&("order".to_string(), "data.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "10".to_string())));
        assert!(params.contains(&("select".to_string(), "*".to_string())));
    }

    #[test]
    fn test_limit_replaces_previous_value() {
        let client = client();
        let query = client.from("goals").limit(50).limit(1);
        let limits: Vec<_> = query.params.iter().filter(|(k, _)| k == "limit").collect();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[0].1, "1");
    }

    #[test]
    fn test_search_builds_or_filter() {
        let client = client();
        let query = client.from("members").search(&["nome", "email"], "ana*(x)");
        assert_eq!(
            query.params,
            vec![(
                "or".to_string(),
                "(nome.ilike.*anax*,email.ilike.*anax*)".to_string()
            )]
        );
    }

    #[test]
    fn test_empty_search_is_ignored() {
        let client = client();
        let query = client.from("members").search(&["nome"], " ** ");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_in_quotes_values() {
        let client = client();
        let query = client.from("members").in_("id", &["a", "b"]);
        assert_eq!(query.params[0].1, "in.(\"a\",\"b\")");
    }

    #[test]
    fn test_modifiers_are_not_filters() {
        let client = client();
        assert!(!client.from("goals").select("id").order("id", true).has_filters());
        assert!(client.from("goals").eq("id", 1).has_filters());
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let client = client();
        let result: Result<Vec<serde_json::Value>, _> =
            client.from("goals").delete(&Scope::User("t".to_string())).await;
        assert!(matches!(result, Err(SupabaseError::Config(_))));
    }
}
