use super::error::{Result, TapError};
use super::service::{ServiceDescriptor, TapResult, TapService};
use super::upload::Upload;
use super::votable::{query_error_message, Field, TableMeta};
use crate::config::ClientConfig;
use tracing::{debug, warn};

/// Columns of a table, as discovered by a one-row probe query
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnListing {
    /// The probe returned at least one row: the result's column descriptors
    Columns(Vec<Field>),
    /// The probe returned no rows: the result's table metadata
    Metadata(TableMeta),
}

impl ColumnListing {
    /// Column descriptors, if the probe returned rows
    pub fn columns(&self) -> Option<&[Field]> {
        match self {
            ColumnListing::Columns(fields) => Some(fields),
            ColumnListing::Metadata(_) => None,
        }
    }
}

/// Main TAP client
///
/// Holds the HTTP connection pool and the request policy (timeout, retries,
/// MAXREC). Service handles are created per call from a [`ServiceDescriptor`].
#[derive(Debug, Clone)]
pub struct TapClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl TapClient {
    /// Create a client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(TapClient { http, config })
    }

    /// Create a client from `VO_TAP_*` environment variables
    ///
    /// Recognized variables:
    /// - `VO_TAP_TIMEOUT`: per-request timeout in seconds
    /// - `VO_TAP_RETRIES`: total number of attempts
    /// - `VO_TAP_MAXREC`: row limit sent with every query
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a handle on the service described by `service`
    pub fn service(&self, service: impl Into<ServiceDescriptor>) -> Result<TapService<'_>> {
        TapService::new(self, service.into())
    }

    /// Run an ADQL query synchronously
    ///
    /// `service` is a URL or a descriptor carrying an `access_url`; both
    /// produce the same request. With `upload` set, the table is sent under
    /// its name and can be referenced as `TAP_UPLOAD.<name>` in the query.
    pub async fn query(
        &self,
        service: impl Into<ServiceDescriptor>,
        query: &str,
        upload: Option<Upload>,
    ) -> Result<TapResult> {
        let service = self.service(service)?;
        match upload {
            Some(upload) => service.run_sync(query, std::slice::from_ref(&upload)).await,
            None => service.run_sync(query, &[]).await,
        }
    }

    /// Names of the tables published by a service, in service order
    ///
    /// With `contains` set, only names containing that substring
    /// (case-sensitive) are returned.
    pub async fn list_tables(
        &self,
        service: impl Into<ServiceDescriptor>,
        contains: Option<&str>,
    ) -> Result<Vec<String>> {
        let tables = self.service(service)?.tables().await?;
        Ok(filter_names(tables.into_iter().map(|t| t.name), contains))
    }

    /// Columns of a table, discovered with `select top 1 * from <table>`
    ///
    /// Returns the column descriptors when the table has rows and the result
    /// metadata when it is empty. A failing probe query returns its error.
    pub async fn list_columns(
        &self,
        service: impl Into<ServiceDescriptor>,
        tablename: &str,
    ) -> Result<ColumnListing> {
        let query = format!("select top 1 * from {}", tablename);
        let table = self.query(service, &query, None).await?.into_table();

        if table.is_empty() {
            debug!(table = tablename, "Probe query returned no rows");
            Ok(ColumnListing::Metadata(table.meta))
        } else {
            Ok(ColumnListing::Columns(table.fields))
        }
    }

    /// Example queries from the service's `/examples` endpoint
    ///
    /// An unreachable endpoint, or one answering with an HTTP error, yields
    /// an empty list. A document that is not well-formed XML is an error.
    pub async fn list_examples(
        &self,
        service: impl Into<ServiceDescriptor>,
    ) -> Result<Vec<String>> {
        let service = self.service(service)?;
        match service.examples().await {
            Ok(examples) => Ok(examples),
            Err(e) if e.is_network() => {
                warn!(service = service.base_url(), "No examples available: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Send a request built by `build`, retrying transient failures
    ///
    /// `build` is called once per attempt since request bodies (multipart in
    /// particular) cannot be replayed.
    pub(crate) async fn fetch<F>(&self, url: &str, build: F) -> Result<String>
    where
        F: Fn(&reqwest::Client) -> Result<reqwest::RequestBuilder>,
    {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url, &build).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    warn!(
                        url = url,
                        attempt = attempt,
                        retries = self.config.retries,
                        "Request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once<F>(&self, url: &str, build: &F) -> Result<String>
    where
        F: Fn(&reqwest::Client) -> Result<reqwest::RequestBuilder>,
    {
        let response = build(&self.http)?.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(url = url, status = status.as_u16(), bytes = body.len(), "Response received");

        if !status.is_success() {
            return Err(TapError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body)
    }
}

/// Keep names containing `contains`, preserving order
fn filter_names(names: impl IntoIterator<Item = String>, contains: Option<&str>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| contains.map_or(true, |s| name.contains(s)))
        .collect()
}

/// Short description of an error response body
fn error_message(body: &str) -> String {
    const MAX_LEN: usize = 200;

    if let Some(message) = query_error_message(body) {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_LEN {
        let cut: String = trimmed.chars().take(MAX_LEN).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_names_none_keeps_all() {
        let all = names(&["ivoa.obscore", "tap_schema.tables", "gaia.source"]);
        assert_eq!(filter_names(all.clone(), None), all);
    }

    #[test]
    fn test_filter_names_substring_keeps_order() {
        let all = names(&["tap_schema.tables", "ivoa.obscore", "tap_schema.columns"]);
        assert_eq!(
            filter_names(all, Some("tap_schema")),
            names(&["tap_schema.tables", "tap_schema.columns"])
        );
    }

    #[test]
    fn test_filter_names_is_case_sensitive() {
        let all = names(&["Gaia.Source", "gaia.source"]);
        assert_eq!(filter_names(all, Some("gaia")), names(&["gaia.source"]));
    }

    #[test]
    fn test_error_message_prefers_query_status() {
        let body = r#"<VOTABLE><RESOURCE type="results">
            <INFO name="QUERY_STATUS" value="ERROR">syntax error at line 1</INFO>
        </RESOURCE></VOTABLE>"#;
        assert_eq!(error_message(body), "syntax error at line 1");
        assert_eq!(error_message("  Internal Server Error \n"), "Internal Server Error");

        let long = "x".repeat(500);
        assert_eq!(error_message(&long).len(), 203);
    }

    #[test]
    fn test_column_listing_columns() {
        let listing = ColumnListing::Metadata(TableMeta::default());
        assert!(listing.columns().is_none());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig {
            retries: 0,
            ..Default::default()
        };
        assert!(matches!(TapClient::new(config), Err(TapError::Config(_))));
    }
}
