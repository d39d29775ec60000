//! TAP service handle
//!
//! A [`TapService`] is bound to one access URL and speaks the three HTTP
//! endpoints the facade needs: `/sync`, `/tables` and `/examples`. Handles are
//! cheap and built per call; they borrow the client's HTTP connection pool.

use super::client::TapClient;
use super::error::{Result, TapError};
use super::examples::parse_examples;
use super::tables::{parse_tableset, TableDesc};
use super::upload::{upload_param, Upload};
use super::votable::{parse_votable, VoTable};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

/// Where a TAP service lives: a bare URL, or a descriptor record carrying an
/// `access_url` (as returned by registry searches).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ServiceDescriptor {
    Url(String),
    Descriptor { access_url: String },
}

impl ServiceDescriptor {
    /// The access URL, whichever form the descriptor came in
    pub fn access_url(&self) -> &str {
        match self {
            ServiceDescriptor::Url(url) => url,
            ServiceDescriptor::Descriptor { access_url } => access_url,
        }
    }

    /// Collapse into the `Descriptor` form
    pub fn normalize(self) -> Self {
        match self {
            ServiceDescriptor::Url(access_url) => ServiceDescriptor::Descriptor { access_url },
            d @ ServiceDescriptor::Descriptor { .. } => d,
        }
    }

    /// Parse a command-line argument: a JSON object/string, or a plain URL
    pub fn parse_arg(arg: &str) -> Result<Self> {
        let trimmed = arg.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('"') {
            serde_json::from_str(trimmed).map_err(|e| {
                TapError::Config(format!("Invalid service descriptor '{}': {}", arg, e))
            })
        } else {
            Ok(ServiceDescriptor::Url(trimmed.to_string()))
        }
    }
}

impl From<&str> for ServiceDescriptor {
    fn from(url: &str) -> Self {
        ServiceDescriptor::Url(url.to_string())
    }
}

impl From<String> for ServiceDescriptor {
    fn from(url: String) -> Self {
        ServiceDescriptor::Url(url)
    }
}

impl From<&String> for ServiceDescriptor {
    fn from(url: &String) -> Self {
        ServiceDescriptor::Url(url.clone())
    }
}

impl From<url::Url> for ServiceDescriptor {
    fn from(url: url::Url) -> Self {
        ServiceDescriptor::Url(url.into())
    }
}

/// Result of a synchronous TAP query
#[derive(Debug, Clone)]
pub struct TapResult {
    pub table: VoTable,
}

impl TapResult {
    /// Number of result rows
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn into_table(self) -> VoTable {
        self.table
    }
}

/// Handle on a single TAP service
#[derive(Debug)]
pub struct TapService<'a> {
    client: &'a TapClient,
    base_url: String,
}

impl<'a> TapService<'a> {
    pub(crate) fn new(client: &'a TapClient, descriptor: ServiceDescriptor) -> Result<Self> {
        let access_url = descriptor.access_url().trim();
        url::Url::parse(access_url).map_err(|source| TapError::InvalidUrl {
            url: access_url.to_string(),
            source,
        })?;

        Ok(TapService {
            client,
            base_url: access_url.trim_end_matches('/').to_string(),
        })
    }

    /// The service base URL, without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Run an ADQL query on the synchronous endpoint
    ///
    /// With no uploads the request is a urlencoded form. Uploads switch to
    /// multipart, with one `UPLOAD=<name>,param:<name>` entry per table and a
    /// file part of the same name holding the VOTable bytes.
    pub async fn run_sync(&self, query: &str, uploads: &[Upload]) -> Result<TapResult> {
        let url = self.endpoint("sync");
        let mut params: Vec<(&'static str, String)> = vec![
            ("REQUEST", "doQuery".to_string()),
            ("LANG", "ADQL".to_string()),
            ("QUERY", query.to_string()),
        ];
        if let Some(maxrec) = self.client.config().maxrec {
            params.push(("MAXREC", maxrec.to_string()));
        }

        debug!(url = %url, uploads = uploads.len(), "Running synchronous query: {}", query);

        let body = if uploads.is_empty() {
            self.client
                .fetch(&url, |http| Ok(http.post(&url).form(&params)))
                .await?
        } else {
            params.push(("UPLOAD", upload_param(uploads)?));
            let mut payloads = Vec::with_capacity(uploads.len());
            for upload in uploads {
                let bytes = upload.read().await?;
                debug!(name = %upload.name, bytes = bytes.len(), "Prepared upload table");
                payloads.push((upload.name.clone(), bytes));
            }

            self.client
                .fetch(&url, |http| {
                    let mut form = Form::new();
                    for (key, value) in &params {
                        form = form.text(*key, value.clone());
                    }
                    for (name, bytes) in &payloads {
                        let part = Part::bytes(bytes.clone())
                            .file_name(format!("{}.xml", name))
                            .mime_str("application/x-votable+xml")?;
                        form = form.part(name.clone(), part);
                    }
                    Ok(http.post(&url).multipart(form))
                })
                .await?
        };

        let table = parse_votable(&body)?;
        debug!(
            rows = table.len(),
            columns = table.fields.len(),
            "Parsed query result"
        );
        Ok(TapResult { table })
    }

    /// Table descriptions from the VOSI `/tables` endpoint, in service order
    pub async fn tables(&self) -> Result<Vec<TableDesc>> {
        let url = self.endpoint("tables");
        let body = self.client.fetch(&url, |http| Ok(http.get(&url))).await?;
        let tables = parse_tableset(&body)?;
        debug!(url = %url, tables = tables.len(), "Loaded table set");
        Ok(tables)
    }

    /// Example queries from the DALI `/examples` endpoint
    ///
    /// Unlike [`TapClient::list_examples`] this surfaces network failures.
    pub async fn examples(&self) -> Result<Vec<String>> {
        let url = self.endpoint("examples");
        let body = self.client.fetch(&url, |http| Ok(http.get(&url))).await?;
        parse_examples(&body)
    }
}
