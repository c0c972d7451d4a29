//! Row-filtering requests against the backend's REST endpoint.
//!
//! Queries are built PostgREST style: filters go into the query string as
//! `column=op.value`, ordering as `order=column.asc`, and nested resources are pulled in
//! through `select=*,child(*)`. Writes ask for the affected rows back.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::models::BackendErrorBody;
use crate::error::{AppResult, Error};

/// Client for the REST endpoint
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base: Url,
    api_key: String,
}

impl RestClient {
    /// `base` is the project URL; the REST prefix is appended here
    pub fn new(client: Client, base: &Url, api_key: impl Into<String>) -> AppResult<Self> {
        let base = base.join("rest/v1/")?;
        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
        })
    }

    /// Start a query on `table`
    pub fn from(&self, table: &str) -> TableQuery<'_> {
        TableQuery {
            rest: self,
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    fn request(&self, method: Method, url: Url, bearer: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }
}

/// A filtered view of one table, turned into a request by one of the terminal methods
pub struct TableQuery<'a> {
    rest: &'a RestClient,
    table: String,
    params: Vec<(String, String)>,
}

impl<'a> TableQuery<'a> {
    /// Columns to return, e.g. `*,todos(*)`
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "lte", value)
    }

    /// Sort by `column`; repeated calls add tie-breakers to the same `order` parameter
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        let term = format!("{}.{}", column, direction);
        match self.params.iter_mut().find(|(key, _)| key == "order") {
            Some((_, value)) => {
                value.push(',');
                value.push_str(&term);
            }
            None => self.params.push(("order".to_string(), term)),
        }
        self
    }

    fn filter(mut self, column: &str, op: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("{}.{}", op, value.to_string())));
        self
    }

    /// Full request URL with every filter applied
    pub fn url(&self) -> AppResult<Url> {
        let mut url = self.rest.base.join(&self.table)?;
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET the matching rows
    pub async fn fetch<T: DeserializeOwned>(self, bearer: &str) -> AppResult<Vec<T>> {
        let url = self.url()?;
        debug!("GET {}", url.path());
        let response = self.rest.request(Method::GET, url, bearer).send().await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// POST new rows and return them as stored
    pub async fn insert<B, T>(self, rows: &B, bearer: &str) -> AppResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url()?;
        debug!("POST {}", url.path());
        let response = self
            .rest
            .request(Method::POST, url, bearer)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// PATCH the matching rows and return them as stored
    pub async fn update<B, T>(self, patch: &B, bearer: &str) -> AppResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url()?;
        debug!("PATCH {}", url.path());
        let response = self
            .rest
            .request(Method::PATCH, url, bearer)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// DELETE the matching rows
    pub async fn delete(self, bearer: &str) -> AppResult<()> {
        let url = self.url()?;
        debug!("DELETE {}", url.path());
        let response = self.rest.request(Method::DELETE, url, bearer).send().await?;
        check_response(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into `Error::Backend` with the backend's own message
pub async fn check_response(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response".to_string());
    Err(backend_error(status.as_u16(), &body))
}

/// Build a backend error from a status and a raw body
pub fn backend_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<BackendErrorBody>(body)
        .ok()
        .and_then(BackendErrorBody::into_message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            }
        });
    Error::Backend { status, message }
}
