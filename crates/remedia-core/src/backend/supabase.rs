//! Supabase implementation of the backend capabilities over its REST APIs.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use super::auth::{AuthSession, SessionPersistence, SupabaseAuthClient};
use super::{filter_params, Auth, Filter, Functions, Storage, TableQuery, Tables};
use crate::config::ClientConfig;
use crate::{Error, Result};

/// Reqwest-backed client for a Supabase project.
#[derive(Clone)]
pub struct SupabaseBackend<S: SessionPersistence> {
    config: ClientConfig,
    client: Client,
    auth: SupabaseAuthClient<S>,
}

impl<S: SessionPersistence> SupabaseBackend<S> {
    pub fn new(config: ClientConfig, store: S) -> Result<Self> {
        let auth =
            SupabaseAuthClient::new(&config.supabase_url, config.supabase_anon_key.clone(), store)?;
        Ok(Self {
            config,
            client: Client::builder().build()?,
            auth,
        })
    }

    pub const fn auth_client(&self) -> &SupabaseAuthClient<S> {
        &self.auth
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.config.rest_url(), urlencoding::encode(table))
    }

    /// Attach the anon key and the best available bearer token.
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = match self.auth.current_session().await? {
            Some(session) => session.access_token,
            None => self.config.supabase_anon_key.clone(),
        };
        Ok(request
            .header("apikey", &self.config.supabase_anon_key)
            .bearer_auth(token))
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.authorize(request).await?.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::from_response(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn into_rows(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::Serialization(format!(
            "expected an array of rows, got {other}"
        ))),
    }
}

#[async_trait]
impl<S: SessionPersistence> Tables for SupabaseBackend<S> {
    async fn select(&self, table: &str, query: &TableQuery) -> Result<Vec<Value>> {
        tracing::debug!(table, columns = %query.columns, "select");
        let request = self
            .client
            .get(self.table_url(table))
            .query(&query.to_params());
        into_rows(self.send_json(request).await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        tracing::debug!(table, "insert");
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        into_rows(self.send_json(request).await?)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Other(format!("insert into {table} returned no row")))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        require_filters(table, filters)?;
        tracing::debug!(table, filters = filters.len(), "update");
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        into_rows(self.send_json(request).await?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        require_filters(table, filters)?;
        tracing::debug!(table, filters = filters.len(), "delete");
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&filter_params(filters));
        self.send_json(request).await?;
        Ok(())
    }
}

fn require_filters(table: &str, filters: &[Filter]) -> Result<()> {
    if filters.is_empty() {
        return Err(Error::invalid_input(format!(
            "refusing to modify every row of {table} without a filter"
        )));
    }
    Ok(())
}

#[async_trait]
impl<S: SessionPersistence> Auth for SupabaseBackend<S> {
    async fn session(&self) -> Result<Option<AuthSession>> {
        self.auth.current_session().await
    }

    async fn sign_out(&self) -> Result<()> {
        self.auth.sign_out().await
    }
}

#[async_trait]
impl<S: SessionPersistence> Storage for SupabaseBackend<S> {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(Error::invalid_input("Upload path must not be empty"));
        }
        tracing::debug!(bucket, path, size = bytes.len(), "upload");

        let url = format!(
            "{}/object/{}/{}",
            self.config.storage_url(),
            urlencoding::encode(bucket),
            encode_path(path)
        );
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send_json(request).await.map_err(|error| match error {
            Error::Http { status, message } => {
                Error::Storage(format!("upload failed with HTTP {status}: {message}"))
            }
            other => other,
        })?;
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.config.storage_url(),
            urlencoding::encode(bucket),
            encode_path(path.trim_start_matches('/'))
        )
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl<S: SessionPersistence> Functions for SupabaseBackend<S> {
    async fn rpc(&self, name: &str, args: Value) -> Result<Value> {
        tracing::debug!(function = name, "rpc");
        let request = self
            .client
            .post(format!(
                "{}/rpc/{}",
                self.config.rest_url(),
                urlencoding::encode(name)
            ))
            .json(&args);
        self.send_json(request).await
    }

    async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
        tracing::debug!(function = name, "invoke edge function");
        let request = self
            .client
            .post(format!(
                "{}/{}",
                self.config.functions_url(),
                urlencoding::encode(name)
            ))
            .json(&body);
        self.send_json(request).await
    }
}
