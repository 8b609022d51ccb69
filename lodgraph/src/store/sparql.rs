//! SPARQL 1.1 protocol backend for HTTP triple stores.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Bindings, GraphStore, TermPattern, TriplePattern};
use crate::error::{GraphStoreError, Result};
use crate::statement::{Statement, Term};

#[derive(Debug, Clone)]
pub struct SparqlStoreConfig {
    /// Endpoint for SELECT/ASK queries.
    pub query_endpoint: String,
    /// Endpoint for INSERT/DELETE updates; defaults to the query endpoint.
    pub update_endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout: Duration,
}

impl SparqlStoreConfig {
    pub fn new(query_endpoint: impl Into<String>) -> Self {
        Self {
            query_endpoint: query_endpoint.into(),
            update_endpoint: None,
            username: None,
            password: None,
            request_timeout: Duration::from_secs(60),
        }
    }

    fn update_endpoint(&self) -> &str {
        self.update_endpoint
            .as_deref()
            .unwrap_or(&self.query_endpoint)
    }
}

/// Graph store backend speaking the SPARQL 1.1 protocol over HTTP.
pub struct SparqlStore {
    client: Client,
    config: SparqlStoreConfig,
}

impl SparqlStore {
    pub fn new(config: SparqlStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }

    async fn run_query(&self, query: String) -> Result<String> {
        let response = self
            .auth(self.client.post(&self.config.query_endpoint))
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .body(query)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(GraphStoreError::Backend { status, message })
        }
    }

    async fn run_update(&self, update: String) -> Result<()> {
        let response = self
            .auth(self.client.post(self.config.update_endpoint()))
            .header("Content-Type", "application/sparql-update")
            .body(update)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(GraphStoreError::Backend { status, message })
        }
    }
}

#[async_trait]
impl GraphStore for SparqlStore {
    fn name(&self) -> &'static str {
        "sparql"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.run_query("ASK { }".to_string()).await {
            Ok(_) => Ok(true),
            Err(GraphStoreError::Http(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn select(&self, patterns: &[TriplePattern]) -> Result<Vec<Bindings>> {
        let body = self.run_query(render_select(patterns)?).await?;
        parse_select_json(&body)
    }

    async fn ask(&self, patterns: &[TriplePattern]) -> Result<bool> {
        let body = self.run_query(render_ask(patterns)?).await?;
        parse_ask_json(&body)
    }

    async fn insert(&self, statements: &[Statement]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        log::debug!("inserting {} statements", statements.len());
        self.run_update(render_insert_data(statements)).await
    }

    async fn delete(&self, template: &[TriplePattern], pattern: &[TriplePattern]) -> Result<()> {
        let update = render_delete(template, pattern)?;
        log::debug!("{update}");
        self.run_update(update).await
    }
}

fn render_pattern_term(pattern: &TermPattern) -> String {
    match pattern {
        TermPattern::Term(term) => term.to_ntriples(),
        TermPattern::Var(name) => format!("?{name}"),
    }
}

fn render_pattern(pattern: &TriplePattern) -> String {
    format!(
        "{} {} {} .",
        render_pattern_term(&pattern.subject),
        render_pattern_term(&pattern.predicate),
        render_pattern_term(&pattern.object)
    )
}

fn render_where(patterns: &[TriplePattern]) -> Result<String> {
    if patterns.is_empty() {
        return Err(GraphStoreError::InvalidQuery(
            "empty basic graph pattern".to_string(),
        ));
    }
    Ok(patterns
        .iter()
        .map(render_pattern)
        .collect::<Vec<_>>()
        .join(" "))
}

pub(crate) fn render_select(patterns: &[TriplePattern]) -> Result<String> {
    let mut vars = Vec::new();
    for pattern in patterns {
        for var in pattern.variables() {
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
    }
    let projection = if vars.is_empty() {
        "*".to_string()
    } else {
        vars.iter()
            .map(|v| format!("?{v}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    Ok(format!(
        "SELECT DISTINCT {projection} WHERE {{ {} }}",
        render_where(patterns)?
    ))
}

pub(crate) fn render_ask(patterns: &[TriplePattern]) -> Result<String> {
    Ok(format!("ASK {{ {} }}", render_where(patterns)?))
}

pub(crate) fn render_insert_data(statements: &[Statement]) -> String {
    let triples = statements
        .iter()
        .map(Statement::to_ntriples)
        .collect::<Vec<_>>()
        .join("\n");
    format!("INSERT DATA {{\n{triples}\n}}")
}

pub(crate) fn render_delete(
    template: &[TriplePattern],
    pattern: &[TriplePattern],
) -> Result<String> {
    if template == pattern {
        return Ok(format!("DELETE WHERE {{ {} }}", render_where(pattern)?));
    }
    let mut pattern_vars = Vec::new();
    for p in pattern {
        pattern_vars.extend(p.variables());
    }
    for t in template {
        for var in t.variables() {
            if !pattern_vars.contains(&var) {
                return Err(GraphStoreError::InvalidQuery(format!(
                    "template variable ?{var} is not bound by the pattern"
                )));
            }
        }
    }
    Ok(format!(
        "DELETE {{ {} }} WHERE {{ {} }}",
        render_where(template)?,
        render_where(pattern)?
    ))
}

#[derive(Deserialize)]
struct SparqlSelectResponse {
    results: SparqlSelectResults,
}

#[derive(Deserialize)]
struct SparqlSelectResults {
    bindings: Vec<HashMap<String, SparqlBindingValue>>,
}

#[derive(Deserialize)]
struct SparqlBindingValue {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    datatype: Option<String>,
}

fn binding_to_term(value: SparqlBindingValue) -> Result<Term> {
    match value.kind.as_str() {
        "uri" => Ok(Term::Iri(value.value)),
        "bnode" => Ok(Term::Blank(value.value)),
        "literal" | "typed-literal" => Ok(Term::Literal {
            value: value.value,
            datatype: value.datatype,
        }),
        other => Err(GraphStoreError::Parse {
            reason: format!("unknown binding type '{other}'"),
        }),
    }
}

pub(crate) fn parse_select_json(json: &str) -> Result<Vec<Bindings>> {
    let response: SparqlSelectResponse =
        serde_json::from_str(json).map_err(|e| GraphStoreError::Parse {
            reason: format!("failed to parse SELECT response: {e}"),
        })?;

    let mut rows = Vec::with_capacity(response.results.bindings.len());
    for binding in response.results.bindings {
        let mut row = Bindings::new();
        for (var, value) in binding {
            row.insert(var, binding_to_term(value)?);
        }
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Deserialize)]
struct SparqlAskResponse {
    boolean: bool,
}

pub(crate) fn parse_ask_json(json: &str) -> Result<bool> {
    let response: SparqlAskResponse =
        serde_json::from_str(json).map_err(|e| GraphStoreError::Parse {
            reason: format!("failed to parse ASK response: {e}"),
        })?;
    Ok(response.boolean)
}
