//! Persona text source.
//!
//! Personas are opaque text owned by another component. Only `full_text`
//! reaches the prompt; `trait_summary` is kept for callers that display it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AnalystError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub full_text: String,
    pub trait_summary: String,
}

impl Persona {
    pub fn new(full_text: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            trait_summary: String::new(),
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.trait_summary = summary.into();
        self
    }
}

#[async_trait]
pub trait PersonaSource: Send + Sync {
    async fn persona(&self, id: &str) -> Result<Persona>;
}

/// Fixed in-process persona table
#[derive(Clone, Debug, Default)]
pub struct StaticPersonaSource {
    personas: HashMap<String, Persona>,
}

impl StaticPersonaSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<String>, persona: Persona) -> Self {
        self.personas.insert(id.into(), persona);
        self
    }
}

#[async_trait]
impl PersonaSource for StaticPersonaSource {
    async fn persona(&self, id: &str) -> Result<Persona> {
        self.personas
            .get(id)
            .cloned()
            .ok_or_else(|| AnalystError::Config(format!("unknown persona '{id}'")))
    }
}
