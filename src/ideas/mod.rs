// Ideaflow - Blog idea domain: products in, ideas out

pub mod display;
pub mod generate;
pub mod pipeline;
pub mod products;

pub use display::{display_blog_ideas, IdeaRow};
pub use generate::IdeaGenerator;
pub use pipeline::{IdeaPipeline, RunReport};
pub use products::get_products;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdeaError {
    #[error("model reply contained neither a '{0}' tool call nor JSON content")]
    NoStructuredOutput(&'static str),
    #[error("model called unknown tool '{0}'")]
    UnknownTool(String),
    #[error("model reply is not a valid BlogIdea: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),
}

/// A product to write about. The name is never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    name: String,
}

impl Product {
    /// Returns `None` for a blank name: that is a missing record, not a product.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(Self { name })
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Structured reply of the model: the product name and the blog idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlogIdea")]
pub struct BlogIdea {
    pub name: String,
    pub idea: String,
}

impl BlogIdea {
    pub fn new(name: impl Into<String>, idea: impl Into<String>) -> Result<Self, IdeaError> {
        let name = name.into().trim().to_string();
        let idea = idea.into().trim().to_string();
        if name.is_empty() {
            return Err(IdeaError::EmptyField("name"));
        }
        if idea.is_empty() {
            return Err(IdeaError::EmptyField("idea"));
        }
        Ok(Self { name, idea })
    }

    /// JSON schema advertised to the model for structured output.
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "title": "BlogIdea",
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "The product name"},
                "idea": {"type": "string", "description": "The blog post idea"}
            },
            "required": ["name", "idea"]
        })
    }
}

#[derive(Deserialize)]
struct RawBlogIdea {
    name: String,
    idea: String,
}

impl TryFrom<RawBlogIdea> for BlogIdea {
    type Error = IdeaError;

    fn try_from(raw: RawBlogIdea) -> Result<Self, Self::Error> {
        BlogIdea::new(raw.name, raw.idea)
    }
}
