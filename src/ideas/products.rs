use super::Product;
use crate::config::WorkflowConfig;

pub const TASK_ID: &str = "get_products";

/// Products used when the config does not override the list.
pub const DEFAULT_PRODUCTS: [&str; 3] = ["Apache Airflow", "Astronomer", "Astro CLI"];

/// Get the list of products, in order.
///
/// Blank names from a config override become `None` entries; the generator
/// skips those.
pub fn get_products(cfg: &WorkflowConfig) -> Vec<Option<Product>> {
    match &cfg.products {
        Some(names) => names.iter().map(|n| Product::new(n.as_str())).collect(),
        None => DEFAULT_PRODUCTS.iter().map(|n| Product::new(*n)).collect(),
    }
}
