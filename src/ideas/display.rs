use super::BlogIdea;
use serde::Serialize;
use std::io::Write;

pub const TASK_ID: &str = "display_blog_ideas";

/// Display shape of one idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdeaRow {
    pub product: String,
    pub idea: String,
}

impl From<&BlogIdea> for IdeaRow {
    fn from(idea: &BlogIdea) -> Self {
        Self {
            product: idea.name.clone(),
            idea: idea.idea.clone(),
        }
    }
}

/// Reshape ideas into rows, write them as pretty JSON and return them.
/// Order and count follow `ideas`.
pub fn display_blog_ideas<W: Write>(ideas: &[BlogIdea], out: &mut W) -> anyhow::Result<Vec<IdeaRow>> {
    let rows: Vec<IdeaRow> = ideas.iter().map(IdeaRow::from).collect();
    serde_json::to_writer_pretty(&mut *out, &rows)?;
    writeln!(out)?;
    out.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_keep_order_and_pairing() {
        let ideas = vec![
            BlogIdea::new("Apache Airflow", "DAG authoring tips").unwrap(),
            BlogIdea::new("Astronomer", "Scaling Airflow").unwrap(),
            BlogIdea::new("Astro CLI", "Local testing").unwrap(),
        ];
        let mut out: Vec<u8> = Vec::new();
        let rows = display_blog_ideas(&ideas, &mut out).unwrap();

        assert_eq!(rows.len(), 3);
        for (row, idea) in rows.iter().zip(&ideas) {
            assert_eq!(row.product, idea.name);
            assert_eq!(row.idea, idea.idea);
        }

        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed[1]["product"], "Astronomer");
        assert_eq!(printed[1]["idea"], "Scaling Airflow");
    }

    #[test]
    fn test_empty_input_prints_empty_list() {
        let mut out: Vec<u8> = Vec::new();
        let rows = display_blog_ideas(&[], &mut out).unwrap();
        assert!(rows.is_empty());
        assert_eq!(String::from_utf8(out).unwrap().trim(), "[]");
    }
}
