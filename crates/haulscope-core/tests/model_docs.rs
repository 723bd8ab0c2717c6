//! Report DTOs are part of the public API; every field carries a doc comment

use std::fs;
use std::path::Path;

/// `file:line field` for each public field or type without a `///` line above
/// it, attributes skipped
fn undocumented(source: &str, file: &str) -> Vec<String> {
    let lines: Vec<&str> = source.lines().collect();
    let body = lines
        .iter()
        .position(|line| line.trim() == "#[cfg(test)]")
        .unwrap_or(lines.len());

    let mut missing = Vec::new();
    for (i, line) in lines[..body].iter().enumerate() {
        let trimmed = line.trim_start();
        let is_field = trimmed.starts_with("pub ")
            && !trimmed.starts_with("pub fn ")
            && !trimmed.starts_with("pub use ")
            && !trimmed.starts_with("pub mod ")
            && trimmed.split_whitespace().nth(1).is_some_and(|word| word.ends_with(':'));
        let is_type = trimmed.starts_with("pub struct ") || trimmed.starts_with("pub enum ");
        if !is_field && !is_type {
            continue;
        }

        let documented = lines[..i]
            .iter()
            .rev()
            .find(|above| !above.trim_start().starts_with("#["))
            .is_some_and(|above| above.trim_start().starts_with("///"));
        if !documented {
            missing.push(format!("{file}:{} {}", i + 1, trimmed));
        }
    }
    missing
}

#[test]
fn test_every_public_model_field_is_documented() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/models");
    let mut missing = Vec::new();

    for entry in fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "rs") {
            let source = fs::read_to_string(&path).unwrap();
            missing.extend(undocumented(&source, &path.display().to_string()));
        }
    }

    assert!(missing.is_empty(), "undocumented:\n{}", missing.join("\n"));
}

#[test]
fn test_undocumented_field_is_reported() {
    let source = "/// A row\npub struct Row {\n    #[serde(rename = \"x\")]\n    pub id: u32,\n}\n";
    assert_eq!(undocumented(source, "row.rs"), vec!["row.rs:4 pub id: u32,".to_string()]);
}
