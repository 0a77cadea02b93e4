//! Naming helpers shared by the deriver and the access pattern generator.

/// Lower-cases the first character: `BlogPost` → `blogPost`.
pub fn camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Default reference attribute for an entity: `BlogPost` → `blogpostId`.
pub fn foreign_key_for(entity: &str) -> String {
    format!("{}Id", entity.to_lowercase())
}

/// English plural good enough for generated pattern names.
pub fn plural(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{name}es");
    }
    if let Some(stem) = name.strip_suffix('y') {
        let before = stem.chars().last();
        if !matches!(before, Some('a' | 'e' | 'i' | 'o' | 'u') | None) {
            return format!("{stem}ies");
        }
    }
    format!("{name}s")
}

/// Literal text before the first `{` placeholder.
pub fn template_prefix(template: &str) -> &str {
    match template.find('{') {
        Some(pos) => &template[..pos],
        None => template,
    }
}
