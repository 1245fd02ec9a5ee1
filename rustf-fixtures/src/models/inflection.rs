//! Naming helpers shared by the model catalog, migration loading and labeling

/// Convert a PascalCase identifier to snake_case
///
/// Acronym runs stay together: `ActiveStorage` becomes `active_storage` and
/// `HTMLPage` becomes `html_page`.
pub fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut result = String::with_capacity(input.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                None => false,
                Some(p) if p == '_' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map_or(false, |n| n.is_lowercase()),
                Some(_) => false,
            };
            if starts_word {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else if ch == '-' || ch == ' ' {
            result.push('_');
        } else {
            result.push(ch);
        }
    }

    result
}

/// Convert a snake_case identifier to PascalCase
pub fn to_pascal_case(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut capitalize_next = true;

    for ch in input.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// Lowercase `input` and collapse every run of non-alphanumeric characters to `_`
///
/// ```rust,ignore
/// assert_eq!(parameterize("Unlocked  Hard!"), "unlocked_hard");
/// ```
pub fn parameterize(input: &str) -> String {
    input
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Fixture file name of `table`, owned by root model `model_name`, without extension
///
/// Leading namespace segments of the model become directories as long as the
/// table name carries them as a prefix. `Character::Turtle` on
/// `character_turtles` maps to `character/turtles`; `Person` on `people` stays
/// `people`.
pub fn fixture_name(model_name: &str, table: &str) -> String {
    let mut namespaces: Vec<String> = model_name.split("::").map(to_snake_case).collect();
    namespaces.pop();

    let mut segments = Vec::with_capacity(namespaces.len() + 1);
    let mut rest = table;
    for namespace in &namespaces {
        match rest
            .strip_prefix(namespace.as_str())
            .and_then(|r| r.strip_prefix('_'))
        {
            Some(r) if !r.is_empty() => {
                segments.push(namespace.as_str());
                rest = r;
            }
            _ => break,
        }
    }
    segments.push(rest);
    segments.join("/")
}

/// Accessor name migrations use to reach a fixture set (`character/turtles` → `character_turtles`)
pub fn accessor_name(fixture_name: &str) -> String {
    fixture_name.replace('/', "_")
}
