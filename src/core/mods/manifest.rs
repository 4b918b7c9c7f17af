// ─── Mod Manifest ───
// Tolerant `mod.json` parsing. Community manifests routinely carry comments
// and trailing commas, so parsing is a strict pass followed by a permissive
// pass over a cleaned-up copy of the text.

use serde_json::Value;

pub const MANIFEST_FILE: &str = "mod.json";

/// Fields of `mod.json` the launcher consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub authors: Vec<String>,
    pub scripts: Vec<ScriptEntry>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEntry {
    pub path: Option<String>,
}

impl ModManifest {
    /// Parse a manifest, returning `None` if neither pass yields JSON.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = parse_strict(raw).or_else(|| parse_permissive(raw))?;
        Some(Self::from_value(&value))
    }

    fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let authors = value
            .get("Authors")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let scripts = value
            .get("Scripts")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|entry| ScriptEntry {
                        path: entry
                            .get("Path")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Dependencies are either plain names or `{ "Name": ... }` objects.
        let dependencies = value
            .get("Dependencies")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|dep| match dep {
                        Value::String(name) => Some(name.clone()),
                        Value::Object(map) => {
                            map.get("Name").and_then(Value::as_str).map(str::to_string)
                        }
                        _ => None,
                    })
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: text("Name"),
            version: text("Version"),
            description: text("Description"),
            author: text("Author"),
            authors,
            scripts,
            dependencies,
        }
    }

    /// Author field, then the joined author list, then `fallback`.
    pub fn resolved_author(&self, fallback: &str) -> String {
        if let Some(author) = &self.author {
            return author.clone();
        }
        if !self.authors.is_empty() {
            return self.authors.join(", ");
        }
        fallback.to_string()
    }
}

/// Comment-stripped strict parse.
pub fn parse_strict(raw: &str) -> Option<Value> {
    serde_json::from_str(&strip_json_comments(raw)).ok()
}

/// Strict parse after also removing trailing commas.
pub fn parse_permissive(raw: &str) -> Option<Value> {
    let cleaned = strip_trailing_commas(&strip_json_comments(raw));
    serde_json::from_str(&cleaned).ok()
}

/// Remove `//` and `/* */` comments, leaving string literals untouched.
pub fn strip_json_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut string_quote: Option<char> = None;
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if let Some(quote) = string_quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                string_quote = None;
            }
            continue;
        }

        let next = chars.peek().copied();
        match (ch, next) {
            ('"' | '\'', _) => {
                string_quote = Some(ch);
                out.push(ch);
            }
            ('/', Some('/')) => {
                // Line comment: drop until the newline, keep the newline.
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Drop commas that are only followed by whitespace and a closing bracket.
pub fn strip_trailing_commas(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_comma_and_line_comment_parse_like_clean_json() {
        let messy = r#"{
            // display name
            "Name": "Foo",
            "Version": "1.2.0",
        }"#;
        let clean = r#"{"Name":"Foo","Version":"1.2.0"}"#;

        let parsed = ModManifest::parse(messy).unwrap();
        assert_eq!(parsed, ModManifest::parse(clean).unwrap());
        assert_eq!(parsed.name.as_deref(), Some("Foo"));
        assert_eq!(parsed.version.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let raw = r#"{ "Name": "http://example.com/*x*/", /* note */ "Version": "1.0" }"#;
        let parsed = ModManifest::parse(raw).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("http://example.com/*x*/"));
        assert_eq!(parsed.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn strict_pass_rejects_trailing_commas_permissive_accepts() {
        let raw = r#"{ "Scripts": [ { "Path": "a.nut" }, ], }"#;
        assert!(parse_strict(raw).is_none());
        assert!(parse_permissive(raw).is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ModManifest::parse("{ not json").is_none());
        assert!(ModManifest::parse("").is_none());
    }

    #[test]
    fn author_falls_back_through_authors_then_folder() {
        let explicit = ModManifest::parse(r#"{"Author":"Ash","Authors":["X"]}"#).unwrap();
        assert_eq!(explicit.resolved_author("folder"), "Ash");

        let listed = ModManifest::parse(r#"{"Authors":["Viper","Kane"]}"#).unwrap();
        assert_eq!(listed.resolved_author("folder"), "Viper, Kane");

        let none = ModManifest::parse(r#"{"Name":"Solo"}"#).unwrap();
        assert_eq!(none.resolved_author("SoloFolder"), "SoloFolder");
    }

    #[test]
    fn scripts_and_mixed_dependencies_are_read() {
        let raw = r#"{
            "Scripts": [{ "Path": "pilot/init.nut", "RunOn": "CLIENT" }, { "RunOn": "SERVER" }],
            "Dependencies": ["Northstar.Client", { "Name": "Pilot.Core" }, 42]
        }"#;
        let parsed = ModManifest::parse(raw).unwrap();
        assert_eq!(parsed.scripts.len(), 2);
        assert_eq!(parsed.scripts[0].path.as_deref(), Some("pilot/init.nut"));
        assert_eq!(parsed.scripts[1].path, None);
        assert_eq!(parsed.dependencies, vec!["Northstar.Client", "Pilot.Core"]);
    }
}
