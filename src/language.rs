//! File name → editor language id.

use std::path::Path;

/// Language id used when nothing better is known.
pub const PLAINTEXT: &str = "plaintext";

/// Language id for a file name, by extension.
///
/// Extension-less names are matched whole (`Dockerfile`); anything
/// unrecognised is plaintext.
pub fn detect_language(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    let extension = Path::new(&lower)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_string);

    let Some(extension) = extension else {
        return match lower.trim_start_matches('.') {
            "dockerfile" => "dockerfile",
            "babelrc" | "eslintrc" | "prettierrc" => "json",
            _ => PLAINTEXT,
        };
    };

    match extension.as_str() {
        "html" | "htm" => "html",
        "css" => "css",
        "scss" | "sass" => "scss",
        "less" => "less",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "json" => "json",
        "jsonc" => "jsonc",
        "md" | "markdown" => "markdown",
        "xml" | "svg" => "xml",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "py" => "python",
        "rb" => "ruby",
        "php" => "php",
        "java" => "java",
        "c" => "c",
        "cpp" | "h" => "cpp",
        "cs" => "csharp",
        "go" => "go",
        "rs" => "rust",
        "swift" => "swift",
        "kt" => "kotlin",
        "dart" => "dart",
        "sh" | "bash" | "zsh" | "fish" => "shell",
        "bat" => "bat",
        "ps1" => "powershell",
        "sql" => "sql",
        "graphql" => "graphql",
        "dockerfile" => "dockerfile",
        _ => PLAINTEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(detect_language("main.rs"), "rust");
        assert_eq!(detect_language("App.TSX"), "typescript");
        assert_eq!(detect_language("config.yml"), "yaml");
    }

    #[test]
    fn special_names() {
        assert_eq!(detect_language("Dockerfile"), "dockerfile");
        assert_eq!(detect_language(".eslintrc"), "json");
        assert_eq!(detect_language(".gitignore"), PLAINTEXT);
        assert_eq!(detect_language(".env.local"), PLAINTEXT);
    }

    #[test]
    fn unknown_is_plaintext() {
        assert_eq!(detect_language("notes.xyz"), PLAINTEXT);
        assert_eq!(detect_language("Untitled-1"), PLAINTEXT);
    }
}
