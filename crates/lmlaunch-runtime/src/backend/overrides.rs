//! Per-model command-line overrides.
//!
//! Rules are one per line, `fragment: options`. The first rule whose
//! fragment occurs in the model's relative path (case-insensitive) wins.

use lmlaunch_core::LaunchError;

/// Options of the first rule matching `model_path`.
#[must_use]
pub fn select_permodel_options<'a>(rules: &'a str, model_path: &str) -> Option<&'a str> {
    let model_path = model_path.to_lowercase();
    rules
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find_map(|(fragment, options)| {
            let fragment = fragment.trim();
            (!fragment.is_empty() && model_path.contains(&fragment.to_lowercase()))
                .then_some(options.trim())
        })
}

/// Split an option string with POSIX shell rules.
pub fn split_options(options: &str) -> Result<Vec<String>, LaunchError> {
    shlex::split(options).ok_or_else(|| LaunchError::InvalidOptions {
        options: options.to_string(),
        reason: "unbalanced quotes or trailing escape".to_string(),
    })
}

/// Per-model then global options, both split.
pub fn resolve_options(
    permodel_rules: &str,
    global: &str,
    model_path: &str,
) -> Result<(Vec<String>, Vec<String>), LaunchError> {
    let permodel = match select_permodel_options(permodel_rules, model_path) {
        Some(options) => split_options(options)?,
        None => Vec::new(),
    };
    Ok((permodel, split_options(global)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = "qwen: -c 8192\nQwen2-7B: -c 32768\n\n: --ignored\nllama-3: --mlock";

    #[test]
    fn first_match_wins_case_insensitively() {
        assert_eq!(
            select_permodel_options(RULES, "qwen/Qwen2-7B-Q4_K_M.gguf"),
            Some("-c 8192")
        );
        assert_eq!(
            select_permodel_options(RULES, "meta/Meta-Llama-3-8B.gguf"),
            Some("--mlock")
        );
        assert_eq!(select_permodel_options(RULES, "mistral.gguf"), None);
    }

    #[test]
    fn shell_splitting() {
        assert_eq!(
            split_options(r#"--chat-template-file "/my dir/t.jinja" -c 4096"#).unwrap(),
            vec!["--chat-template-file", "/my dir/t.jinja", "-c", "4096"]
        );
        assert!(split_options("").unwrap().is_empty());
        assert!(matches!(
            split_options("--x 'open"),
            Err(LaunchError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn resolve_both_lists() {
        let (permodel, global) = resolve_options(RULES, "--flash-attn", "QWEN.gguf").unwrap();
        assert_eq!(permodel, vec!["-c", "8192"]);
        assert_eq!(global, vec!["--flash-attn"]);
    }
}
