//! Console command autocompletion.
//!
//! Converted from: myq2_common::completion. The teacher completes map/demo/
//! savegame filenames against pak-backed search paths; this server has no
//! packaged content, so only `.cfg` and recorded `.demo` filenames are
//! completed against the data directory, alongside commands/aliases/cvars.

use crate::cmd::with_cmd_ctx;
use crate::cvar::with_cvar_ctx;
use crate::files::with_fs_ctx;

/// What type of argument a command expects at a given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    None,
    ConfigFile,
    DemoFile,
}

#[derive(Debug, Default)]
pub struct CompletionResult {
    pub matches: Vec<String>,
    pub common_prefix: String,
}

fn get_arg_type(command: &str, arg_index: usize) -> ArgType {
    match (command.to_lowercase().as_str(), arg_index) {
        ("exec", 0) => ArgType::ConfigFile,
        ("getdemo" | "senddemo", 0) => ArgType::DemoFile,
        _ => ArgType::None,
    }
}

/// Parse a console input line to determine what's being completed.
/// Returns (command_name, arg_index, partial_text).
fn parse_line(line: &str) -> (String, usize, String) {
    let line = line.trim_start();
    if line.is_empty() {
        return (String::new(), 0, String::new());
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return (String::new(), 0, String::new());
    }

    if !line.ends_with(' ') && !line.ends_with('\t') && parts.len() == 1 {
        return (String::new(), 0, parts[0].to_string());
    }

    let command = parts[0].to_string();
    let (arg_index, partial) = if line.ends_with(' ') || line.ends_with('\t') {
        (parts.len(), String::new())
    } else {
        (parts.len() - 1, parts.last().unwrap_or(&"").to_string())
    };

    (command, arg_index, partial)
}

fn find_common_prefix(strings: &[String]) -> String {
    if strings.is_empty() {
        return String::new();
    }
    if strings.len() == 1 {
        return strings[0].clone();
    }

    let first = &strings[0];
    let mut prefix_len = first.len();
    for s in &strings[1..] {
        let common = first
            .chars()
            .zip(s.chars())
            .take(prefix_len)
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count();
        prefix_len = common;
        if prefix_len == 0 {
            break;
        }
    }
    first[..prefix_len].to_string()
}

fn complete_command_or_cvar(partial: &str) -> Vec<String> {
    let mut matches = Vec::new();

    if let Some(cmd_matches) = with_cmd_ctx(|ctx| {
        let mut m: Vec<String> = ctx.complete_all_commands(partial).into_iter().map(String::from).collect();
        m.extend(ctx.complete_all_aliases(partial).into_iter().map(String::from));
        m
    }) {
        matches.extend(cmd_matches);
    }

    if let Some(cvar_matches) = with_cvar_ctx(|ctx| {
        ctx.complete_all_variables(partial).into_iter().map(String::from).collect::<Vec<_>>()
    }) {
        matches.extend(cvar_matches);
    }

    matches.sort();
    matches.dedup();
    matches
}

fn list_with_suffix(subdir: &str, suffix: &str, partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    let mut names: Vec<String> = with_fs_ctx(|ctx| ctx.list_dir(subdir)).unwrap_or_default();
    names.retain(|n| n.to_lowercase().ends_with(suffix) && n.to_lowercase().starts_with(&partial_lower));
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));
    names
}

fn complete_argument(command: &str, arg_index: usize, partial: &str) -> Vec<String> {
    match get_arg_type(command, arg_index - 1) {
        ArgType::ConfigFile => list_with_suffix(".", ".cfg", partial),
        ArgType::DemoFile => list_with_suffix("demos", ".demo", partial),
        ArgType::None => Vec::new(),
    }
}

/// Main entry point for console line completion.
pub fn complete_line(line: &str) -> CompletionResult {
    let (command, arg_index, partial) = parse_line(line);

    let matches = if arg_index == 0 {
        complete_command_or_cvar(&partial)
    } else {
        complete_argument(&command, arg_index, &partial)
    };

    let common_prefix = if matches.is_empty() { partial } else { find_common_prefix(&matches) };

    CompletionResult { matches, common_prefix }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_empty() {
        let (cmd, idx, partial) = parse_line("");
        assert_eq!(cmd, "");
        assert_eq!(idx, 0);
        assert_eq!(partial, "");
    }

    #[test]
    fn parse_line_partial_command() {
        let (cmd, idx, partial) = parse_line("st");
        assert_eq!(cmd, "");
        assert_eq!(idx, 0);
        assert_eq!(partial, "st");
    }

    #[test]
    fn parse_line_command_with_space() {
        let (cmd, idx, partial) = parse_line("exec ");
        assert_eq!(cmd, "exec");
        assert_eq!(idx, 1);
        assert_eq!(partial, "");
    }

    #[test]
    fn parse_line_command_with_partial_arg() {
        let (cmd, idx, partial) = parse_line("exec se");
        assert_eq!(cmd, "exec");
        assert_eq!(idx, 1);
        assert_eq!(partial, "se");
    }

    #[test]
    fn find_common_prefix_empty() {
        assert_eq!(find_common_prefix(&[]), "");
    }

    #[test]
    fn find_common_prefix_multiple() {
        assert_eq!(
            find_common_prefix(&["maxclients".to_string(), "maxspam".to_string(), "mastermask".to_string()]),
            "ma"
        );
    }
}
