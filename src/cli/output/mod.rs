//! CLI output formatting module
//!
//! Provides a uniform `--json`/human-readable switch for every command.

pub mod progress;
pub mod table;

pub use table::TableFormatter;

/// A command's result, renderable either for a human operator or as JSON.
pub trait CommandOutput {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value;
}

/// Prints a command's result in the mode the caller asked for.
pub fn output(value: &impl CommandOutput, json_mode: bool) {
    if json_mode {
        match serde_json::to_string_pretty(&value.to_json()) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("failed to render JSON output: {err}"),
        }
    } else {
        println!("{}", value.to_human());
    }
}
