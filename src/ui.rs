use dialoguer::console::style;

use cairn::ApiResponse;

pub enum CommandStatus {
    Success,
    Error,
}

pub fn print_command_status(status: CommandStatus, message: &str) {
    let indicator = match &status {
        CommandStatus::Success => style("✓").green(),
        CommandStatus::Error => style("✗").red(),
    };
    eprintln!("{indicator} {message}");
}

/// Pretty-print a JSON payload to stdout.
pub fn print_data(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

/// Print a raw response: a status line plus the body. Successful responses
/// go to stdout, failures to stderr.
pub fn print_response(response: &ApiResponse) {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("");
    let status_line = format!("<[{}] {}>", status.as_u16(), reason);

    let body = match serde_json::to_string_pretty(response.json()) {
        Ok(text) if !response.json().is_null() => text,
        _ => response.text().to_string(),
    };

    if response.ok() {
        println!("{status_line}\n{body}");
    } else {
        eprintln!("{status_line}\n{body}");
    }
}
