use colored::Colorize;
use std::path::Path;

use mcpgate::config::Settings;
use mcpgate::mcp::{ServerEndpoint, ToolDescriptor};

pub struct Console;

impl Console {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "[INFO]".blue(), message);
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "[WARN]".yellow(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "[ERROR]".red(), message);
    }

    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "[OK]".green(), message);
    }

    /// Raw tool output goes to stdout so it can be piped.
    pub fn tool_result(&self, tool: &str, result: &str) {
        eprintln!("{} {}", format!("[TOOL:{}]", tool).magenta(), "─".repeat(40).dimmed());
        println!("{}", result);
    }

    pub fn list_tools(&self, server: &ServerEndpoint, tools: &[ToolDescriptor]) {
        println!(
            "\n{} {}",
            "TOOLS".bold().underline(),
            format!("({})", server.id).dimmed()
        );
        println!("{}", "─".repeat(50));

        if tools.is_empty() {
            println!("  {}", "no tools".dimmed());
        }
        for tool in tools {
            println!(
                "  {} {} {}",
                "•".cyan(),
                tool.name.cyan().bold(),
                format!("[{}]", tool.scope).dimmed()
            );
            if let Some(description) = &tool.description {
                println!("    {}", description);
            }
            if let Some(props) = tool
                .input_schema
                .as_ref()
                .and_then(|schema| schema.get("properties"))
                .and_then(|props| props.as_object())
            {
                let names: Vec<&str> = props.keys().map(String::as_str).collect();
                println!("    {} {}", "params:".dimmed(), names.join(", "));
            }
        }
        println!();
    }

    pub fn list_servers(&self, servers: &[ServerEndpoint]) {
        println!("\n{}", "CONFIGURED SERVERS".bold().underline());
        println!("{}", "─".repeat(50));
        if servers.is_empty() {
            println!("  {}", "none - add [servers.<id>] to the config file".dimmed());
        }
        for server in servers {
            println!(
                "  {} {} {} {}",
                "•".cyan(),
                server.id.to_string().cyan().bold(),
                server.base_url.as_str(),
                format!("({:?})", server.auth_type).dimmed()
            );
        }
        println!();
    }

    pub fn show_config(&self, settings: &Settings, path: Option<&Path>) {
        println!("\n{}", "CONFIGURATION".bold().underline());
        println!("{}", "─".repeat(50));

        println!(
            "\n  {} {} {}",
            "Client:".yellow(),
            settings.client.name.green(),
            settings.client.version.dimmed()
        );

        let transport = &settings.transport;
        println!("\n  {}", "Transport:".yellow());
        println!("    HTTP request timeout: {}s", transport.request_timeout_secs);
        println!("    WebSocket reply timeout: {}s", transport.reply_timeout_secs);
        println!("    WebSocket path: {}", transport.ws_path);
        println!("    Invoke path: {}", transport.invoke_path);
        println!(
            "    Send initialized: {}",
            if transport.send_initialized {
                "yes".green()
            } else {
                "no".red()
            }
        );

        let retry = settings.retry_config();
        println!("\n  {}", "Retry:".yellow());
        println!(
            "    {} retries, first delay {:?}, x{} (total {:?})",
            retry.max_retries,
            retry.initial_delay,
            retry.backoff_multiplier,
            retry.total_backoff()
        );

        println!("\n  {} {}", "Servers:".yellow(), settings.servers.len());

        if let Some(path) = path {
            println!(
                "\n  {} {}",
                "Config file:".yellow(),
                path.display().to_string().dimmed()
            );
        }
        println!();
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
