use colored::*;
use serde_json::Value;
use terminal_size::{Width, Height, terminal_size};

fn width() -> usize {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    (width.0 as usize).min(100)
}

pub fn print_header(source: &str, timezone: &str) {
    let line = "═".repeat(width());
    println!("\n{}", line.blue().bold());

    let name = "skyclock".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  🌤️  {} {}", name, version);
    println!("{}", format!("  decision: {}  •  timezone: {}", source, timezone).cyan());

    println!("{}", line.blue().bold());
    println!("  Ask about the weather or the time. Examples:");
    println!("  - What's the weather like in Chiang Mai?");
    println!("  - Forecast for latitude 13.75, longitude 100.50");
    println!("  - What time is it in Tokyo and the weather there?");
    println!(
        "  Type {} to start over, {} to exit.\n",
        "reset".bold(),
        "x".bold()
    );
}

pub fn print_footer() {
    let line = "═".repeat(width());
    println!("\n{}", line.blue().bold());
    println!("  Thanks for using skyclock!");
    println!("{}", line.blue().bold());
}

pub fn print_separator() {
    println!("{}", "─".repeat(width()).black().bold());
}

pub fn print_tool_use(name: &str, input: &Value) {
    println!(
        "  {} {} {}",
        "⚙".magenta(),
        name.magenta().bold(),
        input.to_string().black().bold()
    );
}

pub fn print_model_response(text: &str) {
    println!("\n{}: {}\n", "Assistant".green().bold(), text);
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(kind: &str, msg: &str) {
    println!("  {} {} {}", "❌".red().bold(), format!("[{kind}]").red().bold(), msg.red());
}
