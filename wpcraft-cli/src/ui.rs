//! Console output: status lines and banners

use console::style;

const RULE_WIDTH: usize = 60;

pub fn success_line(message: impl AsRef<str>) -> String {
    style(format!("✓ {}", message.as_ref())).green().to_string()
}

pub fn success(message: impl AsRef<str>) {
    println!("{}", success_line(message));
}

pub fn error(message: impl AsRef<str>) {
    println!("{}", style(format!("✗ {}", message.as_ref())).red());
}

pub fn info(message: impl AsRef<str>) {
    println!("{}", style(format!("ℹ {}", message.as_ref())).yellow());
}

pub fn warning(message: impl AsRef<str>) {
    println!("\n{}", style(message.as_ref()).yellow());
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Cyan section header framed by rules
pub fn banner(title: impl AsRef<str>) {
    println!("\n{}", style(rule()).cyan());
    println!("{}", style(title.as_ref()).cyan());
    println!("{}\n", style(rule()).cyan());
}

/// Green box with the site address
pub fn access_box(url: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}\n",
        style(rule()).green(),
        style("WordPress is now accessible at:").green(),
        style(url).green().bold(),
        style(rule()).green(),
    )
}
