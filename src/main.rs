use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings_form::{
    FileSettingsEndpoint, FormControl, FormGroup, KeyPath, SettingsFormState,
};

#[derive(Parser)]
#[command(name = "settings_form")]
#[command(about = "Edit a domain-server settings document and save only the changed settings")]
#[command(version = "0.1.0")]
struct Cli {
    /// 设置文档（JSON）路径
    #[arg(short, long)]
    input: PathBuf,

    /// 修改设置：KEYPATH=VALUE，VALUE 为 JSON 字面量，否则按字符串处理（可重复）
    #[arg(long = "set", value_name = "KEYPATH=VALUE")]
    assignments: Vec<String>,

    /// 打印所有面板的设置项
    #[arg(long)]
    summary: bool,

    /// 只显示将要提交的内容，不保存
    #[arg(long)]
    dry_run: bool,

    /// 保存时不创建备份文件
    #[arg(long)]
    no_backup: bool,

    /// 静默模式(仅输出错误)
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    if !cli.input.exists() {
        bail!("settings document does not exist: {:?}", cli.input);
    }

    let mut endpoint = FileSettingsEndpoint::new(&cli.input);
    if cli.no_backup {
        endpoint = endpoint.without_backup();
    }

    let mut state = SettingsFormState::load(&endpoint)
        .with_context(|| format!("failed to load settings from {:?}", cli.input))?;

    if cli.summary && !cli.quiet {
        print_summary(&state);
    }

    for assignment in &cli.assignments {
        let (keypath, value) = parse_assignment(assignment)?;
        state
            .set_value(&keypath, &value)
            .with_context(|| format!("cannot apply --set {}", assignment))?;
    }

    if !cli.quiet {
        print_badges(&state);
    }

    if cli.dry_run {
        if !cli.quiet {
            println!("{}", serde_json::to_string_pretty(&state.changed_values())?);
        }
        return Ok(());
    }

    if !state.is_save_enabled() {
        if !cli.quiet {
            println!("Nothing to save");
        }
        return Ok(());
    }

    let outcome = state.save(&endpoint).context("saving settings failed")?;
    if !cli.quiet {
        println!("Settings saved to {:?}", cli.input);
        if outcome.restart_required {
            println!("A restart is required for the changes to take effect");
        }
    }

    Ok(())
}

/// 初始化日志输出；`RUST_LOG` 优先
fn init_logging(quiet: bool) {
    let default_filter = if quiet { "error" } else { "settings_form=info,warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// 解析 `KEYPATH=VALUE`
fn parse_assignment(assignment: &str) -> Result<(KeyPath, Value)> {
    let Some((keypath, raw)) = assignment.split_once('=') else {
        bail!("expected KEYPATH=VALUE, got {:?}", assignment);
    };

    let keypath = KeyPath::parse(keypath.trim())?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((keypath, value))
}

fn print_summary(state: &SettingsFormState) {
    for panel in &state.form().panels {
        if panel.hidden {
            continue;
        }
        println!("[{}] {}", panel.name, panel.label.as_deref().unwrap_or(""));
        for group in &panel.groups {
            println!("  {} = {}", group.keypath, describe(group));
        }
    }
    println!();
}

fn describe(group: &FormGroup) -> String {
    match &group.control {
        FormControl::Checkbox(checkbox) => checkbox.checked.to_string(),
        FormControl::Select(select) => format!("{:?}", select.value),
        FormControl::Input(input) => format!("{:?}", input.value),
        FormControl::Table(table) => format!("{} row(s)", table.rows().len()),
        FormControl::Button(button) => format!("<{}>", button.label),
    }
}

fn print_badges(state: &SettingsFormState) {
    let badges = state.badges();
    for (panel, count) in badges.panels().filter(|(_, count)| *count > 0) {
        println!("{}: {} change(s)", panel, count);
    }
    println!("Total: {} change(s)", badges.total());

    let reasons: Vec<&str> = badges.restart_reasons().collect();
    if !reasons.is_empty() {
        println!("Restart required by: {}", reasons.join(", "));
    }
    println!(
        "[{}]{}",
        state.save_label(),
        if state.is_save_enabled() { "" } else { " (disabled)" }
    );
}
