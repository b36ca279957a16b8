use std::{env, env::VarError};

/// The worker takes no arguments. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Only non-secret variables. TRD_ESI_CLIENT_SECRET is never printed.
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "TRD_DATABASE_URL",
        "TRD_REFERENCE_REGION_ID",
        "TRD_AUTO_SELL_INTERVAL",
        "TRD_AUTO_BUY_INTERVAL",
        "TRD_AUTO_FULFILL_INTERVAL",
        "TRD_CONTRACT_SYNC_INTERVAL",
        "TRD_OUTBOX_INTERVAL",
        "TRD_OUTBOX_BATCH_SIZE",
        "TRD_EVENT_BUFFER_SIZE",
        "TRD_DISABLE_AUTO_FULFILL",
        "TRD_DISABLE_CONTRACT_SYNC",
        "TRD_SKIP_MIGRATIONS",
        "TRD_ESI_BASE_URL",
        "TRD_ESI_LOGIN_URL",
        "TRD_ESI_CLIENT_ID",
        "TRD_ESI_USER_AGENT",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
