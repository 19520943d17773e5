use chrono::Local;

use mailpost::{DispatchMode, MainContext};

fn main() {
    let cli_args: Vec<String> = std::env::args().collect();
    let now: chrono::DateTime<Local> = Local::now();

    let ctx = MainContext {
        args: cli_args,
        config_path: mailpost::DEFAULT_CONFIG_PATH.to_string(),
        env_mode: DispatchMode::from_env(),
        sent_time: now,
    };

    let stdin = std::io::stdin();
    let mut handle = stdin.lock();

    let mut stdout = std::io::stdout();

    if let Err(e) = mailpost::run(&ctx, &mut handle, &mut stdout) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
