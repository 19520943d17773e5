use std::env;

fn main() {
    // Compile-time defaults; either can be overridden by setting the variable when building
    let config_path =
        env::var("MAILPOST_CONFIG_PATH").unwrap_or_else(|_| "/etc/mailpost.conf".to_string());
    let sendmail_path =
        env::var("MAILPOST_SENDMAIL_PATH").unwrap_or_else(|_| "/usr/sbin/sendmail".to_string());

    println!("cargo:rerun-if-env-changed=MAILPOST_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=MAILPOST_SENDMAIL_PATH");

    println!("cargo:rustc-env=MAILPOST_CONFIG_PATH={}", config_path);
    println!("cargo:rustc-env=MAILPOST_SENDMAIL_PATH={}", sendmail_path);
}
