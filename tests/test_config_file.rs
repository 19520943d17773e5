use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;



use mailpost::{
                read_config_ini,
                Config,
                DispatchMode,
               };


#[test]
fn test_read_config_ini_success() {
  let temp_file = NamedTempFile::new().unwrap();
  let file_path = temp_file.path();
  let conts = r#"
sendmailPath = /usr/lib/sendmail
sendmailArgs = -i -oem
debug = yes
"#;

  // Write some test content to the file
  write(file_path, conts).unwrap();

  let config = read_config_ini(file_path).unwrap();
  let expected = Config {
    mode: DispatchMode::Debug,
    sendmail_path: PathBuf::from("/usr/lib/sendmail"),
    sendmail_args: vec!["-i".to_string(), "-oem".to_string()],
  };

  assert_eq!(expected, config, "config file conts does not equal what was written");
}

#[test]
fn test_read_config_ini_empty_file_gives_defaults() {
  let temp_file = NamedTempFile::new().unwrap();
  write(temp_file.path(), "").unwrap();

  let config = read_config_ini(temp_file.path()).unwrap();

  assert_eq!(Config::default(), config);
}

#[test]
fn test_read_config_ini_debug_false() {
  let temp_file = NamedTempFile::new().unwrap();
  write(temp_file.path(), "debug = false\n").unwrap();

  let config = read_config_ini(temp_file.path()).unwrap();

  assert_eq!(config.mode, DispatchMode::Live);
}

#[test]
fn test_read_config_ini_bad_debug_value() {
  let temp_file = NamedTempFile::new().unwrap();
  write(temp_file.path(), "debug = perhaps\n").unwrap();

  let result = read_config_ini(temp_file.path());

  assert!(result.is_err(), "Expected an error, but got: {:?}", result);
}

#[test]
fn test_read_config_ini_no_such_file() {
  let invalid_path = "non_existent_file.ini";
  let result = read_config_ini(invalid_path);

  assert!(result.is_err(), "Expected an error, but got: {:?}", result);
}

#[test]
fn test_read_config_ini_malformed_file() {
  let temp_file = NamedTempFile::new().unwrap();
  let file_path = temp_file.path();
  let conts = r#"
sendmailPath /usr/sbin/sendmail
debug = true
"#;

  write(file_path, conts).unwrap();

  let result = read_config_ini(file_path);

  assert!(result.is_err(), "Expected an error, but got: {:?}", result);
}
