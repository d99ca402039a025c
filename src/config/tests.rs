use super::{Config, Value, AUTO_RECONNECT, HOST, NICK, PORT};
use crate::error::ConfigError;
use std::time::Duration;

#[test]
fn defaults() {
    let config = Config::new();
    assert_eq!(config.port().unwrap(), 6667);
    assert_eq!(config.nick().unwrap(), "rbot");
    assert_eq!(config.user().unwrap(), "rbot");
    assert_eq!(config.realname().unwrap(), "ruby irc bot");
    assert_eq!(config.retry_wait().unwrap(), Duration::from_secs(10));
    assert!(!config.auto_reconnect().unwrap());
}

#[test]
fn required_host() {
    let config = Config::new();
    assert_eq!(config.host(), Err(ConfigError::Missing(vec![HOST.to_owned()])));
    assert_eq!(config.validate(), Err(ConfigError::Missing(vec![HOST.to_owned()])));
    config.set(HOST, "localhost").unwrap();
    assert_eq!(config.host().unwrap(), "localhost");
    config.validate().unwrap();
}

#[test]
fn require_custom_key() {
    let config = Config::from_pairs([(HOST, "localhost")]).unwrap();
    config.require("channel").unwrap();
    config.require(NICK).unwrap();
    let Err(ConfigError::Missing(mut keys)) = config.validate() else {
        panic!("validation should fail");
    };
    keys.sort();
    assert_eq!(keys, ["channel", "nick"]);
    // Explicitly set values survive being required.
    config.set("channel", "#ivy").unwrap();
    config.require("channel").unwrap();
    assert_eq!(config.get("channel").unwrap(), Value::Str("#ivy".into()));
}

#[test]
fn unknown_key() {
    let config = Config::new();
    assert_eq!(config.get("nope"), Err(ConfigError::Unknown("nope".into())));
    assert!(!config.has("nope"));
}

#[test]
fn locked_rejects_writes() {
    let config = Config::new();
    config.lock();
    assert!(config.is_locked());
    assert_eq!(config.set(NICK, "other"), Err(ConfigError::Locked));
    assert_eq!(config.merge([(NICK, "other")]), Err(ConfigError::Locked));
    assert_eq!(config.require("x"), Err(ConfigError::Locked));
    // Reads still work.
    assert_eq!(config.nick().unwrap(), "rbot");
    config.unlock();
    config.set(NICK, "other").unwrap();
    assert_eq!(config.nick().unwrap(), "other");
}

#[test]
fn merge_and_types() {
    let config = Config::new();
    config
        .merge([
            (PORT, Value::Str("7000".into())),
            (AUTO_RECONNECT, Value::Bool(true)),
            (NICK, Value::Int(5)),
        ])
        .unwrap();
    assert_eq!(config.port().unwrap(), 7000);
    assert!(config.auto_reconnect().unwrap());
    assert!(matches!(config.nick(), Err(ConfigError::WrongType(_, _))));
    config.set(PORT, 70000i64).unwrap();
    assert!(matches!(config.port(), Err(ConfigError::WrongType(_, _))));
}

#[test]
fn clone_is_unlocked() {
    let config = Config::from_pairs([(HOST, "localhost")]).unwrap();
    config.lock();
    let copy = config.clone();
    assert!(!copy.is_locked());
    assert_eq!(copy.host().unwrap(), "localhost");
}

#[cfg(feature = "serde")]
#[test]
fn merge_deserialized() {
    use std::collections::BTreeMap;
    let json = r#"{"host": "irc.example.net", "port": 6697, "auto_reconnect": true}"#;
    let pairs: BTreeMap<String, Value> = serde_json::from_str(json).unwrap();
    let config = Config::from_pairs(pairs).unwrap();
    assert_eq!(config.host().unwrap(), "irc.example.net");
    assert_eq!(config.port().unwrap(), 6697);
    assert!(config.auto_reconnect().unwrap());
}
